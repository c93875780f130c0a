//! Synthetic frame source for `stub://` URLs.
//!
//! Draws a bright square that drifts across a dark background so consecutive
//! frames differ and stub detections move.

use anyhow::Result;

use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::{BufferDimensions, FrameBuffer, PixelFormat};

/// Square side as a fraction of the shorter frame side.
const BLOCK_FRACTION: u32 = 4;

pub struct SyntheticSource {
    settings: SourceSettings,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            frame_count: 0,
            connected: false,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let BufferDimensions { width, height } = self.settings.dimensions;
        let (w, h) = (width as usize, height as usize);
        let side = (width.min(height) / BLOCK_FRACTION).max(1) as usize;
        let span_x = w.saturating_sub(side).max(1);
        let span_y = h.saturating_sub(side).max(1);
        let step = self.frame_count as usize;
        let (bx, by) = ((step * 7) % span_x, (step * 3) % span_y);
        let inside = |x: usize, y: usize| x >= bx && x < bx + side && y >= by && y < by + side;

        match self.settings.pixel_format {
            PixelFormat::Rgb24 => {
                let mut pixels = vec![16u8; w * h * 3];
                for y in 0..h {
                    for x in 0..w {
                        if inside(x, y) {
                            let offset = (y * w + x) * 3;
                            pixels[offset..offset + 3].copy_from_slice(&[235, 235, 60]);
                        }
                    }
                }
                pixels
            }
            PixelFormat::Nv12 => {
                let len = PixelFormat::Nv12
                    .frame_len(self.settings.dimensions)
                    .unwrap_or(w * h);
                let mut pixels = vec![128u8; len];
                for y in 0..h {
                    for x in 0..w {
                        pixels[y * w + x] = if inside(x, y) { 235 } else { 16 };
                    }
                }
                pixels
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn dimensions(&self) -> BufferDimensions {
        self.settings.dimensions
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({} {:?})",
            self.settings.url,
            self.settings.dimensions,
            self.settings.pixel_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<FrameBuffer> {
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        FrameBuffer::new(
            pixels,
            self.settings.dimensions,
            self.settings.pixel_format,
            self.frame_count,
        )
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.settings.url.clone(),
        }
    }
}
