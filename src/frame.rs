//! Frame containers.
//!
//! - `FrameBuffer`: opaque pixel container for one camera tick. Bytes are private,
//!   there is no `Clone` and no byte accessor outside the crate.
//! - `BufferDimensions`: the (width, height) fixed at session setup.
//! - `PixelFormat`: layout of the private bytes.
//!
//! A `FrameBuffer` moves into the pipeline worker on submission and is dropped as
//! soon as its detection pass returns. Nothing holds a frame across passes.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Pixel layout of frame bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 8-bit RGB.
    Rgb24,
    /// Bi-planar 4:2:0, full-range luma followed by interleaved CbCr.
    #[default]
    Nv12,
}

impl PixelFormat {
    /// Byte length of one frame in this format, `None` on overflow.
    pub fn frame_len(self, dimensions: BufferDimensions) -> Option<usize> {
        let width = dimensions.width as usize;
        let height = dimensions.height as usize;
        let pixels = width.checked_mul(height)?;
        match self {
            PixelFormat::Rgb24 => pixels.checked_mul(3),
            // Interleaved CbCr plane at half resolution, odd sides rounded up.
            PixelFormat::Nv12 => {
                let chroma = (width.div_ceil(2) * 2).checked_mul(height.div_ceil(2))?;
                pixels.checked_add(chroma)
            }
        }
    }
}

/// Dimensions shared by every frame of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferDimensions {
    pub width: u32,
    pub height: u32,
}

impl BufferDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for BufferDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One raw frame from a source.
pub struct FrameBuffer {
    /// Private pixel data. Not exposed outside the crate.
    data: Vec<u8>,
    dimensions: BufferDimensions,
    format: PixelFormat,
    /// Arrival order assigned by the source.
    sequence: u64,
    captured_at: Instant,
}

// No Clone, no AsRef<[u8]>: a frame lives for exactly one detection pass.

impl FrameBuffer {
    /// Wrap raw bytes. The byte length must match `format` at `dimensions`.
    pub fn new(
        data: Vec<u8>,
        dimensions: BufferDimensions,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self> {
        let expected = format
            .frame_len(dimensions)
            .ok_or_else(|| anyhow!("frame dimensions {} overflow", dimensions))?;
        if data.len() != expected {
            return Err(anyhow!(
                "{:?} frame length mismatch at {}: expected {}, got {}",
                format,
                dimensions,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            dimensions,
            format,
            sequence,
            captured_at: Instant::now(),
        })
    }

    pub fn dimensions(&self) -> BufferDimensions {
        self.dimensions
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time since the frame was wrapped.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Internal: read-only pixel access for the detector.
    pub(crate) fn pixels(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("dimensions", &self.dimensions)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}
