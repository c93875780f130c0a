//! Frame sources.
//!
//! A source owns device configuration and session lifecycle. The pipeline only
//! sees frames with the dimensions the source reported at setup.
//!
//! - `stub://` URLs: synthetic frames (tests and demos)
//!
//! Sources MUST NOT:
//! - Change dimensions mid-session
//! - Keep frames after handing them off

mod normalize;
pub mod synthetic;

use anyhow::Result;

use crate::config::SourceSettings;
use crate::error::StartupError;
use crate::frame::{BufferDimensions, FrameBuffer};

pub(crate) use normalize::normalize_to_rgb;
pub use synthetic::SyntheticSource;

/// URL prefix for synthetic sources.
pub const STUB_SOURCE_SCHEME: &str = "stub://";

/// A camera-like producer of fixed-size frames.
pub trait FrameSource: Send {
    /// Dimensions of every frame this source produces.
    fn dimensions(&self) -> BufferDimensions;

    /// Open the device/stream.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<FrameBuffer>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Open and connect the source named by `settings`.
///
/// Fails with `DeviceUnavailable` for unknown schemes or a failed connect.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>, StartupError> {
    let mut source: Box<dyn FrameSource> = if settings.url.starts_with(STUB_SOURCE_SCHEME) {
        Box::new(SyntheticSource::new(settings.clone()))
    } else {
        return Err(StartupError::DeviceUnavailable(format!(
            "no capture backend for '{}'",
            settings.url
        )));
    };
    source
        .connect()
        .map_err(|e| StartupError::DeviceUnavailable(format!("{:#}", e)))?;
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn settings(url: &str) -> SourceSettings {
        SourceSettings {
            url: url.to_string(),
            dimensions: BufferDimensions::new(64, 48),
            target_fps: 30,
            pixel_format: PixelFormat::Nv12,
        }
    }

    #[test]
    fn unknown_scheme_is_device_unavailable() {
        let err = open_source(&settings("avfoundation://back")).err().expect("must fail");
        assert!(matches!(err, StartupError::DeviceUnavailable(_)));
    }

    #[test]
    fn stub_scheme_opens_synthetic_source() {
        let source = open_source(&settings("stub://cam")).expect("stub source");
        assert_eq!(source.dimensions(), BufferDimensions::new(64, 48));
        assert!(source.is_healthy());
    }
}
