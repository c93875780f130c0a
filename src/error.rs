use thiserror::Error;

use crate::frame::BufferDimensions;

/// Startup failures. Fatal: the pipeline is never started after one of these.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

/// Per-frame detection failures. Recoverable: the frame counts as zero detections.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("frame size {actual} does not match session dimensions {expected}")]
    DimensionMismatch {
        expected: BufferDimensions,
        actual: BufferDimensions,
    },

    #[error("pixel decode failed: {0}")]
    Decode(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Zero-sized buffer dimensions. Recoverable: the display scale clamps to 1.0.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("degenerate buffer geometry {0}")]
pub struct DegenerateGeometry(pub BufferDimensions);
