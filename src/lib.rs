//! Camera frame to detection overlay pipeline.
//!
//! Frames come from a [`FrameSource`], pass one at a time through an opaque
//! [`Detector`] on a background worker, and come back to a single display
//! context as [`OverlayBatch`]es that an [`OverlayRenderer`] draws as
//! rectangles over the live preview.
//!
//! # Guarantees
//!
//! 1. **One frame in flight**: frames that arrive while a pass is running are
//!    dropped, never queued.
//! 2. **Ordered redraws**: batches are applied in submission order.
//! 3. **Full replacement**: every batch clears the previous rectangles, even
//!    when it carries no detections.
//! 4. **Fail fast at startup**: a missing model or camera is an error before
//!    any thread starts.
//!
//! # Module Structure
//!
//! - `frame`: frame containers (FrameBuffer, BufferDimensions, PixelFormat)
//! - `ingest`: frame sources
//! - `detect`: detector and backends
//! - `geometry`: buffer/display coordinate mapping
//! - `pipeline`: state machine and worker
//! - `display` / `overlay`: display context and renderer seam
//! - `session`: host lifecycle

pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod ui;

pub use config::{DisplaySettings, ModelSettings, PipelineConfig, SourceSettings};
pub use detect::{BufferDetection, Detection, Detector, DetectorBackend, Label, StubBackend};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use display::DisplayContext;
pub use error::{DegenerateGeometry, DetectionError, StartupError};
pub use frame::{BufferDimensions, FrameBuffer, PixelFormat};
pub use geometry::{
    fill_scale, try_fill_scale, DisplaySize, DisplayTransform, NormalizedRect, Orientation, Point,
    Rect, Rotation,
};
pub use ingest::{open_source, FrameSource, SourceStats, SyntheticSource};
pub use overlay::{OverlayRenderer, OverlayShape, OverlayState, RecordingRenderer, RectStyle};
pub use pipeline::{
    OverlayBatch, Pipeline, PipelineMonitor, PipelineState, PipelineStats, Submission,
};
pub use session::Session;
