mod backend;
mod backends;
mod detector;
mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::{Detector, STUB_MODEL_SCHEME};
pub use result::{BufferDetection, Detection, Label};
