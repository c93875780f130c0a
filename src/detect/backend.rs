use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend wraps an opaque trained model. It receives packed RGB pixels at the
/// session dimensions and returns normalized detections.
///
/// Implementations must treat the pixel slice as read-only and ephemeral: no
/// copies kept past the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one RGB frame.
    fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once at setup.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
