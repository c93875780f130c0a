use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::geometry::NormalizedRect;

/// Most boxes the stub reports for one frame.
const MAX_STUB_DETECTIONS: usize = 3;

/// Stub backend for tests and demos.
///
/// Derives up to three boxes from a hash of the pixels, so identical frames
/// always yield identical detections.
#[derive(Default)]
pub struct StubBackend {
    label: Option<String>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fixed label to every detection.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        let digest: [u8; 32] = Sha256::digest(rgb).into();
        let count = digest[0] as usize % (MAX_STUB_DETECTIONS + 1);

        let detections = digest[1..]
            .chunks_exact(5)
            .take(count)
            .map(|b| {
                let unit = |v: u8| v as f32 / 255.0;
                let bounds = NormalizedRect::new(
                    unit(b[0]) * 0.5,
                    unit(b[1]) * 0.5,
                    0.1 + unit(b[2]) * 0.4,
                    0.1 + unit(b[3]) * 0.4,
                );
                let confidence = 0.5 + unit(b[4]) * 0.5;
                let detection = Detection::new(bounds, confidence);
                match &self.label {
                    Some(label) => detection.with_label(label.clone(), confidence),
                    None => detection,
                }
            })
            .collect();

        Ok(detections)
    }
}
