use std::path::Path;

use crate::config::ModelSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::backends::StubBackend;
use crate::detect::result::Detection;
use crate::error::{DetectionError, StartupError};
use crate::frame::{BufferDimensions, FrameBuffer};
use crate::ingest::normalize_to_rgb;

/// Model identifiers with this prefix select the built-in stub backend.
pub const STUB_MODEL_SCHEME: &str = "stub://";

/// An opaque model bound to the session's buffer dimensions.
///
/// Built once at setup and reused for every frame. `detect` takes `&mut self`,
/// so one detector can never run two passes at once.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    dimensions: BufferDimensions,
    model_id: String,
}

impl Detector {
    /// Resolve and load the model named by `settings`.
    ///
    /// Fails with `ModelUnavailable` when the resource cannot be found or loaded.
    /// There is no retry.
    pub fn open(
        settings: &ModelSettings,
        dimensions: BufferDimensions,
    ) -> Result<Self, StartupError> {
        let model_id = settings.path.trim();
        if model_id.is_empty() {
            return Err(StartupError::ModelUnavailable(
                "model resource identifier is empty".to_string(),
            ));
        }

        let backend: Box<dyn DetectorBackend> = if let Some(name) =
            model_id.strip_prefix(STUB_MODEL_SCHEME)
        {
            Box::new(StubBackend::new().with_label(name))
        } else {
            let path = Path::new(model_id);
            if !path.is_file() {
                return Err(StartupError::ModelUnavailable(format!(
                    "model file {} is missing",
                    path.display()
                )));
            }
            load_model_file(path, settings, dimensions)?
        };

        let mut detector = Self {
            backend,
            dimensions,
            model_id: model_id.to_string(),
        };
        detector
            .backend
            .warm_up()
            .map_err(|e| StartupError::ModelUnavailable(format!("warm-up failed: {:#}", e)))?;
        log::info!(
            "detector ready: model={} backend={} dims={}",
            detector.model_id,
            detector.backend.name(),
            detector.dimensions
        );
        Ok(detector)
    }

    /// Wrap an already-constructed backend.
    pub fn with_backend<B: DetectorBackend + 'static>(
        backend: B,
        dimensions: BufferDimensions,
    ) -> Self {
        Self {
            model_id: backend.name().to_string(),
            backend: Box::new(backend),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> BufferDimensions {
        self.dimensions
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one detection pass. The frame is only read.
    pub fn detect(&mut self, frame: &FrameBuffer) -> Result<Vec<Detection>, DetectionError> {
        if frame.dimensions() != self.dimensions {
            return Err(DetectionError::DimensionMismatch {
                expected: self.dimensions,
                actual: frame.dimensions(),
            });
        }
        let rgb = normalize_to_rgb(frame.pixels(), frame.dimensions(), frame.format())
            .map_err(|e| DetectionError::Decode(format!("{:#}", e)))?;
        self.backend
            .detect(&rgb, self.dimensions.width, self.dimensions.height)
            .map_err(|e| DetectionError::Inference(format!("{:#}", e)))
    }
}

#[cfg(feature = "backend-tract")]
fn load_model_file(
    path: &Path,
    settings: &ModelSettings,
    dimensions: BufferDimensions,
) -> Result<Box<dyn DetectorBackend>, StartupError> {
    let backend = crate::detect::backends::TractBackend::load(path, dimensions)
        .map_err(|e| StartupError::ModelUnavailable(format!("{:#}", e)))?
        .with_threshold(settings.confidence_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model_file(
    path: &Path,
    _settings: &ModelSettings,
    _dimensions: BufferDimensions,
) -> Result<Box<dyn DetectorBackend>, StartupError> {
    Err(StartupError::ModelUnavailable(format!(
        "cannot load {}: model files require the backend-tract feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use crate::geometry::NormalizedRect;
    use anyhow::{anyhow, Result};

    struct FixedBackend(Vec<Detection>);

    impl DetectorBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _rgb: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
            Err(anyhow!("tensor shape mismatch"))
        }
    }

    fn settings(path: &str) -> ModelSettings {
        ModelSettings {
            path: path.to_string(),
            confidence_threshold: 0.4,
        }
    }

    fn rgb_frame(dims: BufferDimensions) -> FrameBuffer {
        let len = PixelFormat::Rgb24.frame_len(dims).unwrap();
        FrameBuffer::new(vec![0u8; len], dims, PixelFormat::Rgb24, 0).unwrap()
    }

    #[test]
    fn missing_model_file_is_model_unavailable() {
        let err = Detector::open(
            &settings("/nonexistent/models/detector.onnx"),
            BufferDimensions::new(640, 480),
        )
        .err()
        .expect("open must fail");
        assert!(matches!(err, StartupError::ModelUnavailable(_)));
    }

    #[test]
    fn empty_model_id_is_model_unavailable() {
        let err = Detector::open(&settings("  "), BufferDimensions::new(640, 480))
            .err()
            .expect("open must fail");
        assert!(matches!(err, StartupError::ModelUnavailable(_)));
    }

    #[test]
    fn stub_scheme_opens_stub_backend() {
        let detector = Detector::open(&settings("stub://golf"), BufferDimensions::new(8, 8))
            .expect("stub model");
        assert_eq!(detector.backend_name(), "stub");
        assert_eq!(detector.model_id(), "stub://golf");
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut detector =
            Detector::with_backend(FixedBackend(vec![]), BufferDimensions::new(4, 4));
        let err = detector.detect(&rgb_frame(BufferDimensions::new(2, 2))).unwrap_err();
        assert!(matches!(err, DetectionError::DimensionMismatch { .. }));
    }

    #[test]
    fn backend_failure_maps_to_inference_error() {
        let dims = BufferDimensions::new(2, 2);
        let mut detector = Detector::with_backend(FailingBackend, dims);
        let err = detector.detect(&rgb_frame(dims)).unwrap_err();
        assert!(matches!(err, DetectionError::Inference(msg) if msg.contains("tensor shape")));
    }

    #[test]
    fn detections_pass_through_unfiltered() {
        let dims = BufferDimensions::new(2, 2);
        let low = Detection::new(NormalizedRect::new(0.0, 0.0, 0.5, 0.5), 0.01);
        let mut detector = Detector::with_backend(FixedBackend(vec![low.clone()]), dims);
        assert_eq!(detector.detect(&rgb_frame(dims)).unwrap(), vec![low]);
    }
}
