#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::BufferDimensions;
use crate::geometry::NormalizedRect;

/// Values per output row: x, y, w, h, confidence.
const ROW_WIDTH: usize = 5;
const DEFAULT_THRESHOLD: f32 = 0.4;

/// ONNX object detector run through tract.
///
/// The model takes `1x3xHxW` RGB scaled to 0..1 at the session dimensions and
/// emits `[x, y, w, h, confidence]` rows normalized to the input. Leading batch
/// axes are flattened. Rows under the threshold never leave the backend.
pub struct TractBackend {
    plan: TypedRunnableModel<TypedModel>,
    input: BufferDimensions,
    threshold: f32,
}

impl TractBackend {
    /// Load and optimize the model for a fixed input size.
    pub fn load(model_path: &Path, input: BufferDimensions) -> Result<Self> {
        let shape = tvec!(1, 3, input.height as usize, input.width as usize);
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("reading ONNX model {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape))
            .context("model rejected the session input shape")?
            .into_optimized()
            .context("optimizing model")?
            .into_runnable()
            .context("building execution plan")?;

        Ok(Self {
            plan,
            input,
            threshold: DEFAULT_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    fn to_planar(&self, rgb: &[u8]) -> Result<Tensor> {
        let (w, h) = (self.input.width as usize, self.input.height as usize);
        if rgb.len() != w * h * 3 {
            return Err(anyhow!(
                "expected {} RGB bytes for {}, got {}",
                w * h * 3,
                self.input,
                rgb.len()
            ));
        }
        let planar = tract_ndarray::Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
            f32::from(rgb[(y * w + x) * 3 + c]) / 255.0
        });
        Ok(planar.into_tensor())
    }

    fn rows_to_detections(&self, scores: &[f32]) -> Result<Vec<Detection>> {
        if scores.len() % ROW_WIDTH != 0 {
            return Err(anyhow!(
                "output has {} values, not a whole number of {}-wide rows",
                scores.len(),
                ROW_WIDTH
            ));
        }
        Ok(scores
            .chunks_exact(ROW_WIDTH)
            .filter_map(|row| {
                let [x, y, w, h, confidence] = [row[0], row[1], row[2], row[3], row[4]];
                (confidence.is_finite() && confidence >= self.threshold)
                    .then(|| Detection::new(NormalizedRect::new(x, y, w, h), confidence))
            })
            .collect())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let frame = BufferDimensions::new(width, height);
        if frame != self.input {
            return Err(anyhow!("frame {} does not match model input {}", frame, self.input));
        }
        let outputs = self
            .plan
            .run(tvec!(self.to_planar(rgb)?.into()))
            .context("inference")?;
        let first = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = first
            .to_array_view::<f32>()
            .context("model output is not f32")?;
        let scores: Vec<f32> = view.iter().copied().collect();
        self.rows_to_detections(&scores)
    }
}
