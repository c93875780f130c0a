use crate::geometry::{NormalizedRect, Rect};

/// One class hypothesis attached to a detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub identifier: String,
    pub confidence: f32,
}

/// One detected object, normalized to the frame it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Bounding box, every component in 0..=1.
    pub bounds: NormalizedRect,
    /// Confidence in 0..=1.
    pub confidence: f32,
    /// Class hypotheses, best first. Carried through, never rendered.
    pub labels: Vec<Label>,
}

impl Detection {
    /// Build a detection, clamping box and confidence into range.
    pub fn new(bounds: NormalizedRect, confidence: f32) -> Self {
        Self {
            bounds: bounds.clamped(),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, identifier: impl Into<String>, confidence: f32) -> Self {
        self.labels.push(Label {
            identifier: identifier.into(),
            confidence,
        });
        self
    }

    /// Highest-ranked label, if the backend produced any.
    pub fn top_label(&self) -> Option<&Label> {
        self.labels.first()
    }
}

/// A detection scaled to absolute buffer pixels, ready for the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferDetection {
    pub bounds: Rect,
    pub confidence: f32,
    pub labels: Vec<Label>,
}
