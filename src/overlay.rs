//! Overlay renderer seam.
//!
//! Any display backend implements `OverlayRenderer`. Every call happens on the
//! display context; implementations need not be thread-safe.

use crate::geometry::{DisplayTransform, Rect};

/// Style hint for one detection rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectStyle {
    /// RGBA fill, components in 0..=1.
    pub fill: [f32; 4],
    pub corner_radius: f32,
}

impl Default for RectStyle {
    /// Translucent yellow with rounded corners.
    fn default() -> Self {
        Self {
            fill: [1.0, 1.0, 0.2, 0.4],
            corner_radius: 7.0,
        }
    }
}

/// Display backend for detection rectangles.
pub trait OverlayRenderer {
    /// Remove every rectangle drawn so far.
    fn clear_all(&mut self);

    /// Draw one rectangle. `bounds` is in buffer space, inside the overlay container.
    fn add_rectangle(&mut self, bounds: Rect, style: &RectStyle, confidence: f32);

    /// Place the overlay container on the display.
    fn apply_transform(&mut self, transform: &DisplayTransform);
}

/// A rectangle as the renderer received it.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayShape {
    pub bounds: Rect,
    pub style: RectStyle,
    pub confidence: f32,
}

/// What is currently on screen: the rectangles and the container transform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayState {
    pub shapes: Vec<OverlayShape>,
    pub transform: Option<DisplayTransform>,
}

impl OverlayState {
    /// Display-space bounds of every shape, when a transform is set.
    pub fn display_bounds(&self) -> Vec<Rect> {
        match &self.transform {
            Some(transform) => self
                .shapes
                .iter()
                .map(|shape| transform.map_rect(shape.bounds))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// In-memory renderer that keeps the current overlay state.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    state: OverlayState,
    clears: u64,
    transforms_applied: u64,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn shape_count(&self) -> usize {
        self.state.shapes.len()
    }

    pub fn clears(&self) -> u64 {
        self.clears
    }

    pub fn transforms_applied(&self) -> u64 {
        self.transforms_applied
    }
}

impl OverlayRenderer for RecordingRenderer {
    fn clear_all(&mut self) {
        self.state.shapes.clear();
        self.clears += 1;
    }

    fn add_rectangle(&mut self, bounds: Rect, style: &RectStyle, confidence: f32) {
        self.state.shapes.push(OverlayShape {
            bounds,
            style: *style,
            confidence,
        });
    }

    fn apply_transform(&mut self, transform: &DisplayTransform) {
        self.state.transform = Some(*transform);
        self.transforms_applied += 1;
    }
}
