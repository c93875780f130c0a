//! Buffer-space and display-space geometry.
//!
//! Detections arrive normalized to the frame (0..1). They are scaled to buffer
//! pixels, drawn inside an overlay container the size of the buffer, and the
//! container is placed on the display with one affine transform: fill scale,
//! optional mirroring, a quarter-turn rotation, centered on the display.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::error::DegenerateGeometry;
use crate::frame::BufferDimensions;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in buffer or display pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn mid_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.mid_x(), self.mid_y())
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x, self.y + self.height),
            Point::new(self.x + self.width, self.y + self.height),
        ]
    }
}

/// Rectangle with every component relative to the frame size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamp each component into 0..=1.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_unit(self.x),
            y: clamp_unit(self.y),
            width: clamp_unit(self.width),
            height: clamp_unit(self.height),
        }
    }

    /// Scale origin and extent componentwise to absolute buffer pixels.
    pub fn to_buffer_space(&self, dimensions: BufferDimensions) -> Rect {
        let w = dimensions.width as f32;
        let h = dimensions.height as f32;
        Rect::new(self.x * w, self.y * h, self.width * w, self.height * h)
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Size of the display surface the overlay is composited onto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
}

impl DisplaySize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// Parse `WIDTHxHEIGHT`, e.g. `1280x720`.
    pub fn parse(value: &str) -> Result<Self> {
        let (w, h) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("display size must look like 1280x720, got '{}'", value))?;
        let width: f32 = w
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid display width '{}'", w))?;
        let height: f32 = h
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid display height '{}'", h))?;
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(anyhow!("display size must be positive, got '{}'", value));
        }
        Ok(Self { width, height })
    }
}

/// Quarter-turn rotation of the overlay relative to the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Result<Self> {
        match degrees % 360 {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(anyhow!(
                "rotation must be a multiple of 90 degrees, got {}",
                other
            )),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn radians(self) -> f32 {
        (self.degrees() as f32).to_radians()
    }

    // Exact (sin, cos) so quarter turns do not pick up float noise.
    fn sin_cos(self) -> (f32, f32) {
        match self {
            Rotation::Deg0 => (0.0, 1.0),
            Rotation::Deg90 => (1.0, 0.0),
            Rotation::Deg180 => (0.0, -1.0),
            Rotation::Deg270 => (-1.0, 0.0),
        }
    }
}

/// How the source frame relates to the locked display orientation.
///
/// Injected at session construction; never read from global state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Orientation {
    pub rotation: Rotation,
    pub mirror_horizontal: bool,
    pub mirror_vertical: bool,
}

impl Default for Orientation {
    /// Back camera in landscape: no rotation, mirrored horizontally.
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            mirror_horizontal: true,
            mirror_vertical: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OrientationFile {
    pub rotation_degrees: Option<u32>,
    pub mirror_horizontal: Option<bool>,
    pub mirror_vertical: Option<bool>,
}

impl Orientation {
    pub(crate) fn from_file(file: OrientationFile) -> Result<Self> {
        let defaults = Orientation::default();
        Ok(Self {
            rotation: match file.rotation_degrees {
                Some(degrees) => Rotation::from_degrees(degrees)?,
                None => defaults.rotation,
            },
            mirror_horizontal: file.mirror_horizontal.unwrap_or(defaults.mirror_horizontal),
            mirror_vertical: file.mirror_vertical.unwrap_or(defaults.mirror_vertical),
        })
    }
}

/// Fill scale: the buffer covers the whole display, overflow is cropped.
///
/// Fails when either buffer side is zero.
pub fn try_fill_scale(
    buffer: BufferDimensions,
    display: DisplaySize,
) -> std::result::Result<f32, DegenerateGeometry> {
    if buffer.is_degenerate() {
        return Err(DegenerateGeometry(buffer));
    }
    let x_scale = display.width / buffer.width as f32;
    let y_scale = display.height / buffer.height as f32;
    let scale = x_scale.max(y_scale);
    if scale.is_finite() {
        Ok(scale)
    } else {
        Err(DegenerateGeometry(buffer))
    }
}

/// Fill scale clamped to 1.0 for degenerate buffers.
pub fn fill_scale(buffer: BufferDimensions, display: DisplaySize) -> f32 {
    try_fill_scale(buffer, display).unwrap_or(1.0)
}

/// Affine placement of the overlay container on the display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayTransform {
    pub scale: f32,
    pub rotation: Rotation,
    pub mirror_horizontal: bool,
    pub mirror_vertical: bool,
    /// Display-space position of the container center.
    pub center: Point,
    /// Container bounds in buffer space.
    pub buffer: BufferDimensions,
}

impl DisplayTransform {
    /// Build the fill transform for `buffer` shown on `display`.
    pub fn fill(buffer: BufferDimensions, display: DisplaySize, orientation: Orientation) -> Self {
        let scale = match try_fill_scale(buffer, display) {
            Ok(scale) => scale,
            Err(err) => {
                log::warn!("{}; display scale clamped to 1.0", err);
                1.0
            }
        };
        Self {
            scale,
            rotation: orientation.rotation,
            mirror_horizontal: orientation.mirror_horizontal,
            mirror_vertical: orientation.mirror_vertical,
            center: display.center(),
            buffer,
        }
    }

    /// Signed horizontal scale (negative when mirrored).
    pub fn scale_x(&self) -> f32 {
        if self.mirror_horizontal {
            -self.scale
        } else {
            self.scale
        }
    }

    /// Signed vertical scale (negative when mirrored).
    pub fn scale_y(&self) -> f32 {
        if self.mirror_vertical {
            -self.scale
        } else {
            self.scale
        }
    }

    /// Map a buffer-space point to display space.
    ///
    /// Scale/mirror about the container center, then rotate, then translate to
    /// the display center.
    pub fn map_point(&self, point: Point) -> Point {
        let dx = (point.x - self.buffer.width as f32 / 2.0) * self.scale_x();
        let dy = (point.y - self.buffer.height as f32 / 2.0) * self.scale_y();
        let (sin, cos) = self.rotation.sin_cos();
        Point::new(
            self.center.x + cos * dx - sin * dy,
            self.center.y + sin * dx + cos * dy,
        )
    }

    /// Display-space bounding box of a buffer-space rectangle.
    pub fn map_rect(&self, rect: Rect) -> Rect {
        let mapped = rect.corners().map(|corner| self.map_point(corner));
        let min_x = mapped.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let max_x = mapped.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let min_y = mapped.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = mapped.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}
