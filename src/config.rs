use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::frame::{BufferDimensions, PixelFormat};
use crate::geometry::{DisplaySize, Orientation, OrientationFile};
use crate::overlay::RectStyle;

const DEFAULT_MODEL_PATH: &str = "stub://object_detector";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
const DEFAULT_SOURCE_URL: &str = "stub://back_camera";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 30;
const MAX_TARGET_FPS: u32 = 240;
const DEFAULT_DISPLAY_WIDTH: f32 = 1334.0;
const DEFAULT_DISPLAY_HEIGHT: f32 = 750.0;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    model: Option<ModelConfigFile>,
    source: Option<SourceConfigFile>,
    display: Option<DisplayConfigFile>,
    style: Option<StyleConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<String>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    pixel_format: Option<PixelFormat>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    orientation: Option<OrientationFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StyleConfigFile {
    fill: Option<[f32; 4]>,
    corner_radius: Option<f32>,
}

/// Session configuration: model, frame source, display surface, box style.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: ModelSettings,
    pub source: SourceSettings,
    pub display: DisplaySettings,
    pub style: RectStyle,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Model resource identifier: a file path, or `stub://<name>`.
    pub path: String,
    /// Backend-side score cutoff. The pipeline itself never filters.
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub dimensions: BufferDimensions,
    pub target_fps: u32,
    pub pixel_format: PixelFormat,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub size: DisplaySize,
    pub orientation: Orientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings {
                path: DEFAULT_MODEL_PATH.to_string(),
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            },
            source: SourceSettings {
                url: DEFAULT_SOURCE_URL.to_string(),
                dimensions: BufferDimensions::new(DEFAULT_SOURCE_WIDTH, DEFAULT_SOURCE_HEIGHT),
                target_fps: DEFAULT_TARGET_FPS,
                pixel_format: PixelFormat::default(),
            },
            display: DisplaySettings {
                size: DisplaySize::new(DEFAULT_DISPLAY_WIDTH, DEFAULT_DISPLAY_HEIGHT),
                orientation: Orientation::default(),
            },
            style: RectStyle::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from the file named by `OVERLAY_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OVERLAY_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => PipelineConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Result<Self> {
        let model = file.model.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        let style = file.style.unwrap_or_default();
        let default_style = RectStyle::default();

        Ok(Self {
            model: ModelSettings {
                path: model.path.unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
                confidence_threshold: model
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            },
            source: SourceSettings {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                dimensions: BufferDimensions::new(
                    source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                    source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                ),
                target_fps: source.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                pixel_format: source.pixel_format.unwrap_or_default(),
            },
            display: DisplaySettings {
                size: DisplaySize::new(
                    display.width.unwrap_or(DEFAULT_DISPLAY_WIDTH),
                    display.height.unwrap_or(DEFAULT_DISPLAY_HEIGHT),
                ),
                orientation: Orientation::from_file(display.orientation.unwrap_or_default())?,
            },
            style: RectStyle {
                fill: style.fill.unwrap_or(default_style.fill),
                corner_radius: style.corner_radius.unwrap_or(default_style.corner_radius),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("OVERLAY_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = path;
            }
        }
        if let Ok(url) = std::env::var("OVERLAY_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("OVERLAY_TARGET_FPS") {
            self.source.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_TARGET_FPS must be an integer frame rate"))?;
        }
        if let Ok(size) = std::env::var("OVERLAY_DISPLAY_SIZE") {
            self.display.size = DisplaySize::parse(&size)
                .map_err(|e| anyhow!("OVERLAY_DISPLAY_SIZE: {}", e))?;
        }
        if let Ok(mirror) = std::env::var("OVERLAY_MIRROR") {
            let (horizontal, vertical) = parse_mirror(&mirror)?;
            self.display.orientation.mirror_horizontal = horizontal;
            self.display.orientation.mirror_vertical = vertical;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.model.path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1, got {}",
                self.model.confidence_threshold
            ));
        }
        if self.source.target_fps == 0 || self.source.target_fps > MAX_TARGET_FPS {
            return Err(anyhow!(
                "target fps must be within 1..={}, got {}",
                MAX_TARGET_FPS,
                self.source.target_fps
            ));
        }
        let size = self.display.size;
        if !(size.width.is_finite() && size.height.is_finite())
            || size.width <= 0.0
            || size.height <= 0.0
        {
            return Err(anyhow!(
                "display size must be positive, got {}x{}",
                size.width,
                size.height
            ));
        }
        if self.style.fill.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(anyhow!("style fill components must be within 0..=1"));
        }
        if !self.style.corner_radius.is_finite() || self.style.corner_radius < 0.0 {
            return Err(anyhow!("style corner radius must be >= 0"));
        }
        if self.source.dimensions.is_degenerate() {
            log::warn!(
                "source dimensions {} are degenerate; overlay scale will clamp to 1.0",
                self.source.dimensions
            );
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_mirror(value: &str) -> Result<(bool, bool)> {
    match value.trim().to_lowercase().as_str() {
        "none" => Ok((false, false)),
        "horizontal" => Ok((true, false)),
        "vertical" => Ok((false, true)),
        "both" => Ok((true, true)),
        other => Err(anyhow!(
            "OVERLAY_MIRROR must be none|horizontal|vertical|both, got '{}'",
            other
        )),
    }
}
