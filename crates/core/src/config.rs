//! Editor configuration
//!
//! Every field has a default, so a partial JSON file only needs to name the
//! values it overrides.

use pdf_annotator_overlay::{Brush, Color, FontBook, OverlayError, Point};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Zoom range and step used by zoom in/out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub initial: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self { initial: 1.0, min: 0.5, max: 3.0, step: 0.25 }
    }
}

impl ZoomConfig {
    /// Clamp `zoom` into `[min, max]`
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max)
    }
}

/// Style of text inserted by the text tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    pub fill: Color,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            content: "Edit me".to_owned(),
            font_family: "Arial".to_owned(),
            font_size: 24.0,
            fill: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub color: Color,
    pub width: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self { color: Color::rgb(0xef, 0x44, 0x44), width: 3.0 }
    }
}

impl From<BrushConfig> for Brush {
    fn from(value: BrushConfig) -> Self {
        Brush { color: value.color, width: value.width }
    }
}

/// Where uploaded images land and how wide they are drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

impl Default for ImagePlacement {
    fn default() -> Self {
        Self { x: 100.0, y: 100.0, width: 200.0 }
    }
}

impl ImagePlacement {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Device pixels per PDF point at zoom 1
    pub base_render_scale: f32,
    /// Scale used by export, independent of zoom
    pub export_scale: f32,
    pub zoom: ZoomConfig,
    pub text: TextDefaults,
    pub brush: BrushConfig,
    pub image: ImagePlacement,
    pub export_file_name: String,
    /// Font files keyed by family name
    pub fonts: BTreeMap<String, PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_render_scale: 1.5,
            export_scale: 1.5,
            zoom: ZoomConfig::default(),
            text: TextDefaults::default(),
            brush: BrushConfig::default(),
            image: ImagePlacement::default(),
            export_file_name: "edited-document.pdf".to_owned(),
            fonts: BTreeMap::new(),
        }
    }
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_render_scale > 0.0) || !(self.export_scale > 0.0) {
            return Err(ConfigError::Invalid("render scales must be positive".to_owned()));
        }
        let zoom = &self.zoom;
        if !(zoom.min > 0.0) || !(zoom.min <= zoom.max) {
            return Err(ConfigError::Invalid(format!(
                "zoom bounds [{}, {}] are not a positive range",
                zoom.min, zoom.max
            )));
        }
        if !(zoom.step > 0.0) {
            return Err(ConfigError::Invalid("zoom step must be positive".to_owned()));
        }
        if !(self.text.font_size > 0.0) || !(self.brush.width > 0.0) || !(self.image.width > 0.0)
        {
            return Err(ConfigError::Invalid(
                "font size, brush width and image width must be positive".to_owned(),
            ));
        }
        if self.export_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("export file name is empty".to_owned()));
        }
        Ok(())
    }

    /// Load every configured font file
    pub fn load_fonts(&self) -> Result<FontBook, OverlayError> {
        let mut book = FontBook::new();
        for (family, path) in &self.fonts {
            book.load_file(family, path)?;
        }
        Ok(book)
    }

    pub fn with_base_render_scale(mut self, scale: f32) -> Self {
        self.base_render_scale = scale;
        self
    }

    pub fn with_export_scale(mut self, scale: f32) -> Self {
        self.export_scale = scale;
        self
    }

    pub fn with_zoom(mut self, zoom: ZoomConfig) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_text(mut self, text: TextDefaults) -> Self {
        self.text = text;
        self
    }

    pub fn with_brush(mut self, brush: BrushConfig) -> Self {
        self.brush = brush;
        self
    }

    pub fn with_image_placement(mut self, image: ImagePlacement) -> Self {
        self.image = image;
        self
    }

    pub fn with_export_file_name(mut self, name: impl Into<String>) -> Self {
        self.export_file_name = name.into();
        self
    }

    /// Register a font file for `family`
    pub fn with_font(mut self, family: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.fonts.insert(family.into(), path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_editor_behavior() {
        let config = EditorConfig::default();
        assert_eq!(config.base_render_scale, 1.5);
        assert_eq!(config.export_scale, 1.5);
        assert_eq!(config.zoom, ZoomConfig { initial: 1.0, min: 0.5, max: 3.0, step: 0.25 });
        assert_eq!(config.text.content, "Edit me");
        assert_eq!(config.text.font_family, "Arial");
        assert_eq!(config.text.font_size, 24.0);
        assert_eq!(config.text.fill, Color::BLACK);
        assert_eq!(config.brush.color.to_hex(), "#ef4444");
        assert_eq!(config.brush.width, 3.0);
        assert_eq!(config.image.position(), Point::new(100.0, 100.0));
        assert_eq!(config.image.width, 200.0);
        assert_eq!(config.export_file_name, "edited-document.pdf");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = EditorConfig::from_json_str(
            r##"{"export_scale": 2.0, "brush": {"color": "#00ff00"}}"##,
        )
        .expect("config should parse");

        assert_eq!(config.export_scale, 2.0);
        assert_eq!(config.brush.color, Color::rgb(0, 255, 0));
        assert_eq!(config.brush.width, 3.0);
        assert_eq!(config.base_render_scale, 1.5);
    }

    #[test]
    fn invalid_zoom_range_is_rejected() {
        let err = EditorConfig::from_json_str(r#"{"zoom": {"min": 2.0, "max": 1.0}}"#)
            .expect_err("inverted range");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = EditorConfig::from_json_str("{not json").expect_err("bad json");
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn config_file_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("editor.json");
        let config = EditorConfig::new()
            .with_export_file_name("out.pdf")
            .with_zoom(ZoomConfig { initial: 1.0, min: 0.25, max: 4.0, step: 0.5 });
        std::fs::write(&path, serde_json::to_string(&config).expect("serialize"))
            .expect("write config");

        let loaded = EditorConfig::from_json_file(&path).expect("config should load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = EditorConfig::from_json_file(Path::new("/definitely/missing.json"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn zoom_clamps_into_bounds() {
        let zoom = ZoomConfig::default();
        assert_eq!(zoom.clamp(0.1), 0.5);
        assert_eq!(zoom.clamp(9.0), 3.0);
        assert_eq!(zoom.clamp(1.25), 1.25);
    }
}
