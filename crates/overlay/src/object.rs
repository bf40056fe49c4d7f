//! Annotation object model
//!
//! Objects live in exactly one overlay scene. Coordinates are overlay pixels
//! with the origin at the top-left of the page raster, y growing downward.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for an annotation object
///
/// Generated using UUID v4 when the object is created.
pub type AnnotationId = uuid::Uuid;

/// Line height multiplier applied to text font sizes.
const TEXT_LINE_HEIGHT: f32 = 1.16;

/// Average glyph advance as a fraction of the font size, used for text bounds.
const TEXT_ADVANCE_RATIO: f32 = 0.6;

/// Point in overlay pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounds in overlay pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// RGBA color
///
/// Serialized as a CSS-style hex string (`#rrggbb` or `#rrggbbaa`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };

    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(value: &str) -> Result<Self, InvalidColor> {
        let invalid = || InvalidColor(value.to_owned());
        let hex = value.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };

        match hex.len() {
            3 => {
                let short = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16).map(|v| v * 17).map_err(|_| invalid())
                };
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self {
                r: channel(0..2)?,
                g: channel(2..4)?,
                b: channel(4..6)?,
                a: channel(6..8)?,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}, expected #rrggbb")]
pub struct InvalidColor(pub String);

/// Editable text
#[derive(Debug, Clone, PartialEq)]
pub struct TextProps {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    pub fill: Color,
}

impl TextProps {
    /// Estimated (width, height) of the laid-out text.
    pub fn extent(&self) -> (f32, f32) {
        let lines = self.content.split('\n').collect::<Vec<_>>();
        let widest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let width = (widest as f32 * self.font_size * TEXT_ADVANCE_RATIO).max(1.0);
        let height = lines.len() as f32 * self.font_size * TEXT_LINE_HEIGHT;
        (width, height)
    }

    pub fn line_height(&self) -> f32 {
        self.font_size * TEXT_LINE_HEIGHT
    }
}

/// Freehand stroke. `points` are relative to the owning object's position.
#[derive(Debug, Clone, PartialEq)]
pub struct PathProps {
    pub stroke: Color,
    pub stroke_width: f32,
    pub points: Vec<Point>,
}

impl PathProps {
    /// Builds a path from absolute points, returning it with its top-left
    /// position. Points are rebased so the stroke fits inside the bounds.
    pub fn from_absolute(points: &[Point], stroke: Color, stroke_width: f32) -> (Point, Self) {
        let half = stroke_width / 2.0;
        let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let (min_x, min_y) = if min_x.is_finite() { (min_x, min_y) } else { (0.0, 0.0) };

        let origin = Point::new(min_x - half, min_y - half);
        let relative = points.iter().map(|p| Point::new(p.x - origin.x, p.y - origin.y)).collect();

        (origin, Self { stroke, stroke_width, points: relative })
    }

    pub fn extent(&self) -> (f32, f32) {
        let max_x = self.points.iter().map(|p| p.x).fold(0.0, f32::max);
        let max_y = self.points.iter().map(|p| p.y).fold(0.0, f32::max);
        let half = self.stroke_width / 2.0;
        (max_x + half, max_y + half)
    }
}

/// Placed bitmap
#[derive(Clone)]
pub struct ImageProps {
    pub bitmap: Arc<RgbaImage>,
    pub scale: f32,
}

impl ImageProps {
    /// Scale `bitmap` uniformly so it is `width` pixels wide.
    pub fn scaled_to_width(bitmap: Arc<RgbaImage>, width: f32) -> Self {
        let scale = if bitmap.width() == 0 { 1.0 } else { width / bitmap.width() as f32 };
        Self { bitmap, scale }
    }

    pub fn extent(&self) -> (f32, f32) {
        (self.bitmap.width() as f32 * self.scale, self.bitmap.height() as f32 * self.scale)
    }
}

impl fmt::Debug for ImageProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageProps")
            .field("width", &self.bitmap.width())
            .field("height", &self.bitmap.height())
            .field("scale", &self.scale)
            .finish()
    }
}

impl PartialEq for ImageProps {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bitmap, &other.bitmap) && self.scale == other.scale
    }
}

/// Variant-specific properties of an annotation
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    Text(TextProps),
    Path(PathProps),
    Image(ImageProps),
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Text(_) => "text",
            AnnotationKind::Path(_) => "path",
            AnnotationKind::Image(_) => "image",
        }
    }
}

/// A vector object on a page overlay
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationObject {
    pub id: AnnotationId,
    /// Top-left of the object's bounds
    pub position: Point,
    opacity: f32,
    pub selectable: bool,
    pub evented: bool,
    pub kind: AnnotationKind,
}

impl AnnotationObject {
    /// Create an interactive, fully opaque object with a fresh id
    pub fn new(position: Point, kind: AnnotationKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            position,
            opacity: 1.0,
            selectable: true,
            evented: true,
            kind,
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set opacity, clamped to `0.0..=1.0`
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn bounds(&self) -> Bounds {
        let (width, height) = match &self.kind {
            AnnotationKind::Text(text) => text.extent(),
            AnnotationKind::Path(path) => path.extent(),
            AnnotationKind::Image(image) => image.extent(),
        };
        Bounds { x: self.position.x, y: self.position.y, width, height }
    }

    pub fn as_text(&self) -> Option<&TextProps> {
        match &self.kind {
            AnnotationKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextProps> {
        match &mut self.kind {
            AnnotationKind::Text(text) => Some(text),
            _ => None,
        }
    }
}
