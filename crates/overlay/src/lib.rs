//! Vector overlay engine for PDF page annotation.
//!
//! Each page gets one [`OverlayScene`] sized to its rendered background. The
//! scene holds text, freehand and image objects, tracks the active object,
//! and can be rasterized to an RGBA image for compositing.

mod fonts;
mod object;
mod raster;
mod scene;

use std::path::PathBuf;

pub use fonts::{FontBook, DEFAULT_FAMILY};
pub use object::{
    AnnotationId, AnnotationKind, AnnotationObject, Bounds, Color, ImageProps, InvalidColor,
    PathProps, Point, TextProps,
};
pub use raster::rasterize;
pub use scene::{Brush, Interaction, OverlayScene, SceneEvent};

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("cannot allocate a {width}x{height} overlay surface")]
    Surface { width: u32, height: u32 },
    #[error("failed to read font {path}: {source}")]
    FontIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    InvalidFont(String),
    #[error("no font available for family {0:?}")]
    MissingFont(String),
}
