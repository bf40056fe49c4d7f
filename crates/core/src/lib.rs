//! PDF Annotator Core Library
//!
//! Session state for annotating PDF pages: document loading, per-page
//! composites of background raster plus overlay, tool modes, cross-page
//! selection and property editing, and flattening to a new PDF.

pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod selection;
pub mod session;
pub mod tool;

pub use compositor::{PageComposite, PageRegistry, RenderJob, RenderStatus};
pub use config::{BrushConfig, ConfigError, EditorConfig, ImagePlacement, TextDefaults, ZoomConfig};
pub use error::{ApplyOutcome, ExportCause, ExportFailure, InsertImageError, LoadError};
pub use export::{flatten, ExportArtifact};
pub use loader::{check_file_type, load_document, FileHint, LoadedDocument};
pub use selection::{PropertyUpdate, SelectionBridge, SelectionEvent};
pub use session::{PointerOutcome, Session};
pub use tool::{Tool, UnknownTool};

pub use pdf_annotator_overlay::{AnnotationId, AnnotationKind, AnnotationObject, Color, Point};
