//! Error and outcome types for session operations

use pdf_annotator_overlay::OverlayError;
use pdf_engine::PdfEngineError;

/// Why a document could not be loaded. The previous document stays loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Please upload a valid PDF file")]
    NotPdf { content_type: Option<String>, file_name: Option<String> },
    #[error("Failed to load PDF. Please try another file.")]
    Parse(#[source] PdfEngineError),
    #[error("the PDF has no pages")]
    NoPages,
    #[error("encrypted PDFs are not supported")]
    Encrypted,
    #[error("failed to read PDF: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PdfEngineError> for LoadError {
    fn from(value: PdfEngineError) -> Self {
        match value {
            PdfEngineError::NoPages => Self::NoPages,
            PdfEngineError::EncryptedUnsupported => Self::Encrypted,
            PdfEngineError::Io(source) => Self::Io(source),
            other => Self::Parse(other),
        }
    }
}

/// Lower-level cause of a failed export
#[derive(Debug, thiserror::Error)]
pub enum ExportCause {
    #[error("no document is loaded")]
    NoDocument,
    #[error("page {page} failed to render: {source}")]
    Render {
        page: u32,
        #[source]
        source: PdfEngineError,
    },
    #[error("page {page} overlay failed to rasterize: {source}")]
    Overlay {
        page: u32,
        #[source]
        source: OverlayError,
    },
    #[error("failed to write output PDF: {0}")]
    Write(#[source] PdfEngineError),
}

/// Export aborted. The message is the one shown to users; the cause keeps
/// the detail for logs.
#[derive(Debug, thiserror::Error)]
#[error("Failed to export PDF. Please try again.")]
pub struct ExportFailure {
    #[source]
    pub cause: ExportCause,
}

impl From<ExportCause> for ExportFailure {
    fn from(cause: ExportCause) -> Self {
        Self { cause }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InsertImageError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("the first page is not ready for annotations")]
    PageNotReady,
    #[error("unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    Empty,
}

/// Result of a property update or delete addressed by object id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object was found on `page` and updated
    Applied { page: u32 },
    /// No live object has that id; nothing changed
    NoTarget,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}
