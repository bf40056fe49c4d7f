//! Document loading
//!
//! A content-type or file-name hint is checked first as a cheap rejection of
//! obviously wrong uploads. Parsing through the engine is the real check.

use crate::error::LoadError;
use pdf_engine::{DocumentHandle, OpenSource, PageHandle, PdfEngine};
use std::path::Path;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// What the caller knows about the upload before parsing it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHint {
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl FileHint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Hint carrying the file name of `path`
    pub fn from_path(path: &Path) -> Self {
        Self {
            content_type: None,
            file_name: path.file_name().map(|name| name.to_string_lossy().into_owned()),
        }
    }

    /// Whether the hint admits a PDF. An empty hint admits anything.
    pub fn looks_like_pdf(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            let essence = content_type.split(';').next().unwrap_or_default().trim();
            return essence.eq_ignore_ascii_case(PDF_CONTENT_TYPE);
        }
        if let Some(name) = &self.file_name {
            return Path::new(name)
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
        }
        true
    }
}

/// An opened document and its pages in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    handle: DocumentHandle,
    pages: Vec<PageHandle>,
}

impl LoadedDocument {
    pub fn handle(&self) -> DocumentHandle {
        self.handle
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Handle for 1-based page `number`
    pub fn page(&self, number: u32) -> Option<PageHandle> {
        let index = number.checked_sub(1)?;
        self.pages.get(index as usize).copied()
    }

    pub fn pages(&self) -> &[PageHandle] {
        &self.pages
    }
}

pub fn check_file_type(hint: &FileHint) -> Result<(), LoadError> {
    if hint.looks_like_pdf() {
        Ok(())
    } else {
        Err(LoadError::NotPdf {
            content_type: hint.content_type.clone(),
            file_name: hint.file_name.clone(),
        })
    }
}

/// Check the hint, parse `bytes` and resolve every page handle
///
/// On failure nothing stays open in the engine.
pub fn load_document<E: PdfEngine>(
    engine: &mut E,
    bytes: Vec<u8>,
    hint: &FileHint,
) -> Result<LoadedDocument, LoadError> {
    check_file_type(hint)?;

    let handle = engine.open(OpenSource::Bytes(bytes))?;
    match resolve_pages(engine, handle) {
        Ok(pages) => Ok(LoadedDocument { handle, pages }),
        Err(err) => {
            if let Err(close_err) = engine.close(handle) {
                tracing::warn!(error = %close_err, "failed to close rejected document");
            }
            Err(err)
        }
    }
}

fn resolve_pages<E: PdfEngine>(
    engine: &E,
    handle: DocumentHandle,
) -> Result<Vec<PageHandle>, LoadError> {
    let page_count = engine.page_count(handle)?;
    if page_count == 0 {
        return Err(LoadError::NoPages);
    }
    (0..page_count)
        .map(|index| engine.get_page(handle, index).map_err(LoadError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::testing::blank_pdf;
    use pdf_engine::LopdfEngine;

    #[test]
    fn hint_accepts_pdf_type_or_name() {
        assert!(FileHint::new().looks_like_pdf());
        assert!(FileHint::new().with_content_type("application/pdf").looks_like_pdf());
        assert!(FileHint::new()
            .with_content_type("Application/PDF; charset=binary")
            .looks_like_pdf());
        assert!(FileHint::new().with_file_name("Report.PDF").looks_like_pdf());
    }

    #[test]
    fn hint_rejects_other_types() {
        assert!(!FileHint::new().with_content_type("image/png").looks_like_pdf());
        assert!(!FileHint::new().with_file_name("notes.txt").looks_like_pdf());
        assert!(!FileHint::new().with_file_name("pdf").looks_like_pdf());
    }

    #[test]
    fn content_type_wins_over_file_name() {
        let hint = FileHint::new().with_content_type("text/plain").with_file_name("a.pdf");
        assert!(matches!(check_file_type(&hint), Err(LoadError::NotPdf { .. })));
    }

    #[test]
    fn loads_pages_in_order() {
        let mut engine = LopdfEngine::new();
        let bytes = blank_pdf(&[(612.0, 792.0), (300.0, 400.0)]);

        let document = load_document(&mut engine, bytes, &FileHint::new()).expect("load");
        assert_eq!(document.page_count(), 2);
        assert_eq!(document.page(1).map(|page| page.index), Some(0));
        assert_eq!(document.page(2).map(|page| page.index), Some(1));
        assert_eq!(document.page(0), None);
        assert_eq!(document.page(3), None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let mut engine = LopdfEngine::new();
        let err = load_document(&mut engine, b"definitely not a pdf".to_vec(), &FileHint::new())
            .expect_err("garbage should fail");
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn wrong_hint_is_rejected_before_parsing() {
        let mut engine = LopdfEngine::new();
        let hint = FileHint::new().with_file_name("photo.png");
        let err = load_document(&mut engine, blank_pdf(&[(100.0, 100.0)]), &hint)
            .expect_err("hint should reject");
        assert!(matches!(err, LoadError::NotPdf { .. }));
    }

    #[test]
    fn empty_document_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = load_document(&mut engine, blank_pdf(&[]), &FileHint::new())
            .expect_err("no pages");
        assert!(matches!(err, LoadError::NoPages));
    }
}
