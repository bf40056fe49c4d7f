//! PDF parsing, rasterization and writing seams.
//!
//! The annotator never interprets PDF content itself. It talks to a
//! [`PdfEngine`] for page structure and background rasters, and to a
//! [`PdfWriter`] for the flattened output document.

use image::{ImageBuffer, Rgba};
use lopdf::Document;
use pdf_annotator_scheduler::CancellationToken;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

mod writer;

#[cfg(feature = "pdfium")]
pub mod pdfium_backend;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use writer::{EmbeddedImage, PdfWriter};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Fallback page size (US Letter) for pages without a readable MediaBox.
const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A page inside an open document. `index` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle {
    pub document: DocumentHandle,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// Pixel size of this page rendered at `scale`.
    pub fn viewport(&self, scale: f32) -> (u32, u32) {
        let width = (self.width_pt * scale).round().max(1.0) as u32;
        let height = (self.height_pt * scale).round().max(1.0) as u32;
        (width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page: PageHandle,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("render cancelled")]
    Cancelled,
    #[error("backend error: {0}")]
    Backend(String),
}

impl PdfEngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Parser and rasterizer used for page backgrounds.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn get_page(&self, handle: DocumentHandle, index: u32) -> Result<PageHandle, PdfEngineError> {
        let page_count = self.page_count(handle)?;
        if index >= page_count {
            return Err(PdfEngineError::PageOutOfRange { page: index, page_count });
        }
        Ok(PageHandle { document: handle, index })
    }
    fn page_size(&self, page: PageHandle) -> Result<PageSize, PdfEngineError>;
    /// Rasterizes a page. Returns [`PdfEngineError::Cancelled`] once `cancel`
    /// has fired; callers discard that result instead of reporting it.
    fn render_page(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

/// Structure-only engine: reads page geometry with lopdf and paints each page
/// as a blank sheet of the right size.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or(DEFAULT_PAGE_SIZE);

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    /// Raw bytes the document was opened from.
    pub fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record(handle)?.bytes)
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = page_sizes.len(), "opened document");
        self.docs.insert(handle, DocumentRecord { bytes, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(&self, page: PageHandle) -> Result<PageSize, PdfEngineError> {
        let record = self.record(page.document)?;
        record.page_sizes.get(page.index as usize).copied().ok_or(
            PdfEngineError::PageOutOfRange {
                page: page.index,
                page_count: record.page_sizes.len() as u32,
            },
        )
    }

    fn render_page(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, PdfEngineError> {
        if cancel.is_cancelled() {
            return Err(PdfEngineError::Cancelled);
        }

        let page_size = self.page_size(request.page)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };
        let (width, height) = page_size.viewport(scale);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        if cancel.is_cancelled() {
            return Err(PdfEngineError::Cancelled);
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::blank_pdf;

    fn open(engine: &mut LopdfEngine, pages: &[(f32, f32)]) -> DocumentHandle {
        engine.open(OpenSource::Bytes(blank_pdf(pages))).expect("open should succeed")
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, &[(612.0, 792.0), (300.0, 200.0)]);

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 2);
    }

    #[test]
    fn page_size_comes_from_media_box() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, &[(612.0, 792.0), (300.0, 200.0)]);

        let page = engine.get_page(handle, 1).expect("page should exist");
        let size = engine.page_size(page).expect("size should be readable");
        assert_eq!(size, PageSize { width_pt: 300.0, height_pt: 200.0 });
    }

    #[test]
    fn render_uses_scaled_viewport() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, &[(200.0, 100.0)]);
        let page = engine.get_page(handle, 0).expect("page should exist");

        let image = engine
            .render_page(RenderRequest { page, scale: 1.5 }, &CancellationToken::new())
            .expect("render should succeed");

        assert_eq!((image.width(), image.height()), (300, 150));
        assert_eq!(image.get_pixel(150, 75), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn cancelled_render_returns_cancelled() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, &[(200.0, 100.0)]);
        let page = engine.get_page(handle, 0).expect("page should exist");

        let token = CancellationToken::new();
        token.cancel();

        let err = engine
            .render_page(RenderRequest { page, scale: 1.0 }, &token)
            .expect_err("cancelled render should not produce an image");
        assert!(err.is_cancelled());
    }

    #[test]
    fn get_page_out_of_range() {
        let mut engine = LopdfEngine::new();
        let handle = open(&mut engine, &[(200.0, 100.0)]);

        let err = engine.get_page(handle, 3).expect_err("page 3 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 3, page_count: 1 }));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"definitely not a pdf".to_vec()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let mut bytes = blank_pdf(&[(100.0, 100.0)]);
        bytes.extend_from_slice(b"\n% /Encrypt\n");

        let err = engine.open(OpenSource::Bytes(bytes)).expect_err("encrypted should fail");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }
}
