//! PDFium-backed rasterization.
//!
//! Page structure still comes from lopdf; only the pixels are produced by
//! PDFium, so the handles and page sizes agree with [`LopdfEngine`].

use crate::{
    DocumentHandle, LopdfEngine, OpenSource, PageSize, PageHandle, PdfEngine, PdfEngineError,
    RenderRequest, RgbaImage,
};
use pdf_annotator_scheduler::CancellationToken;
use pdfium_render::prelude::*;

pub struct PdfiumEngine {
    pdfium: Pdfium,
    inner: LopdfEngine,
}

impl PdfiumEngine {
    pub fn from_system_library() -> Result<Self, PdfEngineError> {
        let bindings = Pdfium::bind_to_system_library().map_err(|err| {
            PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
        })?;

        Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::default() })
    }
}

fn backend(err: PdfiumError) -> PdfEngineError {
    PdfEngineError::Backend(err.to_string())
}

impl PdfEngine for PdfiumEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        self.inner.open(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        self.inner.page_count(handle)
    }

    fn page_size(&self, page: PageHandle) -> Result<PageSize, PdfEngineError> {
        self.inner.page_size(page)
    }

    fn render_page(
        &self,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, PdfEngineError> {
        if cancel.is_cancelled() {
            return Err(PdfEngineError::Cancelled);
        }

        let size = self.inner.page_size(request.page)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };
        let (width, height) = size.viewport(scale);

        let bytes = self.inner.document_bytes(request.page.document)?;
        let document = self.pdfium.load_pdf_from_byte_slice(bytes, None).map_err(backend)?;
        let page = document.pages().get(request.page.index as u16).map_err(backend)?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);
        let bitmap = page.render_with_config(&config).map_err(backend)?;

        if cancel.is_cancelled() {
            return Err(PdfEngineError::Cancelled);
        }

        RgbaImage::from_raw(bitmap.width() as u32, bitmap.height() as u32, bitmap.as_rgba_bytes())
            .ok_or_else(|| PdfEngineError::Backend("pdfium returned a short bitmap".to_owned()))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.inner.close(handle)
    }
}
