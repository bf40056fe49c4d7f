//! Export flattening
//!
//! Every page is rendered again at the export scale, its overlay rasterized
//! on top, and the composite written as one full-bleed image per output
//! page. Annotations stop being editable objects in the result.

use crate::compositor::PageRegistry;
use crate::error::{ExportCause, ExportFailure};
use crate::loader::LoadedDocument;
use pdf_annotator_overlay::{rasterize, FontBook};
use pdf_annotator_scheduler::CancellationToken;
use pdf_engine::{PdfEngine, PdfWriter, RenderRequest};
use std::path::{Path, PathBuf};

/// A finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

impl ExportArtifact {
    /// Write the artifact into `dir` under its file name
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Flatten every page of `document` into a new PDF
///
/// Pages are processed in ascending order and any failure aborts the whole
/// export. The only state touched is the deselection of each overlay.
pub fn flatten<E: PdfEngine + ?Sized>(
    engine: &E,
    document: &LoadedDocument,
    registry: &mut PageRegistry,
    fonts: &FontBook,
    export_scale: f32,
    file_name: &str,
) -> Result<ExportArtifact, ExportFailure> {
    let mut writer = PdfWriter::new();

    for (index, page) in document.pages().iter().enumerate() {
        let number = index as u32 + 1;

        let request = RenderRequest { page: *page, scale: export_scale };
        let mut composite = engine
            .render_page(request, &CancellationToken::new())
            .map_err(|source| ExportCause::Render { page: number, source })?;

        if let Some(overlay) = registry.get_mut(number).and_then(|c| c.overlay_mut()) {
            overlay.discard_active();
            let layer = rasterize(overlay, 1.0, fonts)
                .map_err(|source| ExportCause::Overlay { page: number, source })?;
            image::imageops::overlay(&mut composite, &layer, 0, 0);
        }

        let (width, height) = composite.dimensions();
        let rgb = image::DynamicImage::ImageRgba8(composite).into_rgb8();
        let embedded = writer.embed_image(&rgb).map_err(ExportCause::Write)?;
        writer
            .add_full_bleed_page(width as f32, height as f32, &embedded)
            .map_err(ExportCause::Write)?;
        tracing::debug!(page = number, width, height, "flattened page");
    }

    let page_count = writer.page_count() as u32;
    let bytes = writer.finish().map_err(ExportCause::Write)?;
    Ok(ExportArtifact { file_name: file_name.to_owned(), bytes, page_count })
}
