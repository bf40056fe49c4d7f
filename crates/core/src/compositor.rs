//! Page composites: a rendered background plus the overlay scene drawn on it
//!
//! Rendering is split in two phases so a newer request can supersede an
//! older one. [`PageRegistry::begin_render`] issues a ticket and drops the
//! page's current raster pair; [`PageRegistry::complete_render`] runs the
//! engine and installs the result only if the ticket is still current.

use pdf_annotator_overlay::{Interaction, OverlayScene};
use pdf_annotator_scheduler::{RenderTicket, RenderTokens};
use pdf_engine::{PageHandle, PdfEngine, PdfEngineError, RenderRequest, RgbaImage};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct PageComposite {
    number: u32,
    page: PageHandle,
    sequence: u64,
    scale: Option<f32>,
    background: Option<RgbaImage>,
    overlay: Option<OverlayScene>,
}

impl PageComposite {
    fn new(number: u32, page: PageHandle, sequence: u64) -> Self {
        Self { number, page, sequence, scale: None, background: None, overlay: None }
    }

    /// 1-based page number
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn page(&self) -> PageHandle {
        self.page
    }

    /// Creation order within the registry
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Scale of the installed background
    pub fn scale(&self) -> Option<f32> {
        self.scale
    }

    /// Displayed size in device pixels, `(0, 0)` until a render completes
    pub fn dimensions(&self) -> (u32, u32) {
        self.background.as_ref().map_or((0, 0), |background| background.dimensions())
    }

    pub fn is_ready(&self) -> bool {
        self.background.is_some() && self.overlay.is_some()
    }

    pub fn background(&self) -> Option<&RgbaImage> {
        self.background.as_ref()
    }

    pub fn overlay(&self) -> Option<&OverlayScene> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayScene> {
        self.overlay.as_mut()
    }

    /// Drop the raster pair. Every annotation on the page goes with it.
    fn dispose(&mut self) -> Option<OverlayScene> {
        self.scale = None;
        self.background = None;
        self.overlay.take()
    }

    fn install(&mut self, scale: f32, background: RgbaImage, interaction: Interaction) {
        let (width, height) = background.dimensions();
        let mut overlay = OverlayScene::new(width, height);
        overlay.set_interaction(interaction);
        self.scale = Some(scale);
        self.background = Some(background);
        self.overlay = Some(overlay);
    }
}

/// A render requested by [`PageRegistry::begin_render`]
#[derive(Debug, Clone)]
pub struct RenderJob {
    ticket: RenderTicket,
    page: PageHandle,
    scale: f32,
}

impl RenderJob {
    pub fn page_number(&self) -> u32 {
        self.ticket.page()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Background and a fresh overlay are installed at this size
    Ready { width: u32, height: u32 },
    /// A newer render for the page took over; the result was discarded
    Superseded,
}

/// Page composites ordered by page number
#[derive(Debug, Default)]
pub struct PageRegistry {
    pages: BTreeMap<u32, PageComposite>,
    tokens: RenderTokens,
    next_sequence: u64,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every composite and cancel renders in flight
    pub fn clear(&mut self) {
        let cancelled = self.tokens.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled renders for discarded pages");
        }
        self.pages.clear();
    }

    /// Add a composite for 1-based page `number`, replacing any existing one
    pub fn insert(&mut self, number: u32, page: PageHandle) {
        self.next_sequence += 1;
        self.pages.insert(number, PageComposite::new(number, page, self.next_sequence));
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&PageComposite> {
        self.pages.get(&number)
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut PageComposite> {
        self.pages.get_mut(&number)
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Composites in ascending page order
    pub fn iter(&self) -> impl Iterator<Item = &PageComposite> {
        self.pages.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PageComposite> {
        self.pages.values_mut()
    }

    /// Overlays of ready pages, in page order
    pub fn overlays_mut(&mut self) -> impl Iterator<Item = (u32, &mut OverlayScene)> {
        self.pages
            .iter_mut()
            .filter_map(|(number, composite)| composite.overlay.as_mut().map(|o| (*number, o)))
    }

    /// Start a render of page `number` at `scale`
    ///
    /// Any outstanding render for the page is cancelled and its current
    /// background and overlay are dropped, so the page reports a zero size
    /// until the new render completes. Returns the dropped overlay, if any.
    pub fn begin_render(
        &mut self,
        number: u32,
        scale: f32,
    ) -> Option<(RenderJob, Option<OverlayScene>)> {
        let composite = self.pages.get_mut(&number)?;
        let ticket = self.tokens.issue(number);
        let disposed = composite.dispose();
        let job = RenderJob { ticket, page: composite.page, scale };
        Some((job, disposed))
    }

    /// Run `job` and install its result if it is still current
    ///
    /// A new overlay exactly the size of the background is created with
    /// `interaction` applied. Cancellation is reported as
    /// [`RenderStatus::Superseded`], never as an error.
    pub fn complete_render<E: PdfEngine + ?Sized>(
        &mut self,
        engine: &E,
        job: RenderJob,
        interaction: Interaction,
    ) -> Result<RenderStatus, PdfEngineError> {
        let number = job.page_number();
        if !self.tokens.is_current(&job.ticket) {
            tracing::debug!(page = number, "render superseded before it started");
            return Ok(RenderStatus::Superseded);
        }

        let request = RenderRequest { page: job.page, scale: job.scale };
        let rendered = engine.render_page(request, job.ticket.token());
        if !self.tokens.complete(&job.ticket) {
            tracing::debug!(page = number, "render superseded");
            return Ok(RenderStatus::Superseded);
        }

        let background = match rendered {
            Ok(background) => background,
            Err(err) if err.is_cancelled() => {
                tracing::debug!(page = number, "render cancelled");
                return Ok(RenderStatus::Superseded);
            }
            Err(err) => return Err(err),
        };

        let Some(composite) = self.pages.get_mut(&number) else {
            return Ok(RenderStatus::Superseded);
        };
        let (width, height) = background.dimensions();
        composite.install(job.scale, background, interaction);
        tracing::debug!(page = number, width, height, scale = job.scale, "page composite ready");
        Ok(RenderStatus::Ready { width, height })
    }

    /// Render page `number` to completion
    pub fn render<E: PdfEngine + ?Sized>(
        &mut self,
        engine: &E,
        number: u32,
        scale: f32,
        interaction: Interaction,
    ) -> Result<(RenderStatus, Option<OverlayScene>), PdfEngineError> {
        let Some((job, disposed)) = self.begin_render(number, scale) else {
            return Err(PdfEngineError::PageOutOfRange {
                page: number,
                page_count: self.pages.len() as u32,
            });
        };
        let status = self.complete_render(engine, job, interaction)?;
        Ok((status, disposed))
    }
}
