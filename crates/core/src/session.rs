//! Editing session
//!
//! The session owns the loaded document, its page composites, the current
//! tool and zoom, and the document-wide selection. State changes go through
//! its setters, which carry their side effects: changing zoom re-renders
//! every page, changing tool reapplies interactivity to every overlay.

use crate::compositor::{PageComposite, PageRegistry, RenderJob, RenderStatus};
use crate::config::EditorConfig;
use crate::error::{ApplyOutcome, ExportCause, ExportFailure, InsertImageError, LoadError};
use crate::export::{flatten, ExportArtifact};
use crate::loader::{load_document, FileHint, LoadedDocument};
use crate::selection::{PropertyUpdate, SelectionBridge, SelectionEvent};
use crate::tool::Tool;
use pdf_annotator_overlay::{
    rasterize, AnnotationId, AnnotationKind, AnnotationObject, FontBook, ImageProps, Interaction,
    OverlayError, Point, TextProps,
};
use pdf_engine::{LopdfEngine, PdfEngine, PdfEngineError, RgbaImage};
use std::path::Path;
use std::sync::Arc;

/// What a pointer event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    Ignored,
    Selected(AnnotationId),
    SelectionCleared,
    TextInserted(AnnotationId),
    StrokeStarted,
    StrokeExtended,
    PathCreated(AnnotationId),
    Moved(AnnotationId),
    Erased(AnnotationId),
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    page: u32,
    id: AnnotationId,
    last: Point,
}

pub struct Session<E: PdfEngine = LopdfEngine> {
    engine: E,
    config: EditorConfig,
    fonts: FontBook,
    document: Option<LoadedDocument>,
    registry: PageRegistry,
    selection: SelectionBridge,
    tool: Tool,
    zoom: f32,
    drag: Option<Drag>,
    /// Page whose overlay holds the freehand stroke in progress
    stroking: Option<u32>,
}

impl Session<LopdfEngine> {
    /// Session over the structure-only engine
    pub fn with_default_engine(config: EditorConfig) -> Self {
        Self::new(pdf_engine::default_engine(), config)
    }
}

impl<E: PdfEngine> Session<E> {
    pub fn new(engine: E, config: EditorConfig) -> Self {
        let zoom = config.zoom.clamp(config.zoom.initial);
        Self {
            engine,
            config,
            fonts: FontBook::new(),
            document: None,
            registry: PageRegistry::new(),
            selection: SelectionBridge::new(),
            tool: Tool::default(),
            zoom,
            drag: None,
            stroking: None,
        }
    }

    /// Fonts used when rasterizing text
    pub fn with_fonts(mut self, fonts: FontBook) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn pages(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn page(&self, number: u32) -> Option<&PageComposite> {
        self.registry.get(number)
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, LoadedDocument::page_count)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Device pixels per PDF point at the current zoom
    pub fn render_scale(&self) -> f32 {
        self.config.base_render_scale * self.zoom
    }

    fn interaction(&self) -> Interaction {
        self.tool.interaction(self.config.brush.into())
    }

    /// Load a PDF, replacing the current document
    ///
    /// On failure the current document and its annotations are untouched.
    pub fn load(&mut self, bytes: Vec<u8>, hint: &FileHint) -> Result<u32, LoadError> {
        let document = match load_document(&mut self.engine, bytes, hint) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(error = %err, "rejected document");
                return Err(err);
            }
        };

        if let Some(previous) = self.document.take() {
            if let Err(err) = self.engine.close(previous.handle()) {
                tracing::warn!(error = %err, "failed to close previous document");
            }
        }
        self.registry.clear();
        self.selection.reset();
        self.drag = None;
        self.stroking = None;

        for (index, page) in document.pages().iter().enumerate() {
            self.registry.insert(index as u32 + 1, *page);
        }
        let page_count = document.page_count();
        self.document = Some(document);
        tracing::info!(pages = page_count, "document loaded");

        self.render_all();
        Ok(page_count)
    }

    /// Read and load a PDF file; its name serves as the type hint
    pub fn load_file(&mut self, path: &Path) -> Result<u32, LoadError> {
        let hint = FileHint::from_path(path);
        let bytes = std::fs::read(path)?;
        self.load(bytes, &hint)
    }

    /// Start rendering page `number` at the current scale
    ///
    /// The page drops its background and annotations immediately and reports
    /// a zero size until [`Session::complete_render`] installs the result.
    pub fn begin_render(&mut self, number: u32) -> Option<RenderJob> {
        let scale = self.render_scale();
        let (job, disposed) = self.registry.begin_render(number, scale)?;
        if disposed.is_some() {
            self.drag = self.drag.filter(|drag| drag.page != number);
            self.stroking = self.stroking.filter(|page| *page != number);
            self.selection.forget_page(number);
            tracing::debug!(page = number, scale, "recreating page composite");
        }
        Some(job)
    }

    pub fn complete_render(&mut self, job: RenderJob) -> Result<RenderStatus, PdfEngineError> {
        let interaction = self.interaction();
        self.registry.complete_render(&self.engine, job, interaction)
    }

    fn render_all(&mut self) {
        for number in self.registry.page_numbers() {
            let Some(job) = self.begin_render(number) else {
                continue;
            };
            if let Err(err) = self.complete_render(job) {
                tracing::warn!(page = number, error = %err, "page render failed");
            }
        }
    }

    /// Switch tools and reapply interactivity to every overlay
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.drag = None;
        self.finish_stroke();
        let interaction = self.interaction();
        for (_, overlay) in self.registry.overlays_mut() {
            overlay.set_interaction(interaction);
        }
        tracing::info!(%tool, "tool changed");
    }

    /// Set the zoom level, clamped to the configured range
    ///
    /// A changed zoom recreates every page composite, which discards all
    /// annotations. Returns the zoom now in effect.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            tracing::debug!(zoom, "ignoring non-finite zoom");
            return self.zoom;
        }
        let zoom = self.config.zoom.clamp(zoom);
        if zoom == self.zoom {
            return zoom;
        }
        self.zoom = zoom;
        tracing::info!(zoom, "zoom changed");
        self.render_all();
        zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom + self.config.zoom.step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom - self.config.zoom.step)
    }

    /// Pointer pressed on page `number` at overlay coordinates `point`
    pub fn pointer_down(&mut self, number: u32, point: Point) -> PointerOutcome {
        self.drag = None;
        self.finish_stroke();
        let tool = self.tool;
        let text_defaults = self.config.text.clone();
        let Some(overlay) = self.registry.get_mut(number).and_then(PageComposite::overlay_mut)
        else {
            return PointerOutcome::Ignored;
        };

        match tool {
            Tool::Select => {
                if !overlay.interaction().selection_enabled {
                    return PointerOutcome::Ignored;
                }
                match overlay.target_at(point) {
                    Some(id) => {
                        self.selection.select(&mut self.registry, number, id);
                        self.drag = Some(Drag { page: number, id, last: point });
                        PointerOutcome::Selected(id)
                    }
                    None => {
                        let cleared = overlay.discard_active().is_some();
                        self.selection.sync(&mut self.registry);
                        if cleared {
                            PointerOutcome::SelectionCleared
                        } else {
                            PointerOutcome::Ignored
                        }
                    }
                }
            }
            Tool::Text => {
                if overlay.hit_test(point).is_some() {
                    return PointerOutcome::Ignored;
                }
                let text = TextProps {
                    content: text_defaults.content,
                    font_family: text_defaults.font_family,
                    font_size: text_defaults.font_size,
                    fill: text_defaults.fill,
                };
                let id = overlay.add(AnnotationObject::new(point, AnnotationKind::Text(text)));
                self.selection.select(&mut self.registry, number, id);
                if let Some(overlay) =
                    self.registry.get_mut(number).and_then(PageComposite::overlay_mut)
                {
                    overlay.enter_editing(id);
                }
                self.selection.sync(&mut self.registry);
                tracing::debug!(page = number, %id, "inserted text");
                PointerOutcome::TextInserted(id)
            }
            Tool::Draw => {
                if overlay.begin_stroke(point) {
                    self.stroking = Some(number);
                    PointerOutcome::StrokeStarted
                } else {
                    PointerOutcome::Ignored
                }
            }
            Tool::Eraser => match overlay.hit_test(point) {
                Some(id) => {
                    self.selection.delete(&mut self.registry, id);
                    tracing::debug!(page = number, %id, "erased object");
                    PointerOutcome::Erased(id)
                }
                None => PointerOutcome::Ignored,
            },
            Tool::Image => PointerOutcome::Ignored,
        }
    }

    /// Pointer moved over page `number`
    ///
    /// A stroke only grows on the page it started on.
    pub fn pointer_move(&mut self, number: u32, point: Point) -> PointerOutcome {
        let drag = self.drag;
        let stroking = self.stroking;
        let Some(overlay) = self.registry.get_mut(number).and_then(PageComposite::overlay_mut)
        else {
            return PointerOutcome::Ignored;
        };

        match stroking {
            Some(page) if page == number && overlay.is_stroking() => {
                overlay.extend_stroke(point);
                return PointerOutcome::StrokeExtended;
            }
            Some(_) => return PointerOutcome::Ignored,
            None => {}
        }

        match drag {
            Some(drag) if drag.page == number => {
                if !overlay.translate(drag.id, point.x - drag.last.x, point.y - drag.last.y) {
                    self.drag = None;
                    return PointerOutcome::Ignored;
                }
                self.drag = Some(Drag { last: point, ..drag });
                PointerOutcome::Moved(drag.id)
            }
            _ => PointerOutcome::Ignored,
        }
    }

    /// Pointer released over page `number`
    ///
    /// Releasing anywhere ends a stroke in progress. The release point only
    /// joins the path when it lands on the stroke's own page.
    pub fn pointer_up(&mut self, number: u32, point: Point) -> PointerOutcome {
        let drag = self.drag.take();

        if let Some(page) = self.stroking {
            if page == number {
                if let Some(overlay) =
                    self.registry.get_mut(page).and_then(PageComposite::overlay_mut)
                {
                    overlay.extend_stroke(point);
                }
            } else {
                tracing::debug!(page, released = number, "stroke released over another page");
            }
            return match self.finish_stroke() {
                Some(id) => PointerOutcome::PathCreated(id),
                None => PointerOutcome::Ignored,
            };
        }

        let Some(overlay) = self.registry.get_mut(number).and_then(PageComposite::overlay_mut)
        else {
            return PointerOutcome::Ignored;
        };

        match drag {
            Some(drag) if drag.page == number && point != drag.last => {
                overlay.translate(drag.id, point.x - drag.last.x, point.y - drag.last.y);
                PointerOutcome::Moved(drag.id)
            }
            _ => PointerOutcome::Ignored,
        }
    }

    /// Commit the stroke in progress, wherever it is
    fn finish_stroke(&mut self) -> Option<AnnotationId> {
        let page = self.stroking.take()?;
        let overlay = self.registry.get_mut(page).and_then(PageComposite::overlay_mut)?;
        let id = overlay.finish_stroke()?;
        tracing::debug!(page, %id, "recorded freehand path");
        Some(id)
    }

    /// Place an uploaded image on the first page and select it
    ///
    /// Switches to the image tool, as the upload control does.
    pub fn insert_image(&mut self, bytes: &[u8]) -> Result<AnnotationId, InsertImageError> {
        if self.document.is_none() {
            return Err(InsertImageError::NoDocument);
        }
        let bitmap = image::load_from_memory(bytes)?.into_rgba8();
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(InsertImageError::Empty);
        }

        if self.tool != Tool::Image {
            self.set_tool(Tool::Image);
        }

        let placement = self.config.image;
        let first = self.registry.page_numbers().first().copied();
        let Some((number, overlay)) = first.and_then(|number| {
            self.registry
                .get_mut(number)
                .and_then(PageComposite::overlay_mut)
                .map(|overlay| (number, overlay))
        }) else {
            return Err(InsertImageError::PageNotReady);
        };

        let props = ImageProps::scaled_to_width(Arc::new(bitmap), placement.width);
        let object = AnnotationObject::new(placement.position(), AnnotationKind::Image(props));
        let id = overlay.add(object);
        self.selection.select(&mut self.registry, number, id);
        tracing::debug!(page = number, %id, "inserted image");
        Ok(id)
    }

    /// The active object and its page, if any
    pub fn active(&self) -> Option<(u32, &AnnotationObject)> {
        SelectionBridge::active(&self.registry)
    }

    /// Look up a live object by id
    pub fn object(&self, id: AnnotationId) -> Option<(u32, &AnnotationObject)> {
        let page = SelectionBridge::locate(&self.registry, id)?;
        let object = self.registry.get(page)?.overlay()?.get(id)?;
        Some((page, object))
    }

    /// Select a live object by id
    pub fn select(&mut self, id: AnnotationId) -> bool {
        let Some(page) = SelectionBridge::locate(&self.registry, id) else {
            return false;
        };
        self.selection.select(&mut self.registry, page, id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear(&mut self.registry);
    }

    pub fn apply(&mut self, id: AnnotationId, update: &PropertyUpdate) -> ApplyOutcome {
        self.selection.apply(&mut self.registry, id, update)
    }

    pub fn delete(&mut self, id: AnnotationId) -> ApplyOutcome {
        self.drag = self.drag.filter(|drag| drag.id != id);
        self.selection.delete(&mut self.registry, id)
    }

    /// Selection changes since the last call, oldest first
    pub fn take_selection_events(&mut self) -> Vec<SelectionEvent> {
        self.selection.take_events()
    }

    /// On-screen image of page `number`: background with its overlay on top
    ///
    /// `None` while the page has not finished rendering.
    pub fn page_image(&self, number: u32) -> Result<Option<RgbaImage>, OverlayError> {
        let Some(composite) = self.registry.get(number) else {
            return Ok(None);
        };
        let (Some(background), Some(overlay)) = (composite.background(), composite.overlay())
        else {
            return Ok(None);
        };
        let mut composite = background.clone();
        let layer = rasterize(overlay, 1.0, &self.fonts)?;
        image::imageops::overlay(&mut composite, &layer, 0, 0);
        Ok(Some(composite))
    }

    /// Flatten every page and its annotations into a new PDF
    pub fn export(&mut self) -> Result<ExportArtifact, ExportFailure> {
        let Some(document) = self.document.as_ref() else {
            let failure = ExportFailure::from(ExportCause::NoDocument);
            tracing::warn!(cause = %failure.cause, "export failed");
            return Err(failure);
        };

        tracing::info!(pages = document.page_count(), "export started");
        let result = flatten(
            &self.engine,
            document,
            &mut self.registry,
            &self.fonts,
            self.config.export_scale,
            &self.config.export_file_name,
        );
        self.drag = None;
        self.selection.sync(&mut self.registry);

        match &result {
            Ok(artifact) => tracing::info!(
                pages = artifact.page_count,
                bytes = artifact.bytes.len(),
                file = %artifact.file_name,
                "export finished"
            ),
            Err(failure) => tracing::warn!(cause = %failure.cause, "export failed"),
        }
        result
    }
}
