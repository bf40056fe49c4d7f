//! Selection and property editing across pages
//!
//! Each overlay tracks its own active object. The bridge keeps the
//! document-wide view: at most one page holds an active object, and
//! selection changes are reported as [`SelectionEvent`]s in the order they
//! happened.

use crate::compositor::PageRegistry;
use crate::error::ApplyOutcome;
use pdf_annotator_overlay::{AnnotationId, AnnotationObject, Color, Point, SceneEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SelectionEvent {
    Created { page: u32, id: AnnotationId },
    Cleared { page: u32 },
}

/// Property changes for one object. Unset fields are left alone.
///
/// Text-only fields are ignored for paths and images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub opacity: Option<f32>,
    pub font_size: Option<f32>,
    pub fill: Option<Color>,
    pub font_family: Option<String>,
    pub content: Option<String>,
}

impl PropertyUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.x = Some(position.x);
        self.y = Some(position.y);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn with_fill(mut self, fill: Color) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    fn has_text_fields(&self) -> bool {
        self.font_size.is_some()
            || self.fill.is_some()
            || self.font_family.is_some()
            || self.content.is_some()
    }

    fn apply_to(&self, object: &mut AnnotationObject) {
        if let Some(x) = self.x.filter(|x| x.is_finite()) {
            object.position.x = x;
        }
        if let Some(y) = self.y.filter(|y| y.is_finite()) {
            object.position.y = y;
        }
        if let Some(opacity) = self.opacity {
            object.set_opacity(opacity);
        }

        let id = object.id;
        let kind = object.kind.name();
        let Some(text) = object.as_text_mut() else {
            if self.has_text_fields() {
                tracing::debug!(%id, kind, "ignoring text properties on non-text object");
            }
            return;
        };
        if let Some(size) = self.font_size.filter(|size| size.is_finite() && *size > 0.0) {
            text.font_size = size;
        }
        if let Some(fill) = self.fill {
            text.fill = fill;
        }
        if let Some(family) = &self.font_family {
            text.font_family.clone_from(family);
        }
        if let Some(content) = &self.content {
            text.content.clone_from(content);
        }
    }
}

#[derive(Debug, Default)]
pub struct SelectionBridge {
    current: Option<(u32, AnnotationId)>,
    events: Vec<SelectionEvent>,
}

impl SelectionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// First page (in page order) reporting an active object
    pub fn active(registry: &PageRegistry) -> Option<(u32, &AnnotationObject)> {
        registry.iter().find_map(|composite| {
            composite.overlay()?.active_object().map(|object| (composite.number(), object))
        })
    }

    /// Page holding a live object with `id`
    pub fn locate(registry: &PageRegistry, id: AnnotationId) -> Option<u32> {
        registry
            .iter()
            .find(|composite| composite.overlay().is_some_and(|overlay| overlay.contains(id)))
            .map(|composite| composite.number())
    }

    /// Selection as last reported by the overlays
    pub fn current(&self) -> Option<(u32, AnnotationId)> {
        self.current
    }

    /// Make `id` on `page` the one active object, clearing other pages first
    pub fn select(&mut self, registry: &mut PageRegistry, page: u32, id: AnnotationId) -> bool {
        let exists = registry
            .get(page)
            .and_then(|composite| composite.overlay())
            .is_some_and(|overlay| overlay.contains(id));
        if !exists {
            return false;
        }

        for (number, overlay) in registry.overlays_mut() {
            if number != page {
                overlay.discard_active();
            }
        }
        self.sync(registry);

        if let Some(overlay) = registry.get_mut(page).and_then(|c| c.overlay_mut()) {
            overlay.set_active(id);
        }
        self.sync(registry);
        true
    }

    /// Clear the active object on every page
    pub fn clear(&mut self, registry: &mut PageRegistry) {
        for (_, overlay) in registry.overlays_mut() {
            overlay.discard_active();
        }
        self.sync(registry);
    }

    /// Update a live object wherever it is and repaint its page
    pub fn apply(
        &mut self,
        registry: &mut PageRegistry,
        id: AnnotationId,
        update: &PropertyUpdate,
    ) -> ApplyOutcome {
        for (page, overlay) in registry.overlays_mut() {
            let Some(object) = overlay.get_mut(id) else {
                continue;
            };
            update.apply_to(object);
            overlay.request_redraw();
            tracing::debug!(page, %id, "applied property update");
            return ApplyOutcome::Applied { page };
        }
        tracing::debug!(%id, "property update has no target");
        ApplyOutcome::NoTarget
    }

    /// Remove a live object wherever it is
    pub fn delete(&mut self, registry: &mut PageRegistry, id: AnnotationId) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::NoTarget;
        for (page, overlay) in registry.overlays_mut() {
            if overlay.remove(id).is_some() {
                tracing::debug!(page, %id, "deleted object");
                outcome = ApplyOutcome::Applied { page };
                break;
            }
        }
        if outcome == ApplyOutcome::NoTarget {
            tracing::debug!(%id, "delete has no target");
        }
        self.sync(registry);
        outcome
    }

    /// Drain overlay events into selection events
    ///
    /// If overlays were mutated directly and more than one page ends up
    /// with an active object, the page selected last keeps it.
    pub fn sync(&mut self, registry: &mut PageRegistry) {
        for (page, overlay) in registry.overlays_mut() {
            for event in overlay.take_events() {
                match event {
                    SceneEvent::SelectionCreated(id) => {
                        self.current = Some((page, id));
                        self.events.push(SelectionEvent::Created { page, id });
                    }
                    SceneEvent::SelectionCleared(_) => {
                        if self.current.is_some_and(|(current, _)| current == page) {
                            self.current = None;
                        }
                        self.events.push(SelectionEvent::Cleared { page });
                    }
                    SceneEvent::ObjectAdded(_) | SceneEvent::ObjectRemoved(_) => {}
                }
            }
        }

        let keep = self.current.map(|(page, _)| page);
        let mut stray = false;
        for (page, overlay) in registry.overlays_mut() {
            if Some(page) != keep && overlay.discard_active().is_some() {
                stray = true;
            }
        }
        if stray {
            self.sync(registry);
        }
    }

    /// Forget a selection whose overlay was dropped
    pub fn forget_page(&mut self, page: u32) {
        if self.current.is_some_and(|(current, _)| current == page) {
            self.current = None;
            self.events.push(SelectionEvent::Cleared { page });
        }
    }

    /// Forget any selection, as when the document is replaced
    pub fn reset(&mut self) {
        if let Some((page, _)) = self.current.take() {
            self.events.push(SelectionEvent::Cleared { page });
        }
    }

    /// Selection events since the last call, oldest first
    pub fn take_events(&mut self) -> Vec<SelectionEvent> {
        std::mem::take(&mut self.events)
    }
}
