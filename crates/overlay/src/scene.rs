//! Overlay scene: the mutable object collection for one page
//!
//! The scene owns its objects, the active (selected) object, the text-edit
//! target and the interaction flags set by the current tool. Observable state
//! changes are queued as [`SceneEvent`]s for the owner to drain.

use crate::object::{AnnotationId, AnnotationKind, AnnotationObject, PathProps, Point};
use crate::Color;

/// Freehand brush used while drawing is armed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub color: Color,
    pub width: f32,
}

/// Interaction capabilities applied uniformly to a scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    /// Whether pointer presses may select objects
    pub selection_enabled: bool,
    /// Value of every object's `selectable` and `evented` flags
    pub objects_interactive: bool,
    /// Armed freehand brush, if any
    pub drawing: Option<Brush>,
}

impl Default for Interaction {
    fn default() -> Self {
        Self { selection_enabled: true, objects_interactive: true, drawing: None }
    }
}

/// State changes reported by a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    SelectionCreated(AnnotationId),
    SelectionCleared(AnnotationId),
    ObjectAdded(AnnotationId),
    ObjectRemoved(AnnotationId),
}

#[derive(Debug)]
pub struct OverlayScene {
    width: u32,
    height: u32,
    objects: Vec<AnnotationObject>,
    active: Option<AnnotationId>,
    editing: Option<AnnotationId>,
    interaction: Interaction,
    stroke: Option<Vec<Point>>,
    events: Vec<SceneEvent>,
    redraws: u64,
}

impl OverlayScene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            objects: Vec::new(),
            active: None,
            editing: None,
            interaction: Interaction::default(),
            stroke: None,
            events: Vec::new(),
            redraws: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Objects in paint order (last is topmost)
    pub fn objects(&self) -> &[AnnotationObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&AnnotationObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut AnnotationObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.get(id).is_some()
    }

    /// Add an object on top. It takes the scene's current interactivity.
    pub fn add(&mut self, mut object: AnnotationObject) -> AnnotationId {
        object.selectable = self.interaction.objects_interactive;
        object.evented = self.interaction.objects_interactive;
        let id = object.id;
        self.objects.push(object);
        self.events.push(SceneEvent::ObjectAdded(id));
        self.request_redraw();
        id
    }

    /// Remove an object, clearing the selection if it was active
    pub fn remove(&mut self, id: AnnotationId) -> Option<AnnotationObject> {
        let index = self.objects.iter().position(|object| object.id == id)?;
        if self.active == Some(id) {
            self.discard_active();
        }
        let object = self.objects.remove(index);
        self.events.push(SceneEvent::ObjectRemoved(id));
        self.request_redraw();
        Some(object)
    }

    pub fn active(&self) -> Option<AnnotationId> {
        self.active
    }

    pub fn active_object(&self) -> Option<&AnnotationObject> {
        self.active.and_then(|id| self.get(id))
    }

    /// Make `id` the active object
    ///
    /// A previously active object is cleared first, so a switch is reported
    /// as a clear followed by a create. Returns `false` for unknown ids.
    pub fn set_active(&mut self, id: AnnotationId) -> bool {
        if !self.contains(id) {
            return false;
        }
        if self.active == Some(id) {
            return true;
        }
        self.discard_active();
        self.active = Some(id);
        self.events.push(SceneEvent::SelectionCreated(id));
        self.request_redraw();
        true
    }

    /// Clear the active object. Also ends text editing.
    pub fn discard_active(&mut self) -> Option<AnnotationId> {
        let id = self.active.take()?;
        self.editing = None;
        self.events.push(SceneEvent::SelectionCleared(id));
        self.request_redraw();
        Some(id)
    }

    /// Text object currently in edit mode
    pub fn editing(&self) -> Option<AnnotationId> {
        self.editing
    }

    /// Enter edit mode on a text object; it becomes active if it is not
    pub fn enter_editing(&mut self, id: AnnotationId) -> bool {
        if self.get(id).and_then(AnnotationObject::as_text).is_none() {
            return false;
        }
        self.set_active(id);
        self.editing = Some(id);
        true
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    /// Apply interaction flags to the scene and every object in it
    pub fn set_interaction(&mut self, interaction: Interaction) {
        self.interaction = interaction;
        if interaction.drawing.is_none() {
            self.stroke = None;
        }
        for object in &mut self.objects {
            object.selectable = interaction.objects_interactive;
            object.evented = interaction.objects_interactive;
        }
    }

    /// Topmost object whose bounds contain `point`, ignoring interactivity
    pub fn hit_test(&self, point: Point) -> Option<AnnotationId> {
        self.objects
            .iter()
            .rev()
            .find(|object| object.bounds().contains(point))
            .map(|object| object.id)
    }

    /// Topmost evented object under `point`
    pub fn target_at(&self, point: Point) -> Option<AnnotationId> {
        self.objects
            .iter()
            .rev()
            .filter(|object| object.evented)
            .find(|object| object.bounds().contains(point))
            .map(|object| object.id)
    }

    /// Move an object by `(dx, dy)`
    pub fn translate(&mut self, id: AnnotationId, dx: f32, dy: f32) -> bool {
        let Some(object) = self.get_mut(id) else {
            return false;
        };
        object.position.x += dx;
        object.position.y += dy;
        self.request_redraw();
        true
    }

    /// Start a freehand stroke. Ignored unless drawing is armed.
    pub fn begin_stroke(&mut self, point: Point) -> bool {
        if self.interaction.drawing.is_none() {
            return false;
        }
        self.stroke = Some(vec![point]);
        true
    }

    pub fn extend_stroke(&mut self, point: Point) {
        if let Some(points) = self.stroke.as_mut() {
            points.push(point);
        }
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Commit the stroke in progress as a path object
    pub fn finish_stroke(&mut self) -> Option<AnnotationId> {
        let points = self.stroke.take()?;
        let brush = self.interaction.drawing?;
        let (origin, path) = PathProps::from_absolute(&points, brush.color, brush.width);
        Some(self.add(AnnotationObject::new(origin, AnnotationKind::Path(path))))
    }

    /// Mark the scene as needing a repaint
    pub fn request_redraw(&mut self) {
        self.redraws += 1;
    }

    /// Number of repaints requested since creation
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Drain queued events in the order they happened
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::TextProps;

    fn text_at(x: f32, y: f32) -> AnnotationObject {
        AnnotationObject::new(
            Point::new(x, y),
            AnnotationKind::Text(TextProps {
                content: "Edit me".to_owned(),
                font_family: "Arial".to_owned(),
                font_size: 24.0,
                fill: Color::BLACK,
            }),
        )
    }

    #[test]
    fn add_and_remove_objects() {
        let mut scene = OverlayScene::new(100, 100);
        let id = scene.add(text_at(10.0, 10.0));

        assert_eq!(scene.len(), 1);
        assert!(scene.remove(id).is_some());
        assert!(scene.is_empty());
        assert!(scene.remove(id).is_none());
        assert_eq!(
            scene.take_events(),
            vec![SceneEvent::ObjectAdded(id), SceneEvent::ObjectRemoved(id)]
        );
    }

    #[test]
    fn switching_active_reports_clear_then_create() {
        let mut scene = OverlayScene::new(100, 100);
        let a = scene.add(text_at(0.0, 0.0));
        let b = scene.add(text_at(50.0, 50.0));
        scene.take_events();

        assert!(scene.set_active(a));
        assert!(scene.set_active(b));
        assert_eq!(
            scene.take_events(),
            vec![
                SceneEvent::SelectionCreated(a),
                SceneEvent::SelectionCleared(a),
                SceneEvent::SelectionCreated(b),
            ]
        );
        assert_eq!(scene.active(), Some(b));
    }

    #[test]
    fn removing_active_clears_selection() {
        let mut scene = OverlayScene::new(100, 100);
        let id = scene.add(text_at(0.0, 0.0));
        scene.enter_editing(id);
        scene.take_events();

        scene.remove(id);
        assert_eq!(scene.active(), None);
        assert_eq!(scene.editing(), None);
        assert_eq!(
            scene.take_events(),
            vec![SceneEvent::SelectionCleared(id), SceneEvent::ObjectRemoved(id)]
        );
    }

    #[test]
    fn set_active_unknown_id_is_rejected() {
        let mut scene = OverlayScene::new(100, 100);
        assert!(!scene.set_active(uuid::Uuid::new_v4()));
        assert!(scene.take_events().is_empty());
    }

    #[test]
    fn interaction_applies_to_existing_and_new_objects() {
        let mut scene = OverlayScene::new(100, 100);
        let before = scene.add(text_at(0.0, 0.0));

        scene.set_interaction(Interaction {
            selection_enabled: false,
            objects_interactive: false,
            drawing: None,
        });
        let after = scene.add(text_at(40.0, 40.0));

        for id in [before, after] {
            let object = scene.get(id).expect("object exists");
            assert!(!object.selectable);
            assert!(!object.evented);
        }
    }

    #[test]
    fn hit_test_ignores_evented_but_target_does_not() {
        let mut scene = OverlayScene::new(200, 200);
        let id = scene.add(text_at(10.0, 10.0));
        scene.set_interaction(Interaction {
            selection_enabled: false,
            objects_interactive: false,
            drawing: None,
        });

        let inside = Point::new(12.0, 12.0);
        assert_eq!(scene.hit_test(inside), Some(id));
        assert_eq!(scene.target_at(inside), None);
        assert_eq!(scene.hit_test(Point::new(190.0, 190.0)), None);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut scene = OverlayScene::new(200, 200);
        let _below = scene.add(text_at(10.0, 10.0));
        let above = scene.add(text_at(12.0, 12.0));

        assert_eq!(scene.hit_test(Point::new(20.0, 20.0)), Some(above));
    }

    #[test]
    fn stroke_requires_armed_brush() {
        let mut scene = OverlayScene::new(200, 200);
        assert!(!scene.begin_stroke(Point::new(1.0, 1.0)));
        assert_eq!(scene.finish_stroke(), None);

        scene.set_interaction(Interaction {
            selection_enabled: false,
            objects_interactive: false,
            drawing: Some(Brush { color: Color::rgb(0xef, 0x44, 0x44), width: 3.0 }),
        });
        assert!(scene.begin_stroke(Point::new(10.0, 10.0)));
        scene.extend_stroke(Point::new(20.0, 30.0));
        let id = scene.finish_stroke().expect("stroke should commit");

        let object = scene.get(id).expect("path exists");
        assert_eq!(object.position, Point::new(8.5, 8.5));
        let AnnotationKind::Path(path) = &object.kind else {
            panic!("expected a path");
        };
        assert_eq!(path.points.len(), 2);
        assert_eq!(path.stroke_width, 3.0);
    }

    #[test]
    fn translate_moves_object() {
        let mut scene = OverlayScene::new(100, 100);
        let id = scene.add(text_at(10.0, 10.0));

        assert!(scene.translate(id, 5.0, -2.0));
        assert_eq!(scene.get(id).map(|o| o.position), Some(Point::new(15.0, 8.0)));
    }
}
