//! Annotation scripts: a JSON list of session actions replayed in order

use anyhow::{bail, Context, Result};
use pdf_annotator_core::{AnnotationId, Point, PointerOutcome, PropertyUpdate, Session, Tool};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Tool { tool: Tool },
    Click { page: u32, x: f32, y: f32 },
    /// Press at the first point, move through the rest, release at the last
    Drag { page: u32, points: Vec<[f32; 2]> },
    UploadImage { path: PathBuf },
    Select { target: String },
    ClearSelection,
    Apply {
        #[serde(default = "active_target")]
        target: String,
        update: PropertyUpdate,
    },
    Delete {
        #[serde(default = "active_target")]
        target: String,
    },
    Zoom { zoom: f32 },
    ZoomIn,
    ZoomOut,
}

fn active_target() -> String {
    "active".to_owned()
}

/// Parsed script plus the directory its relative paths resolve against
#[derive(Debug)]
pub struct Script {
    actions: Vec<Action>,
    base_dir: PathBuf,
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        let actions: Vec<Action> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid script {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { actions, base_dir })
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Run every action against `session`
    pub fn replay(&self, session: &mut Session) -> Result<()> {
        let mut last = None;
        for (step, action) in self.actions.iter().enumerate() {
            self.apply_action(session, action, &mut last)
                .with_context(|| format!("script step {} failed", step + 1))?;
        }
        Ok(())
    }

    fn apply_action(
        &self,
        session: &mut Session,
        action: &Action,
        last: &mut Option<AnnotationId>,
    ) -> Result<()> {
        match action {
            Action::Tool { tool } => session.set_tool(*tool),
            Action::Click { page, x, y } => {
                let point = Point::new(*x, *y);
                remember(last, session.pointer_down(*page, point));
                remember(last, session.pointer_up(*page, point));
            }
            Action::Drag { page, points } => {
                let Some((first, rest)) = points.split_first() else {
                    bail!("drag needs at least one point");
                };
                remember(last, session.pointer_down(*page, Point::new(first[0], first[1])));
                let end = rest.last().unwrap_or(first);
                let middle = &rest[..rest.len().saturating_sub(1)];
                for point in middle {
                    session.pointer_move(*page, Point::new(point[0], point[1]));
                }
                remember(last, session.pointer_up(*page, Point::new(end[0], end[1])));
            }
            Action::UploadImage { path } => {
                let path = self.base_dir.join(path);
                let bytes = fs::read(&path)
                    .with_context(|| format!("failed to read image {}", path.display()))?;
                let id = session.insert_image(&bytes).context("failed to insert image")?;
                *last = Some(id);
            }
            Action::Select { target } => {
                if let Some(id) = resolve(session, target, *last)? {
                    if !session.select(id) {
                        tracing::warn!(%id, "select target not found");
                    }
                }
            }
            Action::ClearSelection => session.clear_selection(),
            Action::Apply { target, update } => {
                if let Some(id) = resolve(session, target, *last)? {
                    session.apply(id, update);
                }
            }
            Action::Delete { target } => {
                if let Some(id) = resolve(session, target, *last)? {
                    session.delete(id);
                }
            }
            Action::Zoom { zoom } => {
                session.set_zoom(*zoom);
            }
            Action::ZoomIn => {
                session.zoom_in();
            }
            Action::ZoomOut => {
                session.zoom_out();
            }
        }
        Ok(())
    }
}

fn remember(last: &mut Option<AnnotationId>, outcome: PointerOutcome) {
    match outcome {
        PointerOutcome::Selected(id)
        | PointerOutcome::TextInserted(id)
        | PointerOutcome::PathCreated(id) => *last = Some(id),
        _ => {}
    }
}

/// Resolve `active`, `last` or a literal object id
fn resolve(
    session: &Session,
    target: &str,
    last: Option<AnnotationId>,
) -> Result<Option<AnnotationId>> {
    let id = match target {
        "active" => session.active().map(|(_, object)| object.id),
        "last" => last,
        literal => Some(
            AnnotationId::parse_str(literal)
                .with_context(|| format!("invalid target {literal:?}"))?,
        ),
    };
    if id.is_none() {
        tracing::warn!(script_target = target, "script target has no object");
    }
    Ok(id)
}
