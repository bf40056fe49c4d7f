//! Tool modes and the interaction each one applies to page overlays

use pdf_annotator_overlay::{Brush, Interaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Text,
    Image,
    Draw,
    Eraser,
}

impl Tool {
    pub const ALL: [Tool; 5] = [Tool::Select, Tool::Text, Tool::Image, Tool::Draw, Tool::Eraser];

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Text => "text",
            Tool::Image => "image",
            Tool::Draw => "draw",
            Tool::Eraser => "eraser",
        }
    }

    /// Overlay settings while this tool is active
    ///
    /// Only select mode lets objects be picked; only draw mode arms `brush`.
    pub fn interaction(self, brush: Brush) -> Interaction {
        let select = self == Tool::Select;
        Interaction {
            selection_enabled: select,
            objects_interactive: select,
            drawing: (self == Tool::Draw).then_some(brush),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool {0:?} (expected select, text, image, draw or eraser)")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownTool(value.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_annotator_overlay::Color;

    fn brush() -> Brush {
        Brush { color: Color::rgb(0xef, 0x44, 0x44), width: 3.0 }
    }

    #[test]
    fn only_select_mode_is_interactive() {
        for tool in Tool::ALL {
            let interaction = tool.interaction(brush());
            let select = tool == Tool::Select;
            assert_eq!(interaction.selection_enabled, select, "{tool}");
            assert_eq!(interaction.objects_interactive, select, "{tool}");
        }
    }

    #[test]
    fn only_draw_mode_arms_the_brush() {
        for tool in Tool::ALL {
            let armed = tool.interaction(brush()).drawing;
            if tool == Tool::Draw {
                assert_eq!(armed, Some(brush()));
            } else {
                assert_eq!(armed, None, "{tool}");
            }
        }
    }

    #[test]
    fn names_parse_back() {
        for tool in Tool::ALL {
            assert_eq!(tool.as_str().parse::<Tool>(), Ok(tool));
        }
        assert_eq!(" Draw ".parse::<Tool>(), Ok(Tool::Draw));
        assert!("lasso".parse::<Tool>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Tool::Eraser).expect("serialize"), "\"eraser\"");
        let tool: Tool = serde_json::from_str("\"image\"").expect("deserialize");
        assert_eq!(tool, Tool::Image);
        assert_eq!(Tool::default(), Tool::Select);
    }
}
