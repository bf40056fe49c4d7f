//! Font lookup for text rasterization

use ab_glyph::FontArc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::OverlayError;

/// Family name of the face compiled into the crate
pub const DEFAULT_FAMILY: &str = "DejaVu Sans";

/// Embedded face, parsed once on first use
static DEFAULT_FONT: OnceLock<Option<FontArc>> = OnceLock::new();

fn default_font<'a>() -> Option<&'a FontArc> {
    DEFAULT_FONT
        .get_or_init(|| {
            let font_data = include_bytes!("../assets/fonts/DejaVuSans.ttf");
            FontArc::try_from_slice(font_data).ok()
        })
        .as_ref()
}

/// Fonts keyed by family name (case-insensitive)
///
/// Names that were never loaded resolve to the first loaded family, and an
/// empty book resolves everything to the embedded [`DEFAULT_FAMILY`] face.
#[derive(Clone, Default)]
pub struct FontBook {
    families: HashMap<String, FontArc>,
    fallback: Option<String>,
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TrueType/OpenType file for `family`
    ///
    /// The first family loaded also serves as the fallback for unknown names.
    pub fn load_file(&mut self, family: &str, path: &Path) -> Result<(), OverlayError> {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::FontIo {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| OverlayError::InvalidFont(path.display().to_string()))?;
        self.insert(family, font);
        Ok(())
    }

    pub fn insert(&mut self, family: &str, font: FontArc) {
        let key = family.to_lowercase();
        if self.fallback.is_none() {
            self.fallback = Some(key.clone());
        }
        self.families.insert(key, font);
    }

    /// Font for `family`, or the fallback font
    pub fn resolve(&self, family: &str) -> Option<&FontArc> {
        self.families
            .get(&family.to_lowercase())
            .or_else(|| self.fallback.as_ref().and_then(|key| self.families.get(key)))
            .or_else(default_font)
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<_> = self.families.keys().collect();
        families.sort();
        f.debug_struct("FontBook").field("families", &families).finish()
    }
}
