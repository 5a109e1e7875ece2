//! Asset kind definitions.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Semantic kind of a source asset, determines routing.
///
/// Derived from the file extension only, never from file contents.
/// Serialized by its short [`name`](AssetKind::name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    /// JavaScript module (.js, .mjs, .cjs)
    Script,
    /// Plain CSS (.css)
    StylesheetPlain,
    /// Less (.less)
    StylesheetLess,
    /// Sass / SCSS (.sass, .scss)
    StylesheetSass,
    /// Stylus (.styl)
    StylesheetStylus,
    /// Raster image (.png, .jpg, .jpeg, .gif, .webp)
    RasterImage,
    /// Font binary (.ttf, .woff, .woff2)
    FontBinary,
    /// HTML template (.html)
    HtmlTemplate,
    /// Anything else
    Other,
}

impl AssetKind {
    /// Every kind, in routing-table order.
    pub const ALL: [Self; 9] = [
        Self::Script,
        Self::StylesheetPlain,
        Self::StylesheetLess,
        Self::StylesheetSass,
        Self::StylesheetStylus,
        Self::RasterImage,
        Self::FontBinary,
        Self::HtmlTemplate,
        Self::Other,
    ];

    /// Detect asset kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Self::Script,
            "css" => Self::StylesheetPlain,
            "less" => Self::StylesheetLess,
            "sass" | "scss" => Self::StylesheetSass,
            "styl" => Self::StylesheetStylus,
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Self::RasterImage,
            "ttf" | "woff" | "woff2" => Self::FontBinary,
            "html" => Self::HtmlTemplate,
            _ => Self::Other,
        }
    }

    /// Classify a path. Total: unmatched or missing extensions are `Other`.
    pub fn classify(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(Self::Other, Self::from_extension)
    }

    /// Display name, also the key used in `[rules] skip`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::StylesheetPlain => "css",
            Self::StylesheetLess => "less",
            Self::StylesheetSass => "sass",
            Self::StylesheetStylus => "stylus",
            Self::RasterImage => "image",
            Self::FontBinary => "font",
            Self::HtmlTemplate => "html",
            Self::Other => "other",
        }
    }

    /// Parse a kind from its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Returns true for the four stylesheet dialects.
    #[inline]
    pub fn is_style(self) -> bool {
        matches!(
            self,
            Self::StylesheetPlain
                | Self::StylesheetLess
                | Self::StylesheetSass
                | Self::StylesheetStylus
        )
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for AssetKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for AssetKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name).ok_or_else(|| {
            let expected: Vec<_> = Self::ALL.iter().map(|k| k.name()).collect();
            serde::de::Error::custom(format!(
                "unknown asset kind `{name}`, expected one of: {}",
                expected.join(", ")
            ))
        })
    }
}
