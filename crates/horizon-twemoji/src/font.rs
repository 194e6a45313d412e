//! Font description driving automatic emoji sizing.

/// Multiplier from point size to line height.
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// A font family + size pair.
///
/// The engine does not rasterize text; the font exists so emoji images can
/// be sized to match the surrounding glyphs. When a document sizes emoji
/// automatically, the target is 90% of [`line_height`](Self::line_height).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFont {
    family: String,
    point_size: f32,
}

impl TextFont {
    /// Create a font description.
    pub fn new(family: impl Into<String>, point_size: f32) -> Self {
        Self {
            family: family.into(),
            point_size,
        }
    }

    /// The font family name.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// The point size.
    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    /// Line height in logical pixels (point size times 1.2).
    pub fn line_height(&self) -> f32 {
        self.point_size * LINE_HEIGHT_FACTOR
    }
}

impl Default for TextFont {
    fn default() -> Self {
        Self::new("Sans Serif", 12.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_height() {
        let font = TextFont::new("Sans Serif", 10.0);
        assert!((font.line_height() - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_font() {
        let font = TextFont::default();
        assert_eq!(font.family(), "Sans Serif");
        assert!((font.point_size() - 12.0).abs() < f32::EPSILON);
    }
}
