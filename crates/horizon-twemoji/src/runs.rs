//! Typed run model for document content.
//!
//! A document is a sequence of blocks; each block is a sequence of runs.
//! Text runs carry literal text, image runs carry an [`InlineImageFormat`]
//! and occupy exactly one char position in the backing store (the object
//! replacement character). All offsets are integer char offsets into the
//! document; there is no hidden cursor state.

use std::ops::Range;

/// The char an inline image occupies in the backing text (U+FFFC).
///
/// Exactly one per image run; it matches no emoji or alias pattern, so
/// rescans never touch positions that already hold an image.
pub const OBJECT_REPLACEMENT_CHARACTER: char = '\u{FFFC}';

/// Display parameters of one inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImageFormat {
    /// Resource name; engine-produced runs use the `twemoji://` scheme.
    pub uri: String,
    /// Logical display width in pixels (glyph size plus both margins).
    pub width: u32,
    /// Logical display height in pixels.
    pub height: u32,
}

impl InlineImageFormat {
    /// Create a format with equal width and height.
    pub fn square(uri: impl Into<String>, side: u32) -> Self {
        Self {
            uri: uri.into(),
            width: side,
            height: side,
        }
    }
}

/// One inline image in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImageRun {
    /// Char offset of the placeholder this run occupies.
    pub position: usize,
    /// How to display it.
    pub format: InlineImageFormat,
}

/// A run as exposed by `runs()`/`block_runs()`.
///
/// Text runs never cross block boundaries and never include the separator
/// newline; image runs span exactly one char.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRun {
    /// Literal text.
    Text {
        /// Document-absolute char range.
        range: Range<usize>,
        /// The text in that range.
        text: String,
    },
    /// An inline image.
    Image {
        /// Document-absolute char offset of the placeholder.
        position: usize,
        /// Display parameters.
        format: InlineImageFormat,
    },
}

impl DocumentRun {
    /// Whether this is an image run.
    pub fn is_image(&self) -> bool {
        matches!(self, DocumentRun::Image { .. })
    }

    /// Char length of the run.
    pub fn len_chars(&self) -> usize {
        match self {
            DocumentRun::Text { range, .. } => range.end - range.start,
            DocumentRun::Image { .. } => 1,
        }
    }
}
