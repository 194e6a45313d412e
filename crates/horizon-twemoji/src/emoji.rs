//! Emoji records and the database seam.
//!
//! The engine does not ship an emoji database. Host applications provide one
//! through the [`EmojiDatabase`] trait; the engine only ever asks it two
//! questions (by character sequence, by alias) and treats every miss as
//! "leave the text alone".

use std::path::PathBuf;
use std::sync::Arc;

/// Skin tone modifier scalars (Fitzpatrick types 1-2 through 6).
///
/// These combine with a base emoji to change its skin tone. Lookup strips
/// them first so a toned grapheme resolves to the same record as its base.
pub const SKIN_TONE_MODIFIERS: std::ops::RangeInclusive<char> = '\u{1F3FB}'..='\u{1F3FF}';

/// One emoji known to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiRecord {
    /// Canonical character sequence, e.g. `"😀"` or a full ZWJ sequence.
    pub sequence: String,
    /// Primary alias, e.g. `"grinning"`. This is what resource URIs carry.
    pub alias: String,
    /// Alternate aliases that also resolve to this record.
    pub aliases: Vec<String>,
    /// Path to the source artwork (SVG or raster).
    pub asset: PathBuf,
}

impl EmojiRecord {
    /// Create a record with no alternate aliases.
    pub fn new(
        sequence: impl Into<String>,
        alias: impl Into<String>,
        asset: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            alias: alias.into(),
            aliases: Vec::new(),
            asset: asset.into(),
        }
    }
}

/// Lookup seam implemented by the host application's emoji database.
///
/// Both lookups return owned records; databases are expected to be cheap to
/// query (in-memory maps). The engine never fails on a miss: unknown
/// sequences and aliases simply stay in the document as literal text.
///
/// Sequences passed to [`by_sequence`](Self::by_sequence) have skin tone
/// modifiers already stripped; how variation selectors are normalized is up
/// to the implementation.
pub trait EmojiDatabase {
    /// Look up an emoji by its character sequence.
    fn by_sequence(&self, sequence: &str) -> Option<EmojiRecord>;

    /// Look up an emoji by alias (primary or alternate), without colons.
    fn by_alias(&self, alias: &str) -> Option<EmojiRecord>;
}

/// Shared handle to a database, as documents store it.
pub type SharedEmojiDatabase = Arc<dyn EmojiDatabase + Send + Sync>;

/// Whether a char is a skin tone modifier.
pub fn is_skin_tone_modifier(c: char) -> bool {
    SKIN_TONE_MODIFIERS.contains(&c)
}

/// Remove all skin tone modifiers from a sequence.
///
/// Returns the input unchanged (no allocation beyond the output string) when
/// no modifier is present.
pub fn strip_skin_tones(sequence: &str) -> String {
    sequence.chars().filter(|c| !is_skin_tone_modifier(*c)).collect()
}
