//! Emoji grapheme and `:alias:` token detection.
//!
//! The matcher scans plain text for two things:
//!
//! - emoji graphemes (pictographic clusters, flag pairs, keycaps,
//!   subdivision flags), reported as [`EmojiMatch`]es;
//! - `:alias:` tokens, reported as [`AliasMatch`]es.
//!
//! All offsets are **char offsets** into the scanned string, matching the
//! document's coordinate space. Matches are returned in left-to-right order;
//! callers that splice replacements while iterating must process them in
//! reverse so earlier offsets stay valid. The matcher itself never mutates
//! anything.
//!
//! Patterns are fixed and compiled once per process behind a `OnceLock`;
//! constructing an [`EmojiMatcher`] is free after the first use.

use std::sync::OnceLock;

use regex::Regex;

/// The emoji grapheme pattern, most specific branch first:
///
/// 1. subdivision flags (tag sequences): U+1F3F4, 4-5 tag letters, cancel tag
/// 2. regional indicator pairs (country flags)
/// 3. keycap sequences: digit/#/* + optional VS16 + U+20E3
/// 4. pictographic clusters: an Extended_Pictographic scalar, optional VS16
///    and/or skin tone modifiers, extended by ZWJ-joined continuations
///
/// Regional indicators, tone modifiers, VS16, ZWJ, and U+FFFC are all
/// outside `Extended_Pictographic`, so a lone component never matches and a
/// match never crosses a line break or an object replacement character.
const EMOJI_PATTERN: &str = concat!(
    r"\x{1F3F4}[\x{E0061}-\x{E007A}]{4,5}\x{E007F}",
    r"|[\x{1F1E6}-\x{1F1FF}]{2}",
    r"|[0-9#*]\x{FE0F}?\x{20E3}",
    r"|\p{Extended_Pictographic}(?:\x{FE0F}|[\x{1F3FB}-\x{1F3FF}])*",
    r"(?:\x{200D}\p{Extended_Pictographic}(?:\x{FE0F}|[\x{1F3FB}-\x{1F3FF}])*)*",
);

/// `:alias:` token pattern; the capture excludes the colons.
const ALIAS_PATTERN: &str = r":(\w+):";

fn emoji_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMOJI_PATTERN).expect("emoji pattern is valid"))
}

fn alias_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ALIAS_PATTERN).expect("alias pattern is valid"))
}

/// A detected emoji grapheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiMatch {
    /// Char offset of the first scalar of the grapheme.
    pub start: usize,
    /// Char offset one past the last scalar.
    pub end: usize,
    /// The matched character sequence, skin tones and selectors included.
    pub text: String,
}

impl EmojiMatch {
    /// Length of the match in chars.
    pub fn len_chars(&self) -> usize {
        self.end - self.start
    }
}

/// A detected `:alias:` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMatch {
    /// Char offset of the opening colon.
    pub start: usize,
    /// Char offset one past the closing colon.
    pub end: usize,
    /// The alias between the colons.
    pub alias: String,
}

/// Compiled emoji and alias patterns.
///
/// # Example
///
/// ```
/// use horizon_twemoji::EmojiMatcher;
///
/// let matcher = EmojiMatcher::new();
/// let matches = matcher.find_emoji("hi 😀");
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].start, 3);
/// assert_eq!(matches[0].text, "😀");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EmojiMatcher {
    emoji: &'static Regex,
    alias: &'static Regex,
}

impl EmojiMatcher {
    /// Get a matcher over the process-wide compiled patterns.
    pub fn new() -> Self {
        Self {
            emoji: emoji_regex(),
            alias: alias_regex(),
        }
    }

    /// Find all emoji graphemes, in left-to-right order.
    pub fn find_emoji(&self, text: &str) -> Vec<EmojiMatch> {
        let mut cursor = OffsetCursor::default();
        self.emoji
            .find_iter(text)
            .map(|m| {
                let (start, end) = cursor.to_chars(text, m.start(), m.end());
                EmojiMatch {
                    start,
                    end,
                    text: m.as_str().to_string(),
                }
            })
            .collect()
    }

    /// Find all `:alias:` tokens, in left-to-right order.
    pub fn find_aliases(&self, text: &str) -> Vec<AliasMatch> {
        let mut cursor = OffsetCursor::default();
        self.alias
            .captures_iter(text)
            .map(|caps| {
                let whole = caps.get(0).expect("capture 0 always present");
                let (start, end) = cursor.to_chars(text, whole.start(), whole.end());
                AliasMatch {
                    start,
                    end,
                    alias: caps[1].to_string(),
                }
            })
            .collect()
    }

    /// Whether the string is exactly one emoji grapheme.
    pub fn is_emoji(&self, text: &str) -> bool {
        self.emoji
            .find(text)
            .is_some_and(|m| m.start() == 0 && m.end() == text.len())
    }
}

impl Default for EmojiMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Cumulative byte-to-char offset translation for in-order match streams.
#[derive(Debug, Default)]
struct OffsetCursor {
    byte: usize,
    chars: usize,
}

impl OffsetCursor {
    /// Translate a byte span to a char span. Spans must arrive in
    /// ascending order; the cursor only ever walks forward.
    fn to_chars(&mut self, text: &str, byte_start: usize, byte_end: usize) -> (usize, usize) {
        debug_assert!(byte_start >= self.byte);
        self.chars += text[self.byte..byte_start].chars().count();
        self.byte = byte_start;
        let start = self.chars;
        self.chars += text[self.byte..byte_end].chars().count();
        self.byte = byte_end;
        (start, self.chars)
    }
}
