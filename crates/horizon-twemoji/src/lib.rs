//! Emoji-aware rich text documents for Horizon Twemoji.
//!
//! This crate keeps editable text and inline emoji images in sync. Edits
//! are scanned for emoji graphemes and `:alias:` tokens; matches are
//! replaced with one-char image runs backed by rasterized artwork, and
//! plain-text extraction decodes the runs back, so the text that went in
//! always comes back out.
//!
//! # The document model
//!
//! [`TwemojiTextDocument`] stores text in a rope where every inline image
//! occupies exactly one object replacement character (U+FFFC). All
//! positions are char offsets; blocks are rope lines. Emoji artwork is
//! decoded once per `(alias, size, scale)` by a byte-budgeted
//! [`EmojiPixmapCache`] that documents share, then composited with a
//! per-document margin and registered under a `twemoji://` URI for the
//! paint layer to look up.
//!
//! # Getting started
//!
//! Implement [`EmojiDatabase`] over your emoji index and hand it to a
//! document together with a cache:
//!
//! ```
//! use std::sync::Arc;
//! use horizon_twemoji::{EmojiDatabase, EmojiPixmapCache, EmojiRecord, TwemojiTextDocument};
//!
//! struct Db;
//!
//! impl EmojiDatabase for Db {
//!     fn by_sequence(&self, sequence: &str) -> Option<EmojiRecord> {
//!         (sequence == "\u{1F600}")
//!             .then(|| EmojiRecord::new("\u{1F600}", "grinning", "assets/grinning.svg"))
//!     }
//!     fn by_alias(&self, alias: &str) -> Option<EmojiRecord> {
//!         (alias == "grinning")
//!             .then(|| EmojiRecord::new("\u{1F600}", "grinning", "assets/grinning.svg"))
//!     }
//! }
//!
//! let cache = EmojiPixmapCache::default().into_shared();
//! let mut doc = TwemojiTextDocument::new(Arc::new(Db), cache);
//!
//! // Emoji typed as text become inline image runs.
//! doc.set_text("hi \u{1F600}");
//! assert_eq!(doc.image_run_count(), 1);
//!
//! // :aliases: resolve through the same database.
//! doc.insert_text(doc.char_count(), " :grinning:");
//! assert_eq!(doc.image_run_count(), 2);
//!
//! // Extraction restores the plain text.
//! assert_eq!(doc.to_text(), "hi \u{1F600} \u{1F600}");
//! ```
//!
//! # Painting
//!
//! A paint layer walks [`TwemojiTextDocument::block_runs`] and draws text
//! runs with its text engine and image runs from
//! [`TwemojiTextDocument::resource`], which returns the composited RGBA
//! pixels registered under the run's URI at the document's device pixel
//! ratio.
//!
//! # Observing changes
//!
//! Documents expose two [`Signal`]s: `contents_change` fires before the
//! emoji passes run, carrying the edit's position and lengths, and
//! `contents_changed` fires after they finish. The engine's own rewrites
//! are silent, so observers see exactly one pair per user edit.

pub mod cache;
pub mod document;
pub mod emoji;
pub mod error;
pub mod font;
pub mod matcher;
pub mod registry;
pub mod runs;
pub mod uri;

mod hooks;

// Document API
pub use document::{ContentsChange, DocumentConfig, SuppressionGuard, TwemojiTextDocument};

// Emoji database and matching
pub use emoji::{EmojiDatabase, EmojiRecord, SharedEmojiDatabase};
pub use matcher::{AliasMatch, EmojiMatch, EmojiMatcher};

// Rasterization and registration
pub use cache::{CacheStats, EmojiPixmapCache, PixmapCacheConfig, SharedPixmapCache};
pub use registry::{InlineImageRegistry, RegisteredImage};

// Runs and resource URIs
pub use runs::{DocumentRun, InlineImageFormat, InlineImageRun, OBJECT_REPLACEMENT_CHARACTER};
pub use uri::{ResourceUri, is_twemoji_uri};

// Fonts and errors
pub use error::{PixmapError, ResourceUriError};
pub use font::TextFont;

// Signal types documents notify through
pub use horizon_twemoji_core::{ConnectionGuard, ConnectionId, Signal};
