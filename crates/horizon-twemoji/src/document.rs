//! The emoji-aware rich text document.
//!
//! [`TwemojiTextDocument`] keeps plain text and inline emoji images in sync:
//! user edits are scanned for emoji graphemes and `:alias:` tokens, matches
//! are replaced by image runs backed by rasterized artwork, and extraction
//! reverses the substitution so callers always get the text back.
//!
//! # Model
//!
//! The backing store is a rope holding every text char plus exactly one
//! object replacement character (U+FFFC) per inline image. All positions
//! are char offsets; blocks are rope lines. Image runs live in a sorted
//! side table and shift with edits.
//!
//! # Change pipeline
//!
//! Every public edit funnels through one splice primitive. A user edit
//! records the change anchor, emits
//! [`contents_change`](TwemojiTextDocument::contents_change), dispatches the
//! internal change hooks (emoji rescan of the edited blocks, global alias
//! pass, line-limit trim) in subscription order, then emits
//! [`contents_changed`](TwemojiTextDocument::contents_changed). The engine
//! performs its own rewrites under a scoped suppression guard, so observers
//! only ever see the one notification pair per user edit and hooks never
//! re-trigger themselves.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use horizon_twemoji_core::Signal;
use image::RgbaImage;
use ropey::Rope;

use crate::cache::SharedPixmapCache;
use crate::emoji::{self, EmojiRecord, SharedEmojiDatabase};
use crate::font::TextFont;
use crate::hooks::{ChangeHooks, ChangeStage, HookId};
use crate::matcher::EmojiMatcher;
use crate::registry::InlineImageRegistry;
use crate::runs::{DocumentRun, InlineImageFormat, InlineImageRun, OBJECT_REPLACEMENT_CHARACTER};
use crate::uri::{self, ResourceUri};

/// Fraction of the line height an automatically sized emoji occupies.
const EMOJI_SIZE_FACTOR: f32 = 0.9;

/// Payload of [`TwemojiTextDocument::contents_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentsChange {
    /// Char offset the edit started at.
    pub position: usize,
    /// Chars removed at that offset.
    pub removed: usize,
    /// Chars added at that offset.
    pub added: usize,
}

/// Initial document configuration.
///
/// Every field has a runtime setter on the document; the config only fixes
/// the starting state.
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Render emoji graphemes as inline images.
    pub twemoji: bool,
    /// Rewrite `:alias:` tokens.
    pub alias_replacement: bool,
    /// Margin in logical pixels around each emoji image.
    pub emoji_margin: u32,
    /// Fixed emoji size in logical pixels; `None` sizes from the font.
    pub emoji_size: Option<u32>,
    /// Maximum number of blocks; 0 is unlimited.
    pub line_limit: usize,
    /// Device pixel ratio images are rasterized at.
    pub device_pixel_ratio: f64,
    /// Font driving automatic emoji sizing.
    pub default_font: TextFont,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            twemoji: true,
            alias_replacement: true,
            emoji_margin: 1,
            emoji_size: None,
            line_limit: 0,
            device_pixel_ratio: 1.0,
            default_font: TextFont::default(),
        }
    }
}

impl DocumentConfig {
    pub fn with_twemoji(mut self, enabled: bool) -> Self {
        self.twemoji = enabled;
        self
    }

    pub fn with_alias_replacement(mut self, enabled: bool) -> Self {
        self.alias_replacement = enabled;
        self
    }

    pub fn with_emoji_margin(mut self, margin: u32) -> Self {
        self.emoji_margin = margin;
        self
    }

    pub fn with_emoji_size(mut self, size: Option<u32>) -> Self {
        self.emoji_size = size;
        self
    }

    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.line_limit = limit;
        self
    }

    pub fn with_device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.device_pixel_ratio = dpr;
        self
    }

    pub fn with_default_font(mut self, font: TextFont) -> Self {
        self.default_font = font;
        self
    }
}

/// Scoped suppression of change processing.
///
/// While at least one guard is alive, edits mutate the document silently:
/// no anchor update, no hook dispatch, no signals. Obtained from
/// [`TwemojiTextDocument::suppress`]; the depth decrements on drop on every
/// exit path.
#[derive(Debug)]
pub struct SuppressionGuard {
    depth: Arc<AtomicU32>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An editable text document that renders emoji as inline images.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_twemoji::{EmojiDatabase, EmojiPixmapCache, EmojiRecord, TwemojiTextDocument};
///
/// struct TinyDb;
///
/// impl EmojiDatabase for TinyDb {
///     fn by_sequence(&self, sequence: &str) -> Option<EmojiRecord> {
///         (sequence == "😀").then(|| EmojiRecord::new("😀", "grinning", "grinning.svg"))
///     }
///     fn by_alias(&self, alias: &str) -> Option<EmojiRecord> {
///         (alias == "grinning").then(|| EmojiRecord::new("😀", "grinning", "grinning.svg"))
///     }
/// }
///
/// let cache = EmojiPixmapCache::default().into_shared();
/// let mut doc = TwemojiTextDocument::new(Arc::new(TinyDb), cache);
///
/// doc.set_text("hello 😀");
/// assert_eq!(doc.image_run_count(), 1);
/// assert_eq!(doc.raw_text(), "hello \u{FFFC}");
/// assert_eq!(doc.to_text(), "hello 😀");
/// ```
pub struct TwemojiTextDocument {
    text: Rope,
    /// Sorted by position; one entry per U+FFFC the engine manages.
    image_runs: Vec<InlineImageRun>,
    registry: InlineImageRegistry,
    database: SharedEmojiDatabase,
    cache: SharedPixmapCache,
    matcher: EmojiMatcher,

    twemoji: bool,
    alias_replacement: bool,
    emoji_margin: u32,
    emoji_size: Option<u32>,
    line_limit: usize,
    device_pixel_ratio: f64,
    default_font: TextFont,

    hooks: ChangeHooks,
    twemoji_hook: Option<HookId>,
    alias_hook: Option<HookId>,
    limit_hook: Option<HookId>,

    /// Anchor of the most recent unsuppressed edit.
    last_change: Option<ContentsChange>,
    suppress_depth: Arc<AtomicU32>,
    /// True while hooks run; a second line of defense against re-entry.
    dispatching: bool,

    /// Emitted before hooks run, with the edit's position and lengths.
    pub contents_change: Signal<ContentsChange>,
    /// Emitted after hooks finish, once per user edit.
    pub contents_changed: Signal<()>,
}

impl TwemojiTextDocument {
    /// Create a document with the default configuration (emoji rendering
    /// and alias replacement on, 1px margin, automatic sizing).
    pub fn new(database: SharedEmojiDatabase, cache: SharedPixmapCache) -> Self {
        Self::with_config(database, cache, DocumentConfig::default())
    }

    /// Create a document with an explicit configuration.
    pub fn with_config(
        database: SharedEmojiDatabase,
        cache: SharedPixmapCache,
        config: DocumentConfig,
    ) -> Self {
        let mut doc = Self {
            text: Rope::new(),
            image_runs: Vec::new(),
            registry: InlineImageRegistry::new(),
            database,
            cache,
            matcher: EmojiMatcher::new(),
            twemoji: false,
            alias_replacement: false,
            emoji_margin: 0,
            emoji_size: None,
            line_limit: 0,
            device_pixel_ratio: 1.0,
            default_font: TextFont::default(),
            hooks: ChangeHooks::new(),
            twemoji_hook: None,
            alias_hook: None,
            limit_hook: None,
            last_change: None,
            suppress_depth: Arc::new(AtomicU32::new(0)),
            dispatching: false,
            contents_change: Signal::new(),
            contents_changed: Signal::new(),
        };

        // Route the config through the setters so hooks subscribe exactly
        // as they would at runtime.
        doc.set_emoji_margin(config.emoji_margin);
        doc.set_emoji_size(config.emoji_size);
        doc.set_device_pixel_ratio(config.device_pixel_ratio);
        doc.set_default_font(config.default_font);
        doc.set_twemoji(config.twemoji);
        doc.set_alias_replacement(config.alias_replacement);
        doc.set_line_limit(config.line_limit);
        doc
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Replace the whole content.
    pub fn set_text(&mut self, text: &str) {
        let len = self.text.len_chars();
        self.replace_range(0..len, text);
    }

    /// Insert text at a char offset (clamped to the document end).
    pub fn insert_text(&mut self, position: usize, text: &str) {
        self.replace_range(position..position, text);
    }

    /// Remove a char range.
    pub fn remove(&mut self, range: Range<usize>) {
        self.replace_range(range, "");
    }

    /// Remove everything, including registered image resources.
    pub fn clear(&mut self) {
        let len = self.text.len_chars();
        self.replace_range(0..len, "");
        self.registry.clear();
    }

    /// Replace a char range with new text.
    ///
    /// The range is clamped to the document. Image runs inside the range
    /// are dropped with their placeholders; later runs shift by the length
    /// delta. This is the single edit primitive everything else uses.
    pub fn replace_range(&mut self, range: Range<usize>, text: &str) {
        let len = self.text.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);
        if start == end && text.is_empty() {
            return;
        }

        let removed = end - start;
        let added = text.chars().count();
        self.splice(start..end, text);
        self.finish_edit(ContentsChange {
            position: start,
            removed,
            added,
        });
    }

    /// Insert an inline image at a char offset.
    ///
    /// The image occupies one char (U+FFFC). Images with a non-`twemoji`
    /// URI are foreign: the engine preserves them verbatim through toggles
    /// and extraction.
    pub fn insert_image(&mut self, position: usize, format: InlineImageFormat) {
        let position = position.min(self.text.len_chars());
        self.text.insert_char(position, OBJECT_REPLACEMENT_CHARACTER);
        self.shift_runs_after(position, 0, 1);
        self.add_image_run(position, format);
        self.finish_edit(ContentsChange {
            position,
            removed: 0,
            added: 1,
        });
    }

    /// Suppress change processing until the returned guard drops.
    ///
    /// Nested guards stack; processing resumes when the last one drops.
    pub fn suppress(&self) -> SuppressionGuard {
        self.suppress_depth.fetch_add(1, Ordering::SeqCst);
        SuppressionGuard {
            depth: self.suppress_depth.clone(),
        }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// The backing text verbatim, placeholders included.
    pub fn raw_text(&self) -> String {
        self.text.to_string()
    }

    /// Emoji-aware plain text of the whole document.
    ///
    /// Text runs contribute their text, engine image runs decode back to
    /// the emoji's canonical sequence, foreign image runs contribute
    /// U+FFFC, blocks are separated by one `\n`.
    pub fn to_text(&self) -> String {
        self.to_text_in(0..self.text.len_chars())
    }

    /// Emoji-aware plain text of a selection.
    ///
    /// Text is clipped to the range; an image run contributes iff its
    /// position lies inside; a block separator contributes iff its char
    /// position lies inside.
    pub fn to_text_in(&self, range: Range<usize>) -> String {
        let len = self.text.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);

        let mut out = String::new();
        let mut cursor = start;
        for run in self
            .image_runs
            .iter()
            .filter(|run| run.position >= start && run.position < end)
        {
            if run.position > cursor {
                out.push_str(&self.text.slice(cursor..run.position).to_string());
            }
            self.append_decoded_run(&run.format, &mut out);
            cursor = run.position + 1;
        }
        if cursor < end {
            out.push_str(&self.text.slice(cursor..end).to_string());
        }
        out
    }

    fn append_decoded_run(&self, format: &InlineImageFormat, out: &mut String) {
        if !uri::is_twemoji_uri(&format.uri) {
            out.push(OBJECT_REPLACEMENT_CHARACTER);
            return;
        }
        let Ok(resource) = ResourceUri::parse(&format.uri) else {
            return;
        };
        match self.database.by_alias(&resource.alias) {
            Some(record) => out.push_str(&record.sequence),
            None => {
                tracing::debug!(alias = %resource.alias, "unknown alias while decoding image run");
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of chars in the document.
    pub fn char_count(&self) -> usize {
        self.text.len_chars()
    }

    /// Whether the document has no content.
    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    /// Number of blocks. An empty document has one empty block.
    pub fn block_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Index of the block containing a char offset (clamped).
    pub fn block_at(&self, position: usize) -> usize {
        self.text.char_to_line(position.min(self.text.len_chars()))
    }

    /// Char range of a block, including its trailing `\n` if present.
    ///
    /// # Panics
    ///
    /// Panics if `index >= block_count()`.
    pub fn block_range(&self, index: usize) -> Range<usize> {
        let start = self.text.line_to_char(index);
        let end = if index + 1 < self.text.len_lines() {
            self.text.line_to_char(index + 1)
        } else {
            self.text.len_chars()
        };
        start..end
    }

    /// Text of a block without the trailing `\n`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= block_count()`.
    pub fn block_text(&self, index: usize) -> String {
        let range = self.block_range(index);
        let mut text = self.text.slice(range.start..range.end).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        text
    }

    /// The typed runs of the whole document, block by block.
    pub fn runs(&self) -> Vec<DocumentRun> {
        (0..self.block_count())
            .flat_map(|index| self.block_runs(index))
            .collect()
    }

    /// The typed runs of one block. Text runs never include the separator
    /// newline.
    ///
    /// # Panics
    ///
    /// Panics if `index >= block_count()`.
    pub fn block_runs(&self, index: usize) -> Vec<DocumentRun> {
        let range = self.block_range(index);
        let mut end = range.end;
        if end > range.start && self.text.char(end - 1) == '\n' {
            end -= 1;
        }

        let mut out = Vec::new();
        let mut cursor = range.start;
        for run in self
            .image_runs
            .iter()
            .filter(|run| run.position >= range.start && run.position < end)
        {
            if run.position > cursor {
                out.push(DocumentRun::Text {
                    range: cursor..run.position,
                    text: self.text.slice(cursor..run.position).to_string(),
                });
            }
            out.push(DocumentRun::Image {
                position: run.position,
                format: run.format.clone(),
            });
            cursor = run.position + 1;
        }
        if cursor < end {
            out.push(DocumentRun::Text {
                range: cursor..end,
                text: self.text.slice(cursor..end).to_string(),
            });
        }
        out
    }

    /// Number of inline image runs.
    pub fn image_run_count(&self) -> usize {
        self.image_runs.len()
    }

    /// The inline image runs, sorted by position.
    pub fn image_runs(&self) -> &[InlineImageRun] {
        &self.image_runs
    }

    /// The composited pixels registered under an image run URI, for the
    /// paint layer.
    pub fn resource(&self, uri: &str) -> Option<&Arc<RgbaImage>> {
        self.registry.get(uri).map(|entry| entry.image())
    }

    /// The document's image registry.
    pub fn registry(&self) -> &InlineImageRegistry {
        &self.registry
    }

    /// The shared pixmap cache this document renders through.
    pub fn pixmap_cache(&self) -> &SharedPixmapCache {
        &self.cache
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Whether emoji graphemes are rendered as inline images.
    pub fn twemoji(&self) -> bool {
        self.twemoji
    }

    /// Toggle emoji rendering.
    ///
    /// Turning it on scans the whole document and substitutes every emoji
    /// grapheme; turning it off decodes every engine image run back to its
    /// emoji text. Foreign image runs are untouched either way. Idempotent.
    pub fn set_twemoji(&mut self, enabled: bool) {
        if self.twemoji == enabled {
            return;
        }
        self.twemoji = enabled;
        if enabled {
            self.twemoji_hook = Some(self.hooks.subscribe(ChangeStage::Twemojize));
            self.twemojize_full();
        } else {
            if let Some(id) = self.twemoji_hook.take() {
                self.hooks.unsubscribe(id);
            }
            self.detwemojize();
        }
        tracing::debug!(enabled, "emoji rendering toggled");
    }

    /// Whether `:alias:` tokens are rewritten.
    pub fn alias_replacement(&self) -> bool {
        self.alias_replacement
    }

    /// Toggle alias replacement. Idempotent; content entering through any
    /// subsequent edit is rewritten.
    pub fn set_alias_replacement(&mut self, enabled: bool) {
        if self.alias_replacement == enabled {
            return;
        }
        self.alias_replacement = enabled;
        if enabled {
            self.alias_hook = Some(self.hooks.subscribe(ChangeStage::ReplaceAliases));
        } else if let Some(id) = self.alias_hook.take() {
            self.hooks.unsubscribe(id);
        }
        tracing::debug!(enabled, "alias replacement toggled");
    }

    /// The maximum number of blocks; 0 is unlimited.
    pub fn line_limit(&self) -> usize {
        self.line_limit
    }

    /// Set the block limit and enforce it immediately.
    ///
    /// While over the limit the topmost block is removed, so the newest
    /// content wins.
    pub fn set_line_limit(&mut self, limit: usize) {
        if self.line_limit == limit {
            return;
        }
        self.line_limit = limit;
        if limit > 0 {
            if self.limit_hook.is_none() {
                self.limit_hook = Some(self.hooks.subscribe(ChangeStage::EnforceLineLimit));
            }
            self.enforce_line_limit();
        } else if let Some(id) = self.limit_hook.take() {
            self.hooks.unsubscribe(id);
        }
    }

    /// Margin in logical pixels around each emoji image.
    pub fn emoji_margin(&self) -> u32 {
        self.emoji_margin
    }

    /// Set the margin and refresh existing emoji images.
    pub fn set_emoji_margin(&mut self, margin: u32) {
        if self.emoji_margin == margin {
            return;
        }
        self.emoji_margin = margin;
        self.update_emoji_images();
    }

    /// The fixed emoji size, or `None` when sizing from the font.
    pub fn emoji_size(&self) -> Option<u32> {
        self.emoji_size
    }

    /// Set or clear the fixed emoji size and refresh existing images.
    pub fn set_emoji_size(&mut self, size: Option<u32>) {
        if self.emoji_size == size {
            return;
        }
        self.emoji_size = size;
        self.update_emoji_images();
    }

    /// The device pixel ratio images are rasterized at.
    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Set the device pixel ratio and re-rasterize existing images.
    pub fn set_device_pixel_ratio(&mut self, dpr: f64) {
        if (self.device_pixel_ratio - dpr).abs() < f64::EPSILON {
            return;
        }
        self.device_pixel_ratio = dpr;
        self.update_emoji_images();
    }

    /// The font driving automatic emoji sizing.
    pub fn default_font(&self) -> &TextFont {
        &self.default_font
    }

    /// Set the default font; refreshes images when sizing automatically.
    pub fn set_default_font(&mut self, font: TextFont) {
        if self.default_font == font {
            return;
        }
        self.default_font = font;
        if self.emoji_size.is_none() {
            self.update_emoji_images();
        }
    }

    /// Re-derive every engine image run from the current margin, size,
    /// device pixel ratio, and font.
    ///
    /// Run positions are untouched (an image stays one char); formats and
    /// registry entries are rebuilt. Foreign runs are skipped.
    pub fn update_emoji_images(&mut self) {
        if self.image_runs.is_empty() {
            return;
        }
        let size = self.emoji_target_size();
        let margin = self.emoji_margin;
        let dpr = self.device_pixel_ratio;

        for index in 0..self.image_runs.len() {
            let run_uri = self.image_runs[index].format.uri.clone();
            if !uri::is_twemoji_uri(&run_uri) {
                continue;
            }
            let Ok(resource) = ResourceUri::parse(&run_uri) else {
                continue;
            };
            let Some(record) = self.database.by_alias(&resource.alias) else {
                continue;
            };

            let new_uri = ResourceUri::new(record.alias.clone(), margin, size).encode();
            {
                let mut cache = self.cache.lock();
                self.registry
                    .ensure_registered(&new_uri, &record, size, margin, dpr, &mut cache);
            }
            self.image_runs[index].format = InlineImageFormat::square(new_uri, size + 2 * margin);
        }
        tracing::debug!(size, margin, dpr, "refreshed emoji image runs");
    }

    // =========================================================================
    // Change pipeline
    // =========================================================================

    fn is_suppressed(&self) -> bool {
        self.suppress_depth.load(Ordering::SeqCst) > 0
    }

    /// Apply run bookkeeping and the rope edit for one splice.
    fn splice(&mut self, range: Range<usize>, text: &str) {
        let added = text.chars().count();
        let removed = range.end - range.start;

        // Runs inside the replaced span disappear with their placeholders.
        self.image_runs
            .retain(|run| run.position < range.start || run.position >= range.end);
        self.shift_runs_after(range.end, removed, added);

        if removed > 0 {
            self.text.remove(range.start..range.end);
        }
        if !text.is_empty() {
            self.text.insert(range.start, text);
        }
    }

    /// Shift run positions at or past `from` by the edit's length delta.
    fn shift_runs_after(&mut self, from: usize, removed: usize, added: usize) {
        if removed == added {
            return;
        }
        for run in &mut self.image_runs {
            if run.position >= from {
                run.position = run.position - removed + added;
            }
        }
    }

    fn add_image_run(&mut self, position: usize, format: InlineImageFormat) {
        let index = self
            .image_runs
            .partition_point(|run| run.position < position);
        self.image_runs.insert(index, InlineImageRun { position, format });
    }

    fn finish_edit(&mut self, change: ContentsChange) {
        if self.is_suppressed() || self.dispatching {
            return;
        }
        tracing::trace!(
            position = change.position,
            removed = change.removed,
            added = change.added,
            "document contents changed"
        );
        self.last_change = Some(change);
        self.contents_change.emit(change);
        self.dispatch_change_hooks();
        self.contents_changed.emit(());
    }

    fn dispatch_change_hooks(&mut self) {
        if self.hooks.is_empty() {
            return;
        }
        self.dispatching = true;
        for stage in self.hooks.stages_in_order() {
            match stage {
                ChangeStage::Twemojize => self.twemojize_changed_blocks(),
                ChangeStage::ReplaceAliases => self.replace_alias_tokens(),
                ChangeStage::EnforceLineLimit => self.enforce_line_limit(),
            }
        }
        self.dispatching = false;
    }

    // =========================================================================
    // Emoji substitution
    // =========================================================================

    /// Automatic size from the font, or the fixed override.
    fn emoji_target_size(&self) -> u32 {
        match self.emoji_size {
            Some(size) => size,
            None => (self.default_font.line_height() * EMOJI_SIZE_FACTOR).round() as u32,
        }
    }

    /// Build the format for one emoji run and make sure its image is
    /// registered. Both the alias path and the grapheme path size through
    /// here, so the two always agree.
    fn build_image_format(&mut self, record: &EmojiRecord) -> InlineImageFormat {
        let size = self.emoji_target_size();
        let margin = self.emoji_margin;
        let resource_uri = ResourceUri::new(record.alias.clone(), margin, size).encode();
        {
            let mut cache = self.cache.lock();
            self.registry.ensure_registered(
                &resource_uri,
                record,
                size,
                margin,
                self.device_pixel_ratio,
                &mut cache,
            );
        }
        InlineImageFormat::square(resource_uri, size + 2 * margin)
    }

    /// Replace a text span with one emoji image run.
    fn replace_span_with_image(&mut self, range: Range<usize>, record: &EmojiRecord) {
        let format = self.build_image_format(record);
        let guard = self.suppress();
        self.replace_range(range.clone(), "\u{FFFC}");
        drop(guard);
        self.add_image_run(range.start, format);
    }

    /// Rescan only the blocks the last edit touched.
    fn twemojize_changed_blocks(&mut self) {
        let Some(change) = self.last_change else {
            return;
        };
        let len = self.text.len_chars();
        let first = self.block_at(change.position.min(len));
        let last = self.block_at((change.position + change.added).min(len));
        self.twemojize_blocks(first, last);
    }

    /// Scan every block (toggle-on path).
    fn twemojize_full(&mut self) {
        let last = self.block_count() - 1;
        self.twemojize_blocks(0, last);
    }

    fn twemojize_blocks(&mut self, first: usize, last: usize) {
        // Last to first so earlier block offsets survive the splices.
        for block in (first..=last).rev() {
            self.twemojize_block(block);
        }
    }

    fn twemojize_block(&mut self, block: usize) {
        let block_start = self.text.line_to_char(block);
        let text = self.block_text(block);
        let matches = self.matcher.find_emoji(&text);
        if matches.is_empty() {
            return;
        }
        tracing::trace!(block, matches = matches.len(), "twemojizing block");

        for m in matches.iter().rev() {
            let sequence = emoji::strip_skin_tones(&m.text);
            let Some(record) = self.database.by_sequence(&sequence) else {
                tracing::debug!(grapheme = %m.text, "emoji not in database, skipping");
                continue;
            };
            let start = block_start + m.start;
            let end = block_start + m.end;
            self.replace_span_with_image(start..end, &record);
        }
    }

    /// Rewrite `:alias:` tokens across the whole document.
    ///
    /// Known aliases become an image when emoji rendering is on, or the
    /// emoji character sequence when it is off. Unknown aliases stay as
    /// literal text.
    fn replace_alias_tokens(&mut self) {
        let text = self.raw_text();
        let matches = self.matcher.find_aliases(&text);
        if matches.is_empty() {
            return;
        }

        for m in matches.iter().rev() {
            let Some(record) = self.database.by_alias(&m.alias) else {
                continue;
            };
            if self.twemoji {
                self.replace_span_with_image(m.start..m.end, &record);
            } else {
                let guard = self.suppress();
                self.replace_range(m.start..m.end, &record.sequence);
                drop(guard);
            }
        }
    }

    /// Drop leading blocks while over the line limit.
    fn enforce_line_limit(&mut self) {
        if self.line_limit == 0 {
            return;
        }
        while self.block_count() > self.line_limit {
            let end = self.text.line_to_char(1);
            let guard = self.suppress();
            self.replace_range(0..end, "");
            drop(guard);
        }
    }

    /// Decode every engine image run back to emoji text (toggle-off path).
    ///
    /// Foreign runs and runs whose alias is unknown are left in place.
    fn detwemojize(&mut self) {
        let engine_runs: Vec<InlineImageRun> = self
            .image_runs
            .iter()
            .filter(|run| uri::is_twemoji_uri(&run.format.uri))
            .cloned()
            .collect();

        for run in engine_runs.iter().rev() {
            let Ok(resource) = ResourceUri::parse(&run.format.uri) else {
                continue;
            };
            let Some(record) = self.database.by_alias(&resource.alias) else {
                tracing::debug!(alias = %resource.alias, "unknown alias while reversing, leaving run");
                continue;
            };
            let guard = self.suppress();
            self.replace_range(run.position..run.position + 1, &record.sequence);
            drop(guard);
        }
    }
}

impl fmt::Debug for TwemojiTextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwemojiTextDocument")
            .field("chars", &self.text.len_chars())
            .field("blocks", &self.text.len_lines())
            .field("image_runs", &self.image_runs.len())
            .field("twemoji", &self.twemoji)
            .field("alias_replacement", &self.alias_replacement)
            .field("line_limit", &self.line_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EmojiPixmapCache;
    use crate::emoji::EmojiDatabase;
    use parking_lot::Mutex;

    struct EmptyDb;

    impl EmojiDatabase for EmptyDb {
        fn by_sequence(&self, _sequence: &str) -> Option<EmojiRecord> {
            None
        }
        fn by_alias(&self, _alias: &str) -> Option<EmojiRecord> {
            None
        }
    }

    fn plain_doc() -> TwemojiTextDocument {
        TwemojiTextDocument::with_config(
            Arc::new(EmptyDb),
            EmojiPixmapCache::default().into_shared(),
            DocumentConfig::default()
                .with_twemoji(false)
                .with_alias_replacement(false)
                .with_emoji_margin(0),
        )
    }

    fn foreign_format() -> InlineImageFormat {
        InlineImageFormat::square("file:///tmp/pic.png", 16)
    }

    #[test]
    fn test_empty_document_has_one_block() {
        let doc = plain_doc();
        assert_eq!(doc.block_count(), 1);
        assert_eq!(doc.char_count(), 0);
        assert!(doc.is_empty());
        assert_eq!(doc.block_text(0), "");
    }

    #[test]
    fn test_block_helpers() {
        let mut doc = plain_doc();
        doc.set_text("one\ntwo\nthree");

        assert_eq!(doc.block_count(), 3);
        assert_eq!(doc.block_range(0), 0..4); // includes the newline
        assert_eq!(doc.block_range(1), 4..8);
        assert_eq!(doc.block_range(2), 8..13);
        assert_eq!(doc.block_text(0), "one");
        assert_eq!(doc.block_text(2), "three");
        assert_eq!(doc.block_at(0), 0);
        assert_eq!(doc.block_at(5), 1);
        assert_eq!(doc.block_at(13), 2); // end of document
    }

    #[test]
    fn test_trailing_newline_makes_empty_block() {
        let mut doc = plain_doc();
        doc.set_text("a\n");
        assert_eq!(doc.block_count(), 2);
        assert_eq!(doc.block_text(1), "");
    }

    #[test]
    fn test_insert_shifts_image_runs() {
        let mut doc = plain_doc();
        doc.set_text("hello");
        doc.insert_image(5, foreign_format());
        assert_eq!(doc.image_runs()[0].position, 5);

        doc.insert_text(0, ">> ");
        assert_eq!(doc.image_runs()[0].position, 8);
        assert_eq!(doc.raw_text(), ">> hello\u{FFFC}");
    }

    #[test]
    fn test_insert_at_run_position_shifts_run_right() {
        let mut doc = plain_doc();
        doc.insert_image(0, foreign_format());
        doc.insert_text(0, "a");
        assert_eq!(doc.image_runs()[0].position, 1);
        assert_eq!(doc.raw_text(), "a\u{FFFC}");
    }

    #[test]
    fn test_delete_covering_run_removes_it() {
        let mut doc = plain_doc();
        doc.set_text("abc");
        doc.insert_image(1, foreign_format());
        assert_eq!(doc.image_run_count(), 1);

        doc.remove(0..3);
        assert_eq!(doc.image_run_count(), 0);
        assert_eq!(doc.raw_text(), "c");
    }

    #[test]
    fn test_delete_before_run_shifts_left() {
        let mut doc = plain_doc();
        doc.set_text("abcd");
        doc.insert_image(4, foreign_format());

        doc.remove(0..2);
        assert_eq!(doc.image_runs()[0].position, 2);
    }

    #[test]
    fn test_replace_range_clamps_out_of_bounds() {
        let mut doc = plain_doc();
        doc.set_text("short");
        doc.replace_range(2..999, "X");
        assert_eq!(doc.raw_text(), "shX");
    }

    #[test]
    fn test_runs_segmentation() {
        let mut doc = plain_doc();
        doc.set_text("ab\ncd");
        doc.insert_image(1, foreign_format());
        // Raw text is now "a<img>b\ncd".

        let runs = doc.runs();
        assert_eq!(runs.len(), 4);
        assert_eq!(
            runs[0],
            DocumentRun::Text {
                range: 0..1,
                text: "a".to_string()
            }
        );
        assert!(runs[1].is_image());
        assert_eq!(
            runs[2],
            DocumentRun::Text {
                range: 2..3,
                text: "b".to_string()
            }
        );
        // The newline belongs to no run; block 2 starts after it.
        assert_eq!(
            runs[3],
            DocumentRun::Text {
                range: 4..6,
                text: "cd".to_string()
            }
        );
    }

    #[test]
    fn test_to_text_foreign_run_is_placeholder() {
        let mut doc = plain_doc();
        doc.set_text("xy");
        doc.insert_image(1, foreign_format());
        assert_eq!(doc.to_text(), "x\u{FFFC}y");
    }

    #[test]
    fn test_signals_fire_once_per_edit() {
        let mut doc = plain_doc();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let notified = Arc::new(Mutex::new(0usize));

        let changes_clone = changes.clone();
        doc.contents_change.connect(move |change| {
            changes_clone.lock().push(*change);
        });
        let notified_clone = notified.clone();
        doc.contents_changed.connect(move |_| {
            *notified_clone.lock() += 1;
        });

        doc.set_text("hello");
        doc.insert_text(5, "!");

        let recorded = changes.lock();
        assert_eq!(recorded.len(), 2);
        assert_eq!(
            recorded[0],
            ContentsChange {
                position: 0,
                removed: 0,
                added: 5
            }
        );
        assert_eq!(
            recorded[1],
            ContentsChange {
                position: 5,
                removed: 0,
                added: 1
            }
        );
        assert_eq!(*notified.lock(), 2);
    }

    #[test]
    fn test_suppression_guard_silences_edits() {
        let mut doc = plain_doc();
        let notified = Arc::new(Mutex::new(0usize));
        let notified_clone = notified.clone();
        doc.contents_changed.connect(move |_| {
            *notified_clone.lock() += 1;
        });

        {
            let _guard = doc.suppress();
            doc.set_text("silent");
        }
        assert_eq!(*notified.lock(), 0);
        assert_eq!(doc.raw_text(), "silent");

        doc.insert_text(6, "!");
        assert_eq!(*notified.lock(), 1);
    }

    #[test]
    fn test_nested_suppression() {
        let doc = plain_doc();
        let outer = doc.suppress();
        {
            let _inner = doc.suppress();
        }
        assert!(doc.is_suppressed(), "outer guard still alive");
        drop(outer);
        assert!(!doc.is_suppressed());
    }

    #[test]
    fn test_empty_replace_is_noop() {
        let mut doc = plain_doc();
        let notified = Arc::new(Mutex::new(0usize));
        let notified_clone = notified.clone();
        doc.contents_changed.connect(move |_| {
            *notified_clone.lock() += 1;
        });

        doc.replace_range(0..0, "");
        assert_eq!(*notified.lock(), 0);
    }

    #[test]
    fn test_clear() {
        let mut doc = plain_doc();
        doc.set_text("stuff");
        doc.insert_image(2, foreign_format());
        doc.clear();

        assert!(doc.is_empty());
        assert_eq!(doc.image_run_count(), 0);
        assert_eq!(doc.block_count(), 1);
    }

    #[test]
    fn test_to_text_in_clips_text_runs() {
        let mut doc = plain_doc();
        doc.set_text("hello world");
        assert_eq!(doc.to_text_in(3..8), "lo wo");
        assert_eq!(doc.to_text_in(0..0), "");
        assert_eq!(doc.to_text_in(8..999), "rld");
    }

    #[test]
    fn test_debug_format() {
        let doc = plain_doc();
        let repr = format!("{:?}", doc);
        assert!(repr.contains("TwemojiTextDocument"));
    }
}
