//! End-to-end tests for the emoji document pipeline: substitution on edit,
//! alias rewriting, extraction, toggles, sizing, and the line limit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use horizon_twemoji::{
    ContentsChange, DocumentConfig, EmojiDatabase, EmojiPixmapCache, EmojiRecord,
    InlineImageFormat, ResourceUri, SharedEmojiDatabase, SharedPixmapCache, TextFont,
    TwemojiTextDocument, is_twemoji_uri,
};

const GLYPH_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 36 36"><rect width="36" height="36" fill="#cc2222"/></svg>"##;

const GRINNING: &str = "\u{1F600}";
const THUMBS_UP: &str = "\u{1F44D}";
const FIRE: &str = "\u{1F525}";

fn write_asset(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, GLYPH_SVG).unwrap();
    path
}

struct MapDb {
    sequences: HashMap<String, EmojiRecord>,
    aliases: HashMap<String, EmojiRecord>,
}

impl MapDb {
    fn insert(&mut self, record: EmojiRecord) {
        self.aliases.insert(record.alias.clone(), record.clone());
        for alias in &record.aliases {
            self.aliases.insert(alias.clone(), record.clone());
        }
        self.sequences.insert(record.sequence.clone(), record);
    }
}

impl EmojiDatabase for MapDb {
    fn by_sequence(&self, sequence: &str) -> Option<EmojiRecord> {
        self.sequences.get(sequence).cloned()
    }
    fn by_alias(&self, alias: &str) -> Option<EmojiRecord> {
        self.aliases.get(alias).cloned()
    }
}

fn test_database(dir: &Path) -> SharedEmojiDatabase {
    let mut db = MapDb {
        sequences: HashMap::new(),
        aliases: HashMap::new(),
    };
    db.insert(EmojiRecord::new(
        GRINNING,
        "grinning",
        write_asset(dir, "1f600.svg"),
    ));
    let mut thumbs = EmojiRecord::new(THUMBS_UP, "thumbsup", write_asset(dir, "1f44d.svg"));
    thumbs.aliases.push("thumbs_up".to_string());
    db.insert(thumbs);
    db.insert(EmojiRecord::new(FIRE, "fire", write_asset(dir, "1f525.svg")));
    Arc::new(db)
}

fn new_document(dir: &tempfile::TempDir) -> TwemojiTextDocument {
    TwemojiTextDocument::new(
        test_database(dir.path()),
        EmojiPixmapCache::default().into_shared(),
    )
}

fn new_document_with(dir: &tempfile::TempDir, config: DocumentConfig) -> TwemojiTextDocument {
    TwemojiTextDocument::with_config(
        test_database(dir.path()),
        EmojiPixmapCache::default().into_shared(),
        config,
    )
}

#[test]
fn test_plain_text_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("before \u{1F600} after");
    assert_eq!(doc.image_run_count(), 1);
    assert_eq!(doc.raw_text(), "before \u{FFFC} after");
    assert_eq!(doc.to_text(), "before \u{1F600} after");
}

#[test]
fn test_multiple_emoji_in_one_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("\u{1F600}\u{1F44D}\u{1F525}");
    assert_eq!(doc.image_run_count(), 3);
    assert_eq!(doc.raw_text(), "\u{FFFC}\u{FFFC}\u{FFFC}");
    let positions: Vec<usize> = doc.image_runs().iter().map(|run| run.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(doc.to_text(), "\u{1F600}\u{1F44D}\u{1F525}");
}

#[test]
fn test_skin_tone_resolves_to_base() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    // Toned thumbs up is two chars; the run is one.
    doc.set_text("ok \u{1F44D}\u{1F3FD}!");
    assert_eq!(doc.image_run_count(), 1);
    assert_eq!(doc.raw_text(), "ok \u{FFFC}!");
    assert_eq!(doc.to_text(), "ok \u{1F44D}!");
}

#[test]
fn test_alias_becomes_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("deploy :fire: now");
    assert_eq!(doc.image_run_count(), 1);
    assert_eq!(doc.raw_text(), "deploy \u{FFFC} now");
    assert_eq!(doc.to_text(), "deploy \u{1F525} now");
}

#[test]
fn test_unknown_alias_stays_literal() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("hello :notakey: there");
    assert_eq!(doc.image_run_count(), 0);
    assert_eq!(doc.to_text(), "hello :notakey: there");
}

#[test]
fn test_alternate_alias_normalizes_to_primary() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text(":thumbs_up:");
    assert_eq!(doc.image_run_count(), 1);

    let resource = ResourceUri::parse(&doc.image_runs()[0].format.uri).unwrap();
    assert_eq!(resource.alias, "thumbsup");
    assert_eq!(doc.to_text(), THUMBS_UP);
}

#[test]
fn test_alias_becomes_text_when_twemoji_off() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document_with(&dir, DocumentConfig::default().with_twemoji(false));

    doc.set_text("go :fire:");
    assert_eq!(doc.image_run_count(), 0);
    assert_eq!(doc.raw_text(), "go \u{1F525}");
}

#[test]
fn test_incremental_matches_full_scan() {
    let dir = tempfile::tempdir().unwrap();

    let mut incremental = new_document(&dir);
    incremental.set_text("abc ");
    incremental.insert_text(4, GRINNING);

    let mut full = new_document(&dir);
    full.set_text("abc \u{1F600}");

    assert_eq!(incremental.raw_text(), full.raw_text());
    assert_eq!(incremental.to_text(), full.to_text());
    assert_eq!(incremental.image_runs(), full.image_runs());
}

#[test]
fn test_paste_spanning_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("ab");
    doc.insert_text(1, "1\n\u{1F600}\n2");
    assert_eq!(doc.raw_text(), "a1\n\u{FFFC}\n2b");
    assert_eq!(doc.to_text(), "a1\n\u{1F600}\n2b");
}

#[test]
fn test_edit_before_run_shifts_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("x \u{1F600}");
    assert_eq!(doc.image_runs()[0].position, 2);

    doc.insert_text(0, ">> ");
    assert_eq!(doc.image_runs()[0].position, 5);
    assert_eq!(doc.to_text(), ">> x \u{1F600}");
}

#[test]
fn test_set_text_replaces_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text(GRINNING);
    assert_eq!(doc.image_run_count(), 1);

    doc.set_text("plain");
    assert_eq!(doc.image_run_count(), 0);
    assert_eq!(doc.raw_text(), "plain");
}

#[test]
fn test_line_limit_drops_topmost_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document_with(&dir, DocumentConfig::default().with_line_limit(3));

    doc.set_text("a\nb\nc");
    assert_eq!(doc.block_count(), 3);

    doc.insert_text(doc.char_count(), "\nd");
    assert_eq!(doc.block_count(), 3);
    assert_eq!(doc.raw_text(), "b\nc\nd");
}

#[test]
fn test_set_line_limit_enforces_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("1\n2\n3\n4\n5");
    doc.set_line_limit(2);
    assert_eq!(doc.raw_text(), "4\n5");
}

#[test]
fn test_line_limit_preserves_runs_in_kept_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document_with(&dir, DocumentConfig::default().with_line_limit(2));

    doc.set_text("\u{1F600}\nkeep\n\u{1F525}");
    assert_eq!(doc.raw_text(), "keep\n\u{FFFC}");
    assert_eq!(doc.image_run_count(), 1);
    assert_eq!(doc.image_runs()[0].position, 5);
    assert_eq!(doc.to_text(), "keep\n\u{1F525}");
}

#[test]
fn test_toggle_off_restores_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("a \u{1F600} b :fire: c");
    assert_eq!(doc.image_run_count(), 2);

    doc.set_twemoji(false);
    assert_eq!(doc.image_run_count(), 0);
    assert_eq!(doc.raw_text(), "a \u{1F600} b \u{1F525} c");
    assert_eq!(doc.to_text(), doc.raw_text());
}

#[test]
fn test_toggle_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text(GRINNING);
    let substituted = doc.raw_text();

    doc.set_twemoji(true); // already on
    assert_eq!(doc.raw_text(), substituted);

    doc.set_twemoji(false);
    doc.set_twemoji(false); // already off
    assert_eq!(doc.raw_text(), GRINNING);

    doc.set_twemoji(true); // re-enabling rescans
    assert_eq!(doc.raw_text(), "\u{FFFC}");
}

#[test]
fn test_foreign_image_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("pic: ");
    doc.insert_image(
        5,
        InlineImageFormat::square("https://example.com/logo.png", 32),
    );
    assert_eq!(doc.image_run_count(), 1);

    // Reversal only touches runs with the reserved scheme.
    doc.set_twemoji(false);
    assert_eq!(doc.image_run_count(), 1);
    assert!(!is_twemoji_uri(&doc.image_runs()[0].format.uri));
    assert_eq!(doc.to_text(), "pic: \u{FFFC}");
}

#[test]
fn test_resource_lookup_and_margin() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document_with(
        &dir,
        DocumentConfig::default()
            .with_emoji_size(Some(24))
            .with_emoji_margin(2),
    );

    doc.set_text(GRINNING);
    let uri = doc.image_runs()[0].format.uri.clone();
    assert_eq!(uri, "twemoji://grinning?m=2&s=24");

    let image = doc.resource(&uri).expect("image registered under run uri");
    assert_eq!(image.width(), 28); // 24 + 2 * 2 at dpr 1.0
    assert_eq!(image.height(), 28);
    assert_eq!(doc.image_runs()[0].format.width, 28);
}

#[test]
fn test_device_pixel_ratio_rerenders() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text(GRINNING);
    let uri = doc.image_runs()[0].format.uri.clone();
    let logical = doc.image_runs()[0].format.width;

    doc.set_device_pixel_ratio(2.0);
    let image = doc.resource(&uri).unwrap();
    assert_eq!(image.width(), logical * 2); // physical doubles
    assert_eq!(doc.image_runs()[0].format.width, logical); // logical unchanged
}

#[test]
fn test_set_emoji_size_updates_existing_runs() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text(GRINNING);
    doc.set_emoji_size(Some(32));

    let resource = ResourceUri::parse(&doc.image_runs()[0].format.uri).unwrap();
    assert_eq!(resource.size, 32);
    assert_eq!(resource.margin, 1);
    assert_eq!(doc.image_runs()[0].format.width, 34);
}

#[test]
fn test_default_font_drives_auto_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    // 12pt font: line height 14.4, 90% of that rounds to 13.
    doc.set_text(GRINNING);
    let before = ResourceUri::parse(&doc.image_runs()[0].format.uri).unwrap();
    assert_eq!(before.size, 13);

    // 20pt font: line height 24.0, 90% rounds to 22.
    doc.set_default_font(TextFont::new("Sans Serif", 20.0));
    let after = ResourceUri::parse(&doc.image_runs()[0].format.uri).unwrap();
    assert_eq!(after.size, 22);
}

#[test]
fn test_one_signal_pair_per_user_edit() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    let changes = Arc::new(Mutex::new(Vec::<ContentsChange>::new()));
    let finished = Arc::new(Mutex::new(0usize));

    let changes_clone = changes.clone();
    doc.contents_change.connect(move |change| {
        changes_clone.lock().push(*change);
    });
    let finished_clone = finished.clone();
    doc.contents_changed.connect(move |_| {
        *finished_clone.lock() += 1;
    });

    // One user edit triggering two engine rewrites (alias and emoji).
    doc.set_text("go :fire: \u{1F600}");

    let recorded = changes.lock();
    assert_eq!(recorded.len(), 1);
    assert_eq!(
        recorded[0],
        ContentsChange {
            position: 0,
            removed: 0,
            added: 11
        }
    );
    assert_eq!(*finished.lock(), 1);
}

#[test]
fn test_suppressed_edit_skips_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    {
        let _guard = doc.suppress();
        doc.set_text("raw \u{1F600} untouched");
    }
    assert_eq!(doc.image_run_count(), 0);
    assert_eq!(doc.raw_text(), "raw \u{1F600} untouched");
}

#[test]
fn test_to_text_in_selection() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("a \u{1F600} b");
    // Raw text: "a \u{FFFC} b" with the run at position 2.
    assert_eq!(doc.to_text_in(0..2), "a ");
    assert_eq!(doc.to_text_in(2..3), GRINNING);
    assert_eq!(doc.to_text_in(1..5), " \u{1F600} b");
    assert_eq!(doc.to_text_in(3..5), " b");
}

#[test]
fn test_multi_block_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = new_document(&dir);

    doc.set_text("\u{1F600}\n:fire:\nplain");
    assert_eq!(doc.block_count(), 3);
    assert_eq!(doc.image_run_count(), 2);
    assert_eq!(doc.raw_text(), "\u{FFFC}\n\u{FFFC}\nplain");
    assert_eq!(doc.to_text(), "\u{1F600}\n\u{1F525}\nplain");

    let first_block = doc.block_runs(0);
    assert_eq!(first_block.len(), 1);
    assert!(first_block[0].is_image());
}

#[test]
fn test_documents_share_a_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache: SharedPixmapCache = EmojiPixmapCache::default().into_shared();

    let mut first = TwemojiTextDocument::new(test_database(dir.path()), cache.clone());
    let mut second = TwemojiTextDocument::new(test_database(dir.path()), cache.clone());

    first.set_text(GRINNING);
    second.set_text(GRINNING);

    let stats = cache.lock().stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1); // the second document reused the decode
}
