//! Chat feed walkthrough for the emoji document engine.
//!
//! Builds a small in-memory emoji database backed by generated SVG assets,
//! then drives a line-limited document the way a chat view would: appending
//! messages with emoji and :aliases:, inspecting the run structure, and
//! extracting plain text back out.
//!
//! Run with: cargo run -p horizon-twemoji --example chat_feed
//! Set RUST_LOG=horizon_twemoji=trace to watch the pipeline work.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use horizon_twemoji::{
    DocumentConfig, DocumentRun, EmojiDatabase, EmojiPixmapCache, EmojiRecord,
    TwemojiTextDocument,
};

const GRINNING_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 36 36"><circle cx="18" cy="18" r="17" fill="#fdcb58"/></svg>"##;
const FIRE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 36 36"><path d="M18 2c6 8 12 12 12 21a12 12 0 0 1-24 0C6 14 12 10 18 2z" fill="#f4900c"/></svg>"##;

struct DemoDb {
    records: HashMap<String, EmojiRecord>,
}

impl DemoDb {
    fn new(asset_dir: &Path) -> Self {
        let mut records = HashMap::new();
        for (sequence, alias, svg) in [
            ("\u{1F600}", "grinning", GRINNING_SVG),
            ("\u{1F525}", "fire", FIRE_SVG),
        ] {
            let path = asset_dir.join(format!("{alias}.svg"));
            std::fs::write(&path, svg).expect("write demo asset");
            records.insert(
                sequence.to_string(),
                EmojiRecord::new(sequence, alias, path),
            );
        }
        Self { records }
    }
}

impl EmojiDatabase for DemoDb {
    fn by_sequence(&self, sequence: &str) -> Option<EmojiRecord> {
        self.records.get(sequence).cloned()
    }
    fn by_alias(&self, alias: &str) -> Option<EmojiRecord> {
        self.records.values().find(|r| r.alias == alias).cloned()
    }
}

fn describe(doc: &TwemojiTextDocument) {
    for index in 0..doc.block_count() {
        let runs: Vec<String> = doc
            .block_runs(index)
            .iter()
            .map(|run| match run {
                DocumentRun::Text { text, .. } => format!("text {text:?}"),
                DocumentRun::Image { format, .. } => {
                    format!("image {} ({}px)", format.uri, format.width)
                }
            })
            .collect();
        println!("  block {index}: [{}]", runs.join(", "));
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let asset_dir = tempfile::tempdir().expect("create temp asset dir");
    let database = Arc::new(DemoDb::new(asset_dir.path()));
    let cache = EmojiPixmapCache::default().into_shared();

    // A five-line feed: the oldest message scrolls away.
    let mut doc = TwemojiTextDocument::with_config(
        database,
        cache.clone(),
        DocumentConfig::default().with_line_limit(5),
    );

    doc.contents_changed.connect(|_| {
        tracing::info!("document settled after an edit");
    });

    let messages = [
        "alice: morning \u{1F600}",
        "bob: shipping today :fire:",
        "carol: :fire: :fire: :fire:",
        "dave: typo in :notakey: stays literal",
        "erin: love it \u{1F600}",
        "frank: sixth line pushes alice out",
    ];

    for message in messages {
        if !doc.is_empty() {
            let end = doc.char_count();
            doc.insert_text(end, "\n");
        }
        doc.insert_text(doc.char_count(), message);
    }

    println!("== run structure ==");
    describe(&doc);

    println!("\n== extracted text ==");
    println!("{}", doc.to_text());

    let stats = cache.lock().stats();
    println!(
        "\n== cache: {} glyphs, {} bytes, {} hits / {} misses ==",
        stats.entries, stats.size_bytes, stats.hits, stats.misses
    );

    // Turning rendering off decodes every engine image run back to text.
    doc.set_twemoji(false);
    println!("\n== raw text with rendering off ==");
    println!("{}", doc.raw_text());
}
