//! Emoji pixmap cache.
//!
//! Rasterizing emoji artwork is the expensive step of the pipeline, so
//! rendered glyphs are cached by `(alias, logical size, device pixel
//! ratio)`. The cache is purely a performance layer: an absent entry is
//! re-rendered, an evicted entry only costs time, and a failed decode
//! degrades to a transparent placeholder of the requested size instead of
//! failing the edit that needed it.
//!
//! Assets are decoded **at the physical target resolution**: SVG artwork is
//! rendered through `resvg` with a scale transform, raster artwork is
//! decoded with `image` and resampled. Decoding at target size avoids both
//! blurry upscales and wasted pixels.
//!
//! Documents share one cache behind [`SharedPixmapCache`]; the engine is
//! single-threaded by contract, so the mutex is uncontended there and only
//! exists so caches can cross document (and thread) boundaries.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use image::imageops::FilterType;
use parking_lot::Mutex;
use resvg::{tiny_skia, usvg};

use crate::emoji::EmojiRecord;
use crate::error::PixmapError;

/// Default cache budget: 16 MB of decoded pixels.
const DEFAULT_MAX_SIZE_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for the pixmap cache.
#[derive(Debug, Clone)]
pub struct PixmapCacheConfig {
    /// Maximum total size of cached pixels in bytes.
    pub max_size_bytes: usize,
}

impl Default for PixmapCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
        }
    }
}

impl PixmapCacheConfig {
    /// Set the maximum cache size in megabytes.
    pub fn with_max_size_mb(mut self, mb: usize) -> Self {
        self.max_size_bytes = mb * 1024 * 1024;
        self
    }

    /// Set the maximum cache size in bytes.
    pub fn with_max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }
}

/// Cache key: emoji identity plus render parameters.
///
/// The device pixel ratio is quantized to hundredths so the key stays
/// hashable; 1.25 becomes 125.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PixmapKey {
    pub alias: String,
    pub size: u32,
    pub dpr_hundredths: u32,
}

impl PixmapKey {
    pub fn new(alias: impl Into<String>, size: u32, dpr: f64) -> Self {
        Self {
            alias: alias.into(),
            size,
            dpr_hundredths: (dpr * 100.0).round() as u32,
        }
    }
}

/// One cached rendered glyph.
struct CacheEntry {
    image: Arc<RgbaImage>,
    size_bytes: usize,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Size- and dpr-keyed emoji rasterization cache.
///
/// Not thread-safe by itself; wrap in [`SharedPixmapCache`] to share.
pub struct EmojiPixmapCache {
    config: PixmapCacheConfig,
    entries: HashMap<PixmapKey, CacheEntry>,
    /// Insertion order; eviction drops the oldest entry first. Emoji reuse
    /// is uniform enough that recency tracking does not pay for itself.
    order: VecDeque<PixmapKey>,
    current_size_bytes: usize,
    hits: u64,
    misses: u64,
}

/// Shared handle to a cache, as documents store it.
pub type SharedPixmapCache = Arc<Mutex<EmojiPixmapCache>>;

impl EmojiPixmapCache {
    /// Create a cache with the given configuration.
    pub fn new(config: PixmapCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
            current_size_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Wrap this cache for sharing across documents.
    pub fn into_shared(self) -> SharedPixmapCache {
        Arc::new(Mutex::new(self))
    }

    /// Get the rendered glyph for `record` at the given logical size and
    /// device pixel ratio, rendering and caching it on a miss.
    ///
    /// The returned image is square with side `round(size × dpr)` physical
    /// pixels, straight (non-premultiplied) RGBA. A load or decode failure
    /// is logged and yields an uncached transparent placeholder of the same
    /// dimensions, so a later call may still succeed.
    pub fn get_or_render(&mut self, record: &EmojiRecord, size: u32, dpr: f64) -> Arc<RgbaImage> {
        let key = PixmapKey::new(record.alias.clone(), size, dpr);
        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            tracing::trace!(alias = %record.alias, size, "pixmap cache hit");
            return entry.image.clone();
        }

        self.misses += 1;
        let physical = physical_size(size, dpr);
        match rasterize_asset(&record.asset, physical) {
            Ok(image) => {
                let image = Arc::new(image);
                self.insert(key, image.clone());
                tracing::debug!(
                    alias = %record.alias,
                    size,
                    physical,
                    "rendered emoji pixmap"
                );
                image
            }
            Err(err) => {
                tracing::warn!(
                    alias = %record.alias,
                    error = %err,
                    "emoji pixmap render failed, using transparent placeholder"
                );
                Arc::new(RgbaImage::new(physical.max(1), physical.max(1)))
            }
        }
    }

    /// Whether a key is currently resident.
    pub fn contains(&self, key: &PixmapKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of resident pixels in bytes.
    pub fn size_bytes(&self) -> usize {
        self.current_size_bytes
    }

    /// Number of cache hits since creation.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of cache misses since creation.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate in `[0.0, 1.0]`; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            size_bytes: self.current_size_bytes,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Drop all entries. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.current_size_bytes = 0;
    }

    fn insert(&mut self, key: PixmapKey, image: Arc<RgbaImage>) {
        let size_bytes = (image.width() * image.height() * 4) as usize;

        // Evict oldest entries until the new one fits (or nothing is left;
        // a single oversized glyph is still cached and will be evicted by
        // the next insert).
        while !self.order.is_empty()
            && self.current_size_bytes + size_bytes > self.config.max_size_bytes
        {
            if let Some(oldest) = self.order.pop_front() {
                if let Some(removed) = self.entries.remove(&oldest) {
                    self.current_size_bytes -= removed.size_bytes;
                    tracing::trace!(alias = %oldest.alias, "evicted pixmap cache entry");
                }
            }
        }

        self.current_size_bytes += size_bytes;
        self.order.push_back(key.clone());
        self.entries.insert(key, CacheEntry { image, size_bytes });
    }
}

impl Default for EmojiPixmapCache {
    fn default() -> Self {
        Self::new(PixmapCacheConfig::default())
    }
}

impl std::fmt::Debug for EmojiPixmapCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmojiPixmapCache")
            .field("entries", &self.entries.len())
            .field("size_bytes", &self.current_size_bytes)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

/// Logical pixels to physical pixels at a device pixel ratio.
pub(crate) fn physical_size(size: u32, dpr: f64) -> u32 {
    (size as f64 * dpr).round() as u32
}

/// Decode artwork at the physical target size.
fn rasterize_asset(path: &Path, physical: u32) -> Result<RgbaImage, PixmapError> {
    if physical == 0 {
        return Err(PixmapError::InvalidDimensions {
            width: physical,
            height: physical,
        });
    }

    let is_svg = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg {
        render_svg(path, physical)
    } else {
        decode_raster(path, physical)
    }
}

fn render_svg(path: &Path, target: u32) -> Result<RgbaImage, PixmapError> {
    let data = std::fs::read(path).map_err(|source| PixmapError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(&data, &options).map_err(|source| PixmapError::Svg {
        path: path.to_path_buf(),
        source,
    })?;

    let mut pixmap =
        tiny_skia::Pixmap::new(target, target).ok_or(PixmapError::InvalidDimensions {
            width: target,
            height: target,
        })?;

    // Scale the SVG's natural size onto the target square.
    let natural = tree.size();
    let sx = target as f32 / natural.width();
    let sy = target as f32 / natural.height();
    let transform = tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // Convert from premultiplied RGBA to straight RGBA
    let data = pixmap.data();
    let mut result = Vec::with_capacity(data.len());
    for chunk in data.chunks(4) {
        let a = chunk[3] as f32 / 255.0;
        if a > 0.0 {
            result.push((chunk[0] as f32 / a).min(255.0) as u8);
            result.push((chunk[1] as f32 / a).min(255.0) as u8);
            result.push((chunk[2] as f32 / a).min(255.0) as u8);
            result.push(chunk[3]);
        } else {
            result.extend_from_slice(&[0, 0, 0, 0]);
        }
    }

    RgbaImage::from_raw(target, target, result).ok_or(PixmapError::InvalidDimensions {
        width: target,
        height: target,
    })
}

fn decode_raster(path: &Path, target: u32) -> Result<RgbaImage, PixmapError> {
    let decoded = image::open(path).map_err(|source| PixmapError::Raster {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded
        .resize_exact(target, target, FilterType::Lanczos3)
        .to_rgba8())
}
