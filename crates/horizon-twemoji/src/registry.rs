//! Per-document inline image registry.
//!
//! Image runs name their pixels by resource URI; the registry is the
//! document-side table a paint layer reads those pixels from. Entries are
//! composited once per URI: the cached glyph is centered on a transparent
//! canvas that adds the configured margin on every side, at the document's
//! device pixel ratio.
//!
//! The registry never evicts. It lives and dies with its document and is
//! keyed by the same deterministic URI the runs carry, so re-registering an
//! already-present URI is free unless the device pixel ratio changed.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;

use crate::cache::{EmojiPixmapCache, physical_size};
use crate::emoji::EmojiRecord;

/// One composited, registered image.
#[derive(Clone)]
pub struct RegisteredImage {
    image: Arc<RgbaImage>,
    logical_side: u32,
    device_pixel_ratio: f64,
}

impl RegisteredImage {
    /// The composited pixels (physical resolution, straight RGBA).
    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    /// Logical side length: glyph size plus both margins.
    pub fn logical_side(&self) -> u32 {
        self.logical_side
    }

    /// The device pixel ratio the entry was composited at.
    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }
}

impl std::fmt::Debug for RegisteredImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredImage")
            .field("physical", &(self.image.width(), self.image.height()))
            .field("logical_side", &self.logical_side)
            .field("device_pixel_ratio", &self.device_pixel_ratio)
            .finish()
    }
}

/// URI-keyed table of composited emoji images for one document.
#[derive(Debug, Default)]
pub struct InlineImageRegistry {
    resources: HashMap<String, RegisteredImage>,
}

impl InlineImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `uri` has a composited image.
    ///
    /// No-op when the URI is already registered at the same device pixel
    /// ratio. Otherwise the glyph is fetched from the cache at
    /// `(size, dpr)` and centered onto a transparent canvas of logical side
    /// `size + 2 × margin`. Returns whether compositing work happened.
    pub fn ensure_registered(
        &mut self,
        uri: &str,
        record: &EmojiRecord,
        size: u32,
        margin: u32,
        dpr: f64,
        cache: &mut EmojiPixmapCache,
    ) -> bool {
        if let Some(existing) = self.resources.get(uri) {
            if (existing.device_pixel_ratio - dpr).abs() < f64::EPSILON {
                return false;
            }
        }

        let glyph = cache.get_or_render(record, size, dpr);
        let canvas = composite_with_margin(&glyph, size, margin, dpr);
        tracing::trace!(
            uri,
            size,
            margin,
            physical = canvas.width(),
            "registered inline emoji image"
        );
        self.resources.insert(
            uri.to_string(),
            RegisteredImage {
                image: Arc::new(canvas),
                logical_side: size + 2 * margin,
                device_pixel_ratio: dpr,
            },
        );
        true
    }

    /// Look up a registered image by URI.
    pub fn get(&self, uri: &str) -> Option<&RegisteredImage> {
        self.resources.get(uri)
    }

    /// Whether a URI is registered.
    pub fn contains(&self, uri: &str) -> bool {
        self.resources.contains_key(uri)
    }

    /// Number of registered images.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.resources.clear();
    }
}

/// Center `glyph` on a transparent canvas adding `margin` logical pixels on
/// every side, at physical resolution.
fn composite_with_margin(glyph: &RgbaImage, size: u32, margin: u32, dpr: f64) -> RgbaImage {
    let canvas_side = physical_size(size + 2 * margin, dpr);
    let offset = physical_size(margin, dpr) as i64;
    let mut canvas = RgbaImage::new(canvas_side.max(1), canvas_side.max(1));
    image::imageops::overlay(&mut canvas, glyph, offset, offset);
    canvas
}
