//! Error types for the document engine.
//!
//! Operational failures inside the change pipeline never surface to the
//! editing flow: asset problems degrade to a transparent placeholder and
//! lookup misses skip the substitution. These types exist for the places
//! where a caller genuinely wants the cause (URI parsing, cache internals).

use std::path::PathBuf;

use thiserror::Error;

/// Errors from parsing a `twemoji://` resource URI.
#[derive(Error, Debug)]
pub enum ResourceUriError {
    /// The URI carries a scheme other than `twemoji`.
    ///
    /// Callers use this to recognize foreign image runs and leave them
    /// untouched.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The URI has no alias component.
    #[error("missing emoji alias")]
    MissingAlias,

    /// The URI is not parseable at all.
    #[error("malformed resource uri: {0}")]
    Malformed(#[from] url::ParseError),
}

/// Errors from loading or decoding emoji artwork.
///
/// The pixmap cache logs these and substitutes a transparent placeholder;
/// they never escape the rendering path.
#[derive(Error, Debug)]
pub enum PixmapError {
    /// The asset file could not be read.
    #[error("failed to read emoji asset {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The asset was read but is not a decodable SVG.
    #[error("failed to parse svg asset {}: {source}", .path.display())]
    Svg {
        path: PathBuf,
        #[source]
        source: resvg::usvg::Error,
    },

    /// The asset was read but is not a decodable raster image.
    #[error("failed to decode raster asset {}: {source}", .path.display())]
    Raster {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The rasterization target has a zero dimension.
    #[error("invalid pixmap dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}
