//! The `twemoji://` resource URI codec.
//!
//! Inline emoji image runs are named by a URI that encodes the emoji alias,
//! the margin, and the logical size: `twemoji://<alias>?m=<margin>&s=<size>`
//! (`m` omitted when zero). The same string is the registry key, so two runs
//! rendered with identical parameters share one composited image.
//!
//! Encoding is deterministic and has exactly one producer; parsing is
//! lenient about absent query parameters so URIs from older documents still
//! decode. Any non-`twemoji` scheme is rejected with
//! [`ResourceUriError::UnsupportedScheme`], which callers treat as "foreign
//! image, leave it alone".

use std::fmt;

use url::Url;

use crate::error::ResourceUriError;

/// The reserved scheme for emoji image runs.
pub const RESOURCE_SCHEME: &str = "twemoji";

const RESOURCE_URI_PREFIX: &str = "twemoji://";

/// Decoded form of an emoji resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    /// Primary alias of the emoji, e.g. `grinning`.
    pub alias: String,
    /// Margin in logical pixels around the glyph (0 when absent).
    pub margin: u32,
    /// Logical glyph size in pixels (0 when absent).
    pub size: u32,
}

impl ResourceUri {
    /// Build a URI value from its parts.
    pub fn new(alias: impl Into<String>, margin: u32, size: u32) -> Self {
        Self {
            alias: alias.into(),
            margin,
            size,
        }
    }

    /// Encode to the canonical string form.
    ///
    /// Identical parts always produce identical strings; `m` is omitted
    /// when the margin is zero. Canonical aliases are word characters, so
    /// no percent-escaping is needed.
    pub fn encode(&self) -> String {
        if self.margin > 0 {
            format!(
                "{}{}?m={}&s={}",
                RESOURCE_URI_PREFIX, self.alias, self.margin, self.size
            )
        } else {
            format!("{}{}?s={}", RESOURCE_URI_PREFIX, self.alias, self.size)
        }
    }

    /// Parse a resource URI.
    ///
    /// The alias comes from the host component. Absent or unparseable query
    /// parameters default to zero rather than failing.
    ///
    /// # Errors
    ///
    /// - [`ResourceUriError::UnsupportedScheme`] for any non-`twemoji` URI
    /// - [`ResourceUriError::MissingAlias`] when the host is empty
    /// - [`ResourceUriError::Malformed`] when the string is not a URI
    pub fn parse(uri: &str) -> Result<Self, ResourceUriError> {
        let parsed = Url::parse(uri)?;
        if parsed.scheme() != RESOURCE_SCHEME {
            return Err(ResourceUriError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }

        let alias = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or(ResourceUriError::MissingAlias)?
            .to_string();

        let mut margin = 0;
        let mut size = 0;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "m" => margin = value.parse().unwrap_or(0),
                "s" => size = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        Ok(Self {
            alias,
            margin,
            size,
        })
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Cheap check whether an image run name belongs to the engine.
///
/// Runs with any other name are foreign and are never rewritten.
pub fn is_twemoji_uri(uri: &str) -> bool {
    uri.starts_with(RESOURCE_URI_PREFIX)
}
