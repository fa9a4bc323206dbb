//! Reference scanning.
//!
//! Finds image references in raw text with a configurable regular
//! expression. The whole match is the reference; capture groups are
//! ignored. There is no HTML parsing here: the pattern decides what counts.
//!
//! Matches come back lazily, left to right, never overlapping. Calling
//! [`ReferenceScanner::scan`] again restarts from the beginning.
//!
//! The default pattern accepts `img/…` paths ending in a common raster
//! extension, optionally followed by a query string:
//!
//! ```text
//! <img src="img/photo.jpg?width=800&format=webp">
//!           └────────── one match ─────────────┘
//! ```

use regex::Regex;

/// Pattern used when config does not set one.
pub const DEFAULT_PATTERN: &str =
    r#"img/[^\s"'()?]+\.(?i:jpe?g|png|gif|webp)(?:\?[^\s"'()]*)?"#;

/// One match in the scanned text, with its byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReference<'t> {
    pub text: &'t str,
    pub start: usize,
    pub end: usize,
}

/// Compiled reference pattern.
#[derive(Debug, Clone)]
pub struct ReferenceScanner {
    pattern: Regex,
}

impl ReferenceScanner {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Iterate over every reference in `text`. Empty matches are dropped.
    pub fn scan<'t>(&self, text: &'t str) -> impl Iterator<Item = RawReference<'t>> {
        self.pattern
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .map(|m| RawReference {
                text: m.as_str(),
                start: m.start(),
                end: m.end(),
            })
    }
}

impl Default for ReferenceScanner {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_PATTERN).expect("default reference pattern is valid"),
        }
    }
}
