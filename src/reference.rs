//! Reference parsing.
//!
//! Turns one matched substring into an [`ImageReference`]: a source path
//! relative to the source root plus the query parameters that drive the
//! transformation.
//!
//! ```text
//! "/img/my%20photo.jpg?width=800&format=webp"
//!   path   = img/my photo.jpg
//!   params = { format: webp, width: 800 }
//! ```
//!
//! Parsing goes through `url::Url` joined onto a `file:///` base, so relative
//! references, absolute paths and full URLs all reduce to a path. `..`
//! segments are resolved by the URL parser and cannot climb above the root;
//! escaped separators (`%2F`, `%5C`) and escaped dot segments that survive
//! resolution are rejected.

use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

static BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("file:///").expect("static base URL is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference `{0}` has no path component")]
    MissingPath(String),
    #[error("reference `{reference}` is not a valid URI: {message}")]
    Unparsable { reference: String, message: String },
}

/// A parsed image reference. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Exactly what the scanner matched.
    pub matched: String,
    /// Percent-decoded path, rooted only if the reference was.
    pub decoded_path: String,
    /// Decoded path relative to the source root.
    pub path: String,
    /// Query parameters. A repeated key keeps its last value.
    pub params: BTreeMap<String, String>,
}

impl ImageReference {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Last path segment, e.g. `photo.jpg`.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// `(stem, extension)` of the file name; the extension keeps its dot and
    /// its original case, and is empty when there is none.
    pub fn split_file_name(&self) -> (&str, &str) {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => (name, ""),
            Some(dot) => name.split_at(dot),
        }
    }

    pub fn relative_path(&self) -> &Path {
        Path::new(&self.path)
    }
}

/// Parse one matched reference.
pub fn parse_reference(matched: &str) -> Result<ImageReference, ReferenceError> {
    let stripped = matched.replace("&amp;", "&").replace(['"', '\''], "");
    if stripped.trim().is_empty() {
        return Err(ReferenceError::MissingPath(matched.to_string()));
    }

    let url = BASE
        .join(stripped.trim())
        .map_err(|e| ReferenceError::Unparsable {
            reference: matched.to_string(),
            message: e.to_string(),
        })?;

    let path = decode_segments(&url, matched)?;
    let decoded_path = if stripped.trim_start().starts_with('/') {
        format!("/{path}")
    } else {
        path.clone()
    };
    if path.is_empty() || path.ends_with('/') {
        return Err(ReferenceError::MissingPath(matched.to_string()));
    }

    let params = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    Ok(ImageReference {
        matched: matched.to_string(),
        decoded_path,
        path,
        params,
    })
}

/// Percent-decode each path segment on its own. `..` has already been
/// resolved by the URL parser, so a segment that decodes to a separator or a
/// dot segment would reintroduce traversal and is rejected.
fn decode_segments(url: &Url, matched: &str) -> Result<String, ReferenceError> {
    let unparsable = |message: String| ReferenceError::Unparsable {
        reference: matched.to_string(),
        message,
    };
    let Some(segments) = url.path_segments() else {
        return Err(ReferenceError::MissingPath(matched.to_string()));
    };

    let mut decoded = Vec::new();
    for segment in segments {
        let segment = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|e| unparsable(e.to_string()))?;
        if segment.contains(['/', '\\']) {
            return Err(unparsable(format!("segment `{segment}` encodes a path separator")));
        }
        if segment == "." || segment == ".." {
            return Err(unparsable(format!("segment `{segment}` leaves the source root")));
        }
        decoded.push(segment);
    }
    Ok(decoded.join("/"))
}
