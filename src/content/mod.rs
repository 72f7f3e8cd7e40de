//! Source document model and loading.
//!
//! A [`SourceDoc`] is the parsed form of one markdown file: open
//! front-matter mapping, body with the header stripped, derived excerpt,
//! and the modification time used as the staleness signal.

mod excerpt;
mod frontmatter;
mod store;

pub use excerpt::extract_excerpt;
pub use frontmatter::split_frontmatter;
pub use store::{AfterRead, ContentStore};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Open JSON object map (insertion-ordered via serde_json's preserve_order).
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Errors from reading and parsing a source document.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed front-matter in {path}: {message}")]
    Frontmatter { path: PathBuf, message: String },
}

/// Whether a document renders in full or as its excerpt only.
///
/// Excerpt renders change link-rewriting behavior downstream: excerpt
/// components are hosted on listing pages, so relative post links must be
/// resolved to absolute post URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    #[default]
    Full,
    Excerpt,
}

/// A parsed markdown source document.
///
/// Created on read, replaced wholesale on re-read; never mutated in place
/// once cached. Two documents never share a `path` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDoc {
    /// Absolute source path, unique key.
    pub path: PathBuf,
    /// Open front-matter mapping.
    pub matter: JsonMap,
    /// Modification time in milliseconds since the Unix epoch.
    ///
    /// The sole staleness signal: any change not reflected here is
    /// invisible to the content store.
    pub mtime_ms: u64,
    /// Body text with the front-matter block stripped.
    pub content: String,
    /// Lead text before the `<!-- more -->` marker plus any footnote or
    /// link-reference lines, so the excerpt stays a valid document.
    pub excerpt: String,
    /// Extra data merged by the `after_read` hook; never overwrites
    /// front-matter keys.
    #[serde(default)]
    pub extra: JsonMap,
    /// Full-document or excerpt-only render.
    #[serde(default)]
    pub kind: DocKind,
}

impl SourceDoc {
    /// Derive the excerpt-only variant of this document.
    pub fn as_excerpt(&self) -> Self {
        Self {
            content: self.excerpt.clone(),
            kind: DocKind::Excerpt,
            ..self.clone()
        }
    }

    /// Front-matter `layout` field, if present and a string.
    pub fn layout(&self) -> Option<&str> {
        self.matter.get("layout").and_then(|v| v.as_str())
    }

    /// Hook extras merged under front-matter; front-matter wins on a key
    /// collision.
    pub fn merged_matter(&self) -> JsonMap {
        let mut merged = self.extra.clone();
        for (key, value) in &self.matter {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Parse file text into a [`SourceDoc`].
///
/// Splits the front-matter header, derives the excerpt, and leaves `extra`
/// empty for the store's `after_read` hook to fill.
pub fn parse_doc(path: &Path, text: &str, mtime_ms: u64) -> Result<SourceDoc, ContentError> {
    let (matter, body) = split_frontmatter(text).map_err(|message| ContentError::Frontmatter {
        path: path.to_path_buf(),
        message,
    })?;

    let excerpt = extract_excerpt(body);

    Ok(SourceDoc {
        path: path.to_path_buf(),
        matter,
        mtime_ms,
        content: body.to_string(),
        excerpt,
        extra: JsonMap::new(),
        kind: DocKind::Full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_doc_full() {
        let text = "---\ntitle: Hello\nlayout: home\n---\n\nBody text\n";
        let doc = parse_doc(Path::new("/p/a.md"), text, 42).unwrap();
        assert_eq!(doc.matter.get("title").unwrap(), "Hello");
        assert_eq!(doc.layout(), Some("home"));
        assert_eq!(doc.content, "Body text\n");
        assert_eq!(doc.mtime_ms, 42);
        assert_eq!(doc.kind, DocKind::Full);
    }

    #[test]
    fn test_as_excerpt() {
        let text = "Intro\n\n<!-- more -->\n\nRest";
        let doc = parse_doc(Path::new("/p/a.md"), text, 0).unwrap();
        let excerpt = doc.as_excerpt();
        assert_eq!(excerpt.kind, DocKind::Excerpt);
        assert_eq!(excerpt.content, "Intro");
        assert_eq!(excerpt.path, doc.path);
    }

    #[test]
    fn test_frontmatter_error_names_path() {
        let text = "+++\ntitle = \"unclosed\ndate=\n+++\n";
        let err = parse_doc(Path::new("/p/bad.md"), text, 0).unwrap_err();
        assert!(matches!(err, ContentError::Frontmatter { ref path, .. } if path.ends_with("bad.md")));
    }
}
