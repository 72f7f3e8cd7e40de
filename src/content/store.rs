//! Mtime-keyed document store.
//!
//! Wraps the persisted doc table of [`RenderCache`]: a read whose file
//! modification time matches the cached entry returns the cached document
//! without touching the parser. Editors that rewrite files without
//! advancing mtime are invisible here, matching the staleness contract.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::RenderCache;
use crate::content::{ContentError, JsonMap, SourceDoc, parse_doc};
use crate::debug;
use crate::utils::mtime_millis;

/// Hook run after a document is parsed; its output lands in
/// [`SourceDoc::extra`] without overwriting front-matter keys.
pub type AfterRead = Box<dyn Fn(&SourceDoc) -> JsonMap + Send + Sync>;

pub struct ContentStore {
    cache: Arc<RenderCache>,
    after_read: Option<AfterRead>,
    /// Number of actual parses (cache misses), for the rebuild logs.
    parses: AtomicU64,
}

impl ContentStore {
    pub fn new(cache: Arc<RenderCache>, after_read: Option<AfterRead>) -> Self {
        Self {
            cache,
            after_read,
            parses: AtomicU64::new(0),
        }
    }

    /// Load a document, reusing the cached parse when the file's mtime is
    /// unchanged.
    pub fn read(&self, path: &Path) -> Result<SourceDoc, ContentError> {
        let meta = fs::metadata(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mtime_ms = mtime_millis(&meta);

        if let Some(doc) = self.cache.doc(path)
            && doc.mtime_ms == mtime_ms
        {
            debug!("store"; "mtime hit for {}", path.display());
            return Ok(doc);
        }

        let text = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc = parse_doc(path, &text, mtime_ms)?;
        self.parses.fetch_add(1, Ordering::Relaxed);

        if let Some(hook) = &self.after_read {
            for (key, value) in hook(&doc) {
                if !doc.matter.contains_key(&key) {
                    doc.extra.insert(key, value);
                }
            }
        }

        self.cache.insert_doc(doc.clone());
        Ok(doc)
    }

    /// Drop a deleted file's document from the cache.
    pub fn remove(&self, path: &Path) {
        self.cache.remove_doc(path);
    }

    /// Parses performed since construction.
    pub fn parse_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }
}
