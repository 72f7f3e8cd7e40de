//! Persisted render cache.
//!
//! Two tables survive across runs in a JSON snapshot under the output
//! directory:
//!
//! - `docs`: parsed source documents keyed by source path, so an unchanged
//!   file (same mtime) never re-parses after a restart
//! - `rendered`: finished component text keyed by render fingerprint
//!
//! A corrupt or missing snapshot is never fatal: the cache starts cold and
//! the next save overwrites it. Saves are debounced on a background thread
//! ([`saver`]); [`RenderCache::flush`] forces a synchronous write.

mod saver;

use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content::SourceDoc;
use crate::{debug, log};
use saver::Saver;

// ============================================================================
// Fingerprint
// ============================================================================

/// Identity of one render: source path, output path, and the full parsed
/// document (front-matter, mtime, content, kind).
///
/// Any input that can change the rendered output must flow through here;
/// the hex digest is the key of the `rendered` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(file: &Path, out_file: &Path, doc: &SourceDoc) -> Self {
        Self::compute_with(file, out_file, doc, "")
    }

    /// Variant carrying extra context that changes the rendered output
    /// beyond the document itself, such as the set of posts that relative
    /// links resolve against.
    pub fn compute_with(file: &Path, out_file: &Path, doc: &SourceDoc, context: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(file.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(out_file.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        // serialization is deterministic: struct fields emit in order
        let doc_json = serde_json::to_string(doc).unwrap_or_default();
        hasher.update(doc_json.as_bytes());
        hasher.update(b"\0");
        hasher.update(context.as_bytes());
        Self(hex::encode(hasher.finalize().as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// On-disk form of the cache.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Snapshot {
    #[serde(default)]
    docs: HashMap<String, SourceDoc>,
    #[serde(default)]
    rendered: HashMap<String, String>,
}

// ============================================================================
// Cache state
// ============================================================================

/// Shared cache tables; the saver thread holds its own `Arc` to this.
pub(crate) struct CacheState {
    path: PathBuf,
    disabled: bool,
    docs: DashMap<PathBuf, SourceDoc>,
    rendered: DashMap<String, String>,
    /// Fingerprints probed or inserted during this process lifetime.
    /// The snapshot keeps only these, so renames and deleted posts age
    /// out of the file instead of accumulating forever.
    touched: DashSet<String>,
}

impl CacheState {
    fn load(path: PathBuf, disabled: bool) -> Self {
        let state = Self {
            path,
            disabled,
            docs: DashMap::new(),
            rendered: DashMap::new(),
            touched: DashSet::new(),
        };
        if disabled {
            return state;
        }

        match fs::read_to_string(&state.path) {
            Ok(text) => match serde_json::from_str::<Snapshot>(&text) {
                Ok(snapshot) => {
                    for (key, doc) in snapshot.docs {
                        state.docs.insert(PathBuf::from(key), doc);
                    }
                    for (key, output) in snapshot.rendered {
                        state.rendered.insert(key, output);
                    }
                    debug!("cache"; "loaded {} docs, {} rendered entries", state.docs.len(), state.rendered.len());
                }
                Err(e) => {
                    log!("warn"; "cache snapshot {} is corrupt ({e}), starting cold", state.path.display());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log!("warn"; "cannot read cache snapshot {}: {e}", state.path.display());
            }
        }
        state
    }

    /// Serialize and write the snapshot. Only fingerprints touched this
    /// lifetime are kept.
    pub(crate) fn write_snapshot(&self) {
        if self.disabled {
            return;
        }

        let snapshot = Snapshot {
            docs: self
                .docs
                .iter()
                .map(|e| (e.key().to_string_lossy().into_owned(), e.value().clone()))
                .collect(),
            rendered: self
                .rendered
                .iter()
                .filter(|e| self.touched.contains(e.key()))
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        };

        let Ok(json) = serde_json::to_string(&snapshot) else {
            return;
        };
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match fs::write(&self.path, json) {
            Ok(()) => debug!("cache"; "snapshot written to {}", self.path.display()),
            Err(e) => log!("warn"; "failed to write cache snapshot: {e}"),
        }
    }
}

// ============================================================================
// RenderCache
// ============================================================================

/// Handle over the shared cache state plus the background saver.
pub struct RenderCache {
    state: Arc<CacheState>,
    saver: Option<Saver>,
}

impl RenderCache {
    /// Load (or cold-start) the cache and spawn its saver thread.
    pub fn load(path: PathBuf, disabled: bool) -> Self {
        let state = Arc::new(CacheState::load(path, disabled));
        let saver = (!disabled).then(|| Saver::spawn(Arc::clone(&state)));
        Self { state, saver }
    }

    pub fn is_disabled(&self) -> bool {
        self.state.disabled
    }

    // ---- doc table ---------------------------------------------------------

    pub fn doc(&self, path: &Path) -> Option<SourceDoc> {
        self.state.docs.get(path).map(|e| e.value().clone())
    }

    pub fn insert_doc(&self, doc: SourceDoc) {
        self.state.docs.insert(doc.path.clone(), doc);
        self.schedule_save();
    }

    pub fn remove_doc(&self, path: &Path) {
        if self.state.docs.remove(path).is_some() {
            self.schedule_save();
        }
    }

    /// Paths of every cached document, in no particular order.
    pub fn doc_paths(&self) -> Vec<PathBuf> {
        self.state.docs.iter().map(|e| e.key().clone()).collect()
    }

    // ---- rendered table ----------------------------------------------------

    /// Probe the rendered table. Always misses when the cache is disabled.
    pub fn rendered(&self, fp: &Fingerprint) -> Option<String> {
        if self.state.disabled {
            return None;
        }
        self.state.touched.insert(fp.as_str().to_string());
        self.state.rendered.get(fp.as_str()).map(|e| e.value().clone())
    }

    pub fn insert_rendered(&self, fp: &Fingerprint, output: String) {
        if self.state.disabled {
            return;
        }
        self.state.touched.insert(fp.as_str().to_string());
        self.state.rendered.insert(fp.as_str().to_string(), output);
        self.schedule_save();
    }

    // ---- persistence -------------------------------------------------------

    fn schedule_save(&self) {
        if let Some(saver) = &self.saver {
            saver.schedule();
        }
    }

    /// Write the snapshot now, on the calling thread.
    pub fn flush(&self) {
        self.state.write_snapshot();
    }

    /// Stop the saver thread after a final write.
    pub fn dispose(&self) {
        if let Some(saver) = &self.saver {
            saver.shutdown();
        }
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::parse_doc;

    fn doc(path: &str, mtime: u64) -> SourceDoc {
        parse_doc(Path::new(path), "---\ntitle: t\n---\nbody", mtime).unwrap()
    }

    #[test]
    fn test_fingerprint_changes_with_doc() {
        let file = Path::new("/p/a.md");
        let out = Path::new("/o/a.vue");
        let a = Fingerprint::compute(file, out, &doc("/p/a.md", 1));
        let b = Fingerprint::compute(file, out, &doc("/p/a.md", 2));
        let a2 = Fingerprint::compute(file, out, &doc("/p/a.md", 1));
        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_fingerprint_changes_with_out_file() {
        let d = doc("/p/a.md", 1);
        let a = Fingerprint::compute(Path::new("/p/a.md"), Path::new("/o/a.vue"), &d);
        let b = Fingerprint::compute(Path::new("/p/a.md"), Path::new("/o/excerpts/a.vue"), &d);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_context() {
        let file = Path::new("/p/a.md");
        let out = Path::new("/o/a.vue");
        let d = doc("/p/a.md", 1);
        let a = Fingerprint::compute_with(file, out, &d, "/p/a.md");
        let b = Fingerprint::compute_with(file, out, &d, "/p/a.md\n/p/z.md");
        let a2 = Fingerprint::compute_with(file, out, &d, "/p/a.md");
        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cache.json");

        let cache = RenderCache::load(file.clone(), false);
        let d = doc("/p/a.md", 7);
        let fp = Fingerprint::compute(&d.path, Path::new("/o/a.vue"), &d);
        cache.insert_doc(d.clone());
        cache.insert_rendered(&fp, "<template>x</template>".to_string());
        cache.dispose();

        let reloaded = RenderCache::load(file, false);
        assert_eq!(reloaded.doc(Path::new("/p/a.md")).unwrap().mtime_ms, 7);
        assert_eq!(
            reloaded.rendered(&fp).unwrap(),
            "<template>x</template>"
        );
    }

    #[test]
    fn test_untouched_entries_age_out() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cache.json");

        let cache = RenderCache::load(file.clone(), false);
        let d = doc("/p/a.md", 1);
        let fp = Fingerprint::compute(&d.path, Path::new("/o/a.vue"), &d);
        cache.insert_rendered(&fp, "out".to_string());
        cache.dispose();

        // second lifetime never probes fp, so it is dropped on save
        let second = RenderCache::load(file.clone(), false);
        second.flush();
        second.dispose();

        let third = RenderCache::load(file, false);
        assert!(third.rendered(&fp).is_none());
    }

    #[test]
    fn test_corrupt_snapshot_cold_starts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cache.json");
        fs::write(&file, "definitely not json {").unwrap();

        let cache = RenderCache::load(file, false);
        assert!(cache.doc(Path::new("/p/a.md")).is_none());
    }

    #[test]
    fn test_disabled_cache_always_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RenderCache::load(dir.path().join("cache.json"), true);
        let d = doc("/p/a.md", 1);
        let fp = Fingerprint::compute(&d.path, Path::new("/o/a.vue"), &d);
        cache.insert_rendered(&fp, "out".to_string());
        assert!(cache.rendered(&fp).is_none());
    }
}
