//! Build orchestration.
//!
//! [`BlogService`] owns the whole pipeline: scan sources, load documents
//! through the mtime store, render full and excerpt components through the
//! fingerprint cache, write output files, and keep the manifest current.
//! Files transform in parallel; a failure in one file is logged and never
//! aborts the batch.

mod watch;

pub use watch::watch;

use dashmap::DashMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{Fingerprint, RenderCache};
use crate::config::BlogConfig;
use crate::content::{AfterRead, ContentError, ContentStore, JsonMap, SourceDoc};
use crate::hooks::{self, FileContext};
use crate::manifest::{Manifest, ManifestEntry};
use crate::render::{RenderError, Renderer};
use crate::utils::rebase_with_ext;
use crate::{debug, log};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of a full batch run.
#[derive(Debug, Default)]
pub struct BuildStats {
    pub total: usize,
    /// Components actually rendered (fingerprint misses).
    pub rendered: usize,
    pub failed: usize,
}

pub struct BlogService {
    config: BlogConfig,
    cache: Arc<RenderCache>,
    store: ContentStore,
    renderer: Renderer,
    manifest: Manifest,
    /// Current manifest entries, keyed by source path.
    entries: DashMap<PathBuf, ManifestEntry>,
}

impl BlogService {
    pub fn new(config: BlogConfig) -> Self {
        let cache = Arc::new(RenderCache::load(
            config.cache_file(),
            config.cache.disable,
        ));
        let hooks = hooks::builtin_hooks(&config, Arc::clone(&cache));
        let renderer = Renderer::new(&config, hooks);
        let store = ContentStore::new(Arc::clone(&cache), Some(reading_time_hook()));
        let manifest = Manifest::new(&config);

        Self {
            config,
            cache,
            store,
            renderer,
            manifest,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    /// Find every source file matching the configured glob patterns.
    pub fn scan(&self) -> Vec<PathBuf> {
        let posts_dir = self.config.posts_dir();
        let includes = compile_patterns(&self.config.posts.includes);
        let excludes = compile_patterns(&self.config.posts.excludes);

        let mut files: Vec<PathBuf> = jwalk::WalkDir::new(&posts_dir)
            .skip_hidden(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|path| self.matches(path, &includes, &excludes))
            .collect();
        files.sort();
        files
    }

    /// Whether a path is a source file this service should transform.
    pub fn is_source(&self, path: &Path) -> bool {
        let includes = compile_patterns(&self.config.posts.includes);
        let excludes = compile_patterns(&self.config.posts.excludes);
        self.matches(path, &includes, &excludes)
    }

    fn matches(&self, path: &Path, includes: &[glob::Pattern], excludes: &[glob::Pattern]) -> bool {
        let Ok(rel) = path.strip_prefix(self.config.posts_dir()) else {
            return false;
        };
        includes.iter().any(|p| p.matches_path(rel))
            && !excludes.iter().any(|p| p.matches_path(rel))
    }

    /// Transform every source file, then rebuild the manifest from scratch.
    pub fn run_all(&self) -> BuildStats {
        let started = Instant::now();
        let files = self.scan();
        let mut stats = BuildStats {
            total: files.len(),
            ..BuildStats::default()
        };

        // load every document before rendering anything: excerpt link
        // resolution looks targets up in the doc table, so a post early in
        // the batch must already see the ones after it
        files.par_iter().for_each(|path| {
            if let Err(e) = self.store.read(path) {
                debug!("store"; "preload failed for {}: {e}", path.display());
            }
        });

        let results: Vec<(PathBuf, Result<(ManifestEntry, usize), ServiceError>)> = files
            .into_par_iter()
            .map(|path| {
                let result = self.transform_file(&path);
                (path, result)
            })
            .collect();

        self.entries.clear();
        for (path, result) in results {
            match result {
                Ok((entry, rendered)) => {
                    stats.rendered += rendered;
                    self.entries.insert(path, entry);
                }
                Err(e) => {
                    stats.failed += 1;
                    log!("error"; "{e}");
                }
            }
        }

        self.write_manifest();
        self.cache.flush();

        log!(
            "build";
            "{} files ({} rendered, {} cached, {} failed, {} parsed) in {:.0?}",
            stats.total,
            stats.rendered,
            stats.total.saturating_sub(stats.failed) * 2 - stats.rendered,
            stats.failed,
            self.store.parse_count(),
            started.elapsed()
        );
        stats
    }

    /// Transform one source file into its full and excerpt components.
    ///
    /// Returns the manifest entry and how many of the two components were
    /// actually rendered (as opposed to served from the cache).
    pub fn transform_file(&self, path: &Path) -> Result<(ManifestEntry, usize), ServiceError> {
        let doc = self.store.read(path)?;

        let out_file = self.component_path(path);
        let excerpt_file = self.excerpt_path(path);

        let mut rendered = 0;
        rendered += usize::from(self.emit(&doc, &out_file, "")?);
        rendered += usize::from(self.emit(&doc.as_excerpt(), &excerpt_file, &self.link_targets())?);

        let entry = ManifestEntry {
            source: path.to_path_buf(),
            excerpt_component: excerpt_file,
            matter: doc.merged_matter(),
        };
        Ok((entry, rendered))
    }

    /// Render one component, going through the fingerprint cache.
    ///
    /// A cache hit still writes the output when the file is missing on
    /// disk (e.g. after the output directory was wiped). Returns whether a
    /// fresh render happened.
    fn emit(&self, doc: &SourceDoc, out_file: &Path, context: &str) -> Result<bool, ServiceError> {
        let fp = Fingerprint::compute_with(&doc.path, out_file, doc, context);
        let ctx = FileContext {
            file: doc.path.clone(),
            out_file: out_file.to_path_buf(),
        };

        if let Some(cached) = self.cache.rendered(&fp) {
            debug!("cache"; "hit for {}", out_file.display());
            if !out_file.exists() {
                write_component(out_file, &cached)?;
            }
            return Ok(false);
        }

        let text = self.renderer.render(doc, &ctx)?.assemble();
        write_component(out_file, &text)?;
        self.cache.insert_rendered(&fp, text);
        Ok(true)
    }

    /// Sorted document set, folded into excerpt fingerprints so a cached
    /// excerpt with resolved (or unresolved) post links is invalidated
    /// when a link target appears or disappears.
    fn link_targets(&self) -> String {
        let mut paths: Vec<String> = self
            .cache
            .doc_paths()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        paths.sort();
        paths.join("\n")
    }

    /// Handle a created or modified source file during watch.
    pub fn update_file(&self, path: &Path) {
        if self.refresh_file(path) {
            self.write_manifest();
        }
    }

    /// Handle a deleted source file: drop cached state, remove both output
    /// components, and rebuild the manifest without it.
    pub fn remove_file(&self, path: &Path) {
        self.drop_file(path);
        self.write_manifest();
    }

    /// Transform one file and refresh its manifest entry, leaving the
    /// manifest write to the caller so a batch regenerates it once.
    fn refresh_file(&self, path: &Path) -> bool {
        match self.transform_file(path) {
            Ok((entry, rendered)) => {
                debug!("watch"; "updated {} ({} rendered)", path.display(), rendered);
                self.entries.insert(path.to_path_buf(), entry);
                true
            }
            Err(e) => {
                log!("error"; "{e}");
                false
            }
        }
    }

    /// Forget a deleted file and remove its output components, leaving the
    /// manifest write to the caller.
    fn drop_file(&self, path: &Path) {
        self.store.remove(path);
        self.entries.remove(path);

        for out in [self.component_path(path), self.excerpt_path(path)] {
            match fs::remove_file(&out) {
                Ok(()) => debug!("watch"; "removed {}", out.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log!("warn"; "failed to remove {}: {e}", out.display()),
            }
        }
    }

    fn write_manifest(&self) {
        let mut entries: Vec<ManifestEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        match self.manifest.write(&mut entries) {
            Ok(true) => log!("manifest"; "updated {}", self.manifest.entry_path().display()),
            Ok(false) => {}
            Err(e) => log!("error"; "failed to write manifest: {e}"),
        }
    }

    fn component_path(&self, source: &Path) -> PathBuf {
        rebase_with_ext(
            source,
            &self.config.posts_dir(),
            &self.config.out_dir(),
            &self.config.build.component_ext,
        )
    }

    fn excerpt_path(&self, source: &Path) -> PathBuf {
        rebase_with_ext(
            source,
            &self.config.posts_dir(),
            &self.config.out_dir().join(&self.config.build.excerpts_dir),
            &self.config.build.component_ext,
        )
    }

    /// Persist the cache and stop its background saver.
    pub fn dispose(&self) {
        self.cache.dispose();
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                log!("warn"; "invalid glob pattern `{p}`: {e}");
                None
            }
        })
        .collect()
}

/// Estimated reading time in minutes, exposed to templates as
/// `frontmatter.readingTime`.
fn reading_time_hook() -> AfterRead {
    Box::new(|doc| {
        let words = doc.content.split_whitespace().count();
        let minutes = words.div_ceil(200).max(1);
        let mut extra = JsonMap::new();
        extra.insert("readingTime".to_string(), minutes.into());
        extra
    })
}

fn write_component(path: &Path, text: &str) -> Result<(), ServiceError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    };
    write().map_err(|source| ServiceError::Write {
        path: path.to_path_buf(),
        source,
    })
}
