//! Watch mode.
//!
//! The watcher starts before the initial build ("watcher-first"), so
//! changes made while the first batch runs are buffered in the channel
//! instead of lost. Raw notify events pass through a debouncer that
//! deduplicates per path, then each surviving change is reconciled with
//! the file system before dispatch.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam::channel;
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashMap;

use super::BlogService;
use crate::utils::normalize_path;
use crate::{debug, log};

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

/// Watch the posts directory and rebuild incrementally until interrupted.
pub fn watch(service: &BlogService) -> anyhow::Result<()> {
    let posts_dir = service.config().posts_dir();

    // start buffering events before the initial build
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })?;
    watcher.watch(&posts_dir, RecursiveMode::Recursive)?;

    service.run_all();
    log!("watch"; "watching {}", posts_dir.display());

    let (stop_tx, stop_rx) = channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;

    // bridge notify's sync channel into a selectable one
    let (event_tx, event_rx) = channel::unbounded();
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            if event_tx.send(result).is_err() {
                break;
            }
        }
    });

    let mut debouncer = Debouncer::new();
    loop {
        channel::select! {
            recv(event_rx) -> result => match result {
                Ok(Ok(event)) => debouncer.add_event(&event),
                Ok(Err(e)) => log!("watch"; "notify error: {e}"),
                Err(_) => break,
            },
            recv(stop_rx) -> _ => {
                log!("watch"; "shutting down");
                break;
            }
            default(debouncer.sleep_duration()) => {
                if let Some(changes) = debouncer.take_if_ready() {
                    dispatch(service, changes);
                }
            }
        }
    }

    service.dispose();
    Ok(())
}

/// Apply a debounced change set: removals first so renames clean up old
/// state before the new file is compiled.
fn dispatch(service: &BlogService, changes: FxHashMap<PathBuf, ChangeKind>) {
    let mut removed = Vec::new();
    let mut updated = Vec::new();

    for (path, kind) in changes {
        if !service.is_source(&path) {
            continue;
        }
        // reconcile with the file system: the watcher may report stale
        // kinds around atomic saves
        match (kind, path.is_file()) {
            (ChangeKind::Removed, false) => removed.push(path),
            (ChangeKind::Removed, true) => updated.push(path),
            (_, true) => updated.push(path),
            (_, false) => removed.push(path),
        }
    }

    let mut touched = false;
    for path in removed {
        log!("watch"; "removed {}", path.display());
        service.drop_file(&path);
        touched = true;
    }
    for path in updated {
        log!("watch"; "changed {}", path.display());
        touched |= service.refresh_file(&path);
    }
    // one manifest write per batch, not one per file
    if touched {
        service.write_manifest();
    }
}

/// Check if path is a temp/backup file (editor artifacts)
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Pure debouncer: only handles timing and event deduplication.
struct Debouncer {
    /// Path → ChangeKind (dedup is free via HashMap key uniqueness)
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    last_dispatch: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            last_dispatch: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Remove + Create/Modify → Create/Modify (file was restored)
    /// - Create/Modify + Remove → Remove (file was deleted)
    /// - Same type events: first event wins
    fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // metadata-only changes (mtime/atime/chmod noise) can
                // trigger endless rebuild loops
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }

            let path = normalize_path(path);

            if let Some(&existing) = self.changes.get(&path) {
                match (existing, kind) {
                    (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                        // deleted then restored, use the restore event
                        debug!("watch"; "restore {}->{}: {}", existing.label(), kind.label(), path.display());
                        self.changes.insert(path, kind);
                    }
                    (ChangeKind::Modified, ChangeKind::Removed) => {
                        debug!("watch"; "upgrade modified->removed: {}", path.display());
                        self.changes.insert(path, ChangeKind::Removed);
                    }
                    (ChangeKind::Created, ChangeKind::Removed) => {
                        // appeared then vanished within the window, net no-op
                        debug!("watch"; "discard created+removed: {}", path.display());
                        self.changes.remove(&path);
                    }
                    _ => continue, // same kind or Created+Modified: first wins
                }
                self.last_event = Some(Instant::now());
                continue;
            }

            debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.changes.insert(path, kind);
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the pending changes if debounce + cooldown elapsed.
    fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        if changes.is_empty() {
            return None;
        }

        self.last_dispatch = Some(Instant::now());
        Some(changes)
    }

    fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };

        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }

        if let Some(last_dispatch) = self.last_dispatch
            && last_dispatch.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }

        !self.changes.is_empty()
    }

    /// Precise sleep duration until next possible ready time.
    fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());

        let cooldown_remaining = self
            .last_dispatch
            .map(|t| Duration::from_millis(REBUILD_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify_kind() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        ))
    }

    fn create_kind() -> notify::EventKind {
        notify::EventKind::Create(notify::event::CreateKind::File)
    }

    fn remove_kind() -> notify::EventKind {
        notify::EventKind::Remove(notify::event::RemoveKind::File)
    }

    #[test]
    fn test_dispatch_applies_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::BlogConfig::default();
        config.root = dir.path().to_path_buf();
        std::fs::create_dir_all(config.posts_dir()).unwrap();
        let a = config.posts_dir().join("a.md");
        let b = config.posts_dir().join("b.md");
        std::fs::write(&a, "---\ntitle: A\n---\na\n").unwrap();
        std::fs::write(&b, "---\ntitle: B\n---\nb\n").unwrap();

        let service = BlogService::new(config.clone());
        let mut changes = FxHashMap::default();
        changes.insert(a, ChangeKind::Created);
        changes.insert(b, ChangeKind::Modified);
        dispatch(&service, changes);

        assert!(config.out_dir().join("a.vue").exists());
        assert!(config.out_dir().join("b.vue").exists());
        let manifest =
            std::fs::read_to_string(config.out_dir().join("entry.ts")).unwrap();
        assert!(manifest.contains("/post/a"));
        assert!(manifest.contains("/post/b"));

        // a removal in the next batch drops the entry again
        std::fs::remove_file(config.posts_dir().join("b.md")).unwrap();
        let mut changes = FxHashMap::default();
        changes.insert(config.posts_dir().join("b.md"), ChangeKind::Removed);
        dispatch(&service, changes);
        let manifest =
            std::fs::read_to_string(config.out_dir().join("entry.ts")).unwrap();
        assert!(!manifest.contains("/post/b"));
        service.dispose();
    }

    #[test]
    fn test_debouncer_empty() {
        let debouncer = Debouncer::new();
        assert!(!debouncer.is_ready());
    }

    #[test]
    fn test_event_routing_by_kind() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.md"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/b.md"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/c.md"], remove_kind()));

        assert_eq!(debouncer.changes.len(), 3);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.md")],
            ChangeKind::Created
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/b.md")],
            ChangeKind::Modified
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/c.md")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_temp_file_ignored() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(vec!["/tmp/.a.md.swp"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.md~"], modify_kind()));
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_dedup_first_event_wins() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.md"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.md"], modify_kind()));

        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.md")],
            ChangeKind::Created
        );
    }

    #[test]
    fn test_remove_then_create_restores() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.md"], remove_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.md"], create_kind()));

        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.md")],
            ChangeKind::Created
        );
    }

    #[test]
    fn test_create_then_remove_discards() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.md"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.md"], remove_kind()));

        assert!(
            debouncer.changes.is_empty(),
            "created+removed should discard"
        );
    }

    #[test]
    fn test_modify_then_remove_upgrades() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.md"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.md"], remove_kind()));

        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.md")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_metadata_only_modify_ignored() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(
            vec!["/tmp/a.md"],
            notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
                notify::event::MetadataKind::Any,
            )),
        ));
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_sleep_duration_after_event() {
        let mut debouncer = Debouncer::new();
        debouncer.last_event = Some(Instant::now());

        let dur = debouncer.sleep_duration();
        assert!(dur >= Duration::from_millis(DEBOUNCE_MS - 10));
        assert!(dur <= Duration::from_millis(DEBOUNCE_MS + 10));
    }

    #[test]
    fn test_take_if_ready_respects_debounce() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(vec!["/tmp/a.md"], modify_kind()));
        // still inside the debounce window
        assert!(debouncer.take_if_ready().is_none());
        assert_eq!(debouncer.changes.len(), 1);
    }
}
