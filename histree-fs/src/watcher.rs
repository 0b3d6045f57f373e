use histree_core::{paths, FileSnapshotProvider, LocalHistoryFacade};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::provider::LocalSnapshotProvider;
use crate::settings::WatchSettings;

/// Debounced recursive watcher that records filesystem events into a
/// history facade. Each debounced burst is wrapped in one changeset, so a
/// build touching fifty files stays one undoable step.
///
/// The facade is shared behind a mutex; that lock is the host-side
/// serialization the engine requires, the engine itself stays lock-free.
pub struct HistoryWatcher {
    _facade: Arc<Mutex<LocalHistoryFacade>>,
    _debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl HistoryWatcher {
    pub fn new(
        root_path: PathBuf,
        facade: Arc<Mutex<LocalHistoryFacade>>,
        settings: WatchSettings,
    ) -> anyhow::Result<Self> {
        let provider = LocalSnapshotProvider::new(root_path.clone(), settings.clone());
        let facade_clone = Arc::clone(&facade);
        let root_path_for_events = root_path.clone();

        let (tx, mut rx) = mpsc::channel(100);

        let debouncer = new_debouncer(
            settings.debounce(),
            None,
            move |result: DebounceEventResult| {
                if let Err(e) = tx.blocking_send(result) {
                    error!("Failed to send event: {}", e);
                }
            },
        )?;

        let mut watcher = Self {
            _facade: facade,
            _debouncer: debouncer,
        };

        watcher
            ._debouncer
            .watcher()
            .watch(&root_path, RecursiveMode::Recursive)?;

        info!("History watcher started for {:?}", root_path);

        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(events) => {
                        let mut facade = facade_clone.lock().unwrap();
                        facade.begin_change_set();
                        for event in events {
                            if let Err(e) = Self::handle_event(
                                event.event,
                                &root_path_for_events,
                                &settings,
                                &provider,
                                &mut facade,
                            ) {
                                error!("Error handling event: {}", e);
                            }
                        }
                        if let Err(e) = facade.end_change_set(None) {
                            error!("Failed to close changeset: {}", e);
                        }
                    }
                    Err(errors) => {
                        for error in errors {
                            error!("Watch error: {:?}", error);
                        }
                    }
                }
            }
        });

        Ok(watcher)
    }

    fn handle_event(
        event: Event,
        root_path: &Path,
        settings: &WatchSettings,
        provider: &LocalSnapshotProvider,
        facade: &mut LocalHistoryFacade,
    ) -> anyhow::Result<()> {
        for path in event.paths {
            let relative = match path.strip_prefix(root_path) {
                Ok(p) => p.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if relative.is_empty() || settings.should_ignore(&relative) {
                continue;
            }

            match event.kind {
                EventKind::Create(_) => {
                    if facade.has_entry(&relative) {
                        continue;
                    }
                    info!("Created: {:?}", path);
                    Self::record_create(&relative, &path, provider, facade)?;
                }
                EventKind::Modify(_) => {
                    info!("Modified: {:?}", path);
                    if !facade.has_entry(&relative) {
                        Self::record_create(&relative, &path, provider, facade)?;
                    } else if path.is_file() {
                        let (bytes, timestamp) = match provider.snapshot(&relative) {
                            Some(s) => (s.bytes, s.timestamp),
                            None => (None, -1),
                        };
                        facade.change_file_content(&relative, bytes.as_deref(), timestamp)?;
                    }
                }
                EventKind::Remove(_) => {
                    if facade.has_entry(&relative) {
                        info!("Removed: {:?}", path);
                        facade.delete(&relative)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn record_create(
        relative: &str,
        path: &Path,
        provider: &LocalSnapshotProvider,
        facade: &mut LocalHistoryFacade,
    ) -> anyhow::Result<()> {
        Self::ensure_directories(paths::parent_of(relative), facade)?;
        if path.is_dir() {
            facade.create_directory(relative)?;
        } else {
            let (bytes, timestamp, read_only) = match provider.snapshot(relative) {
                Some(s) => (s.bytes, s.timestamp, !s.writable),
                None => (None, -1, false),
            };
            facade.create_file(relative, bytes.as_deref(), timestamp, read_only)?;
        }
        Ok(())
    }

    // Events can arrive for a nested path before its parents were ever
    // seen, e.g. when a whole subtree lands at once.
    fn ensure_directories(dir_path: &str, facade: &mut LocalHistoryFacade) -> anyhow::Result<()> {
        if dir_path.is_empty() || facade.has_entry(dir_path) {
            return Ok(());
        }
        Self::ensure_directories(paths::parent_of(dir_path), facade)?;
        facade.create_directory(dir_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histree_core::{ChangeLog, InMemoryContentStorage};
    use tempfile::TempDir;

    fn new_facade() -> Arc<Mutex<LocalHistoryFacade>> {
        Arc::new(Mutex::new(
            LocalHistoryFacade::new(
                ChangeLog::in_memory(),
                Box::new(InMemoryContentStorage::new()),
            )
            .unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp_dir = TempDir::new().unwrap();
        let facade = new_facade();

        let _watcher = HistoryWatcher::new(
            temp_dir.path().to_path_buf(),
            facade,
            WatchSettings::default(),
        )
        .unwrap();
    }

    #[test]
    fn test_create_event_records_parents_first() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("a/b")).unwrap();
        std::fs::write(temp_dir.path().join("a/b/file.txt"), b"content").unwrap();

        let facade = new_facade();
        let provider = LocalSnapshotProvider::new(
            temp_dir.path().to_path_buf(),
            WatchSettings::default(),
        );

        let mut guard = facade.lock().unwrap();
        HistoryWatcher::record_create(
            "a/b/file.txt",
            &temp_dir.path().join("a/b/file.txt"),
            &provider,
            &mut guard,
        )
        .unwrap();

        assert!(guard.has_entry("a"));
        assert!(guard.has_entry("a/b"));
        let file = guard
            .entry("a/b/file.txt")
            .unwrap()
            .as_file()
            .unwrap()
            .clone();
        assert_eq!(
            file.content.bytes(guard.content_store()).unwrap(),
            b"content"
        );
    }

    #[test]
    fn test_remove_of_untracked_path_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let facade = new_facade();
        let provider = LocalSnapshotProvider::new(
            temp_dir.path().to_path_buf(),
            WatchSettings::default(),
        );

        let event = Event {
            kind: EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![temp_dir.path().join("never-seen.txt")],
            attrs: Default::default(),
        };

        let mut guard = facade.lock().unwrap();
        HistoryWatcher::handle_event(
            event,
            temp_dir.path(),
            &WatchSettings::default(),
            &provider,
            &mut guard,
        )
        .unwrap();

        assert!(guard.change_list().is_empty());
    }
}
