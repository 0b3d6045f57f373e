use histree_core::{paths, Content, DirectoryEntry, Entry, FileEntry, FileSnapshotProvider, RootEntry};
use std::path::Path;
use tracing::debug;

use crate::provider::LocalSnapshotProvider;
use crate::settings::WatchSettings;

/// Builds a snapshot tree from a live directory walk.
///
/// Captured file content stays transient: the tree is a throwaway view
/// and nothing is committed to a content store until the facade records
/// changes derived from it. Children are visited in name order so two
/// scans of the same directory produce equal trees.
pub struct Scanner {
    settings: WatchSettings,
}

impl Scanner {
    pub fn new(settings: WatchSettings) -> Self {
        Scanner { settings }
    }

    pub fn scan(&self, root_dir: &Path) -> anyhow::Result<RootEntry> {
        let provider = LocalSnapshotProvider::new(root_dir.to_path_buf(), self.settings.clone());
        let mut next_id = 1;
        let mut root = RootEntry::new();
        for child in self.scan_children(&provider, root_dir, "", &mut next_id)? {
            root.add_entry("", child)?;
        }
        Ok(root)
    }

    fn scan_children(
        &self,
        provider: &LocalSnapshotProvider,
        dir: &Path,
        relative: &str,
        next_id: &mut i64,
    ) -> anyhow::Result<Vec<Entry>> {
        let mut dir_entries: Vec<_> =
            std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
        dir_entries.sort_by_key(|e| e.file_name());

        let mut children = Vec::new();
        for dir_entry in dir_entries {
            let name = dir_entry.file_name().to_string_lossy().to_string();
            let relative_path = paths::join(relative, &name);
            if self.settings.should_ignore(&relative_path) {
                debug!("skipping {}", relative_path);
                continue;
            }

            let file_type = dir_entry.file_type()?;
            if file_type.is_dir() {
                let id = *next_id;
                *next_id += 1;
                let mut directory = DirectoryEntry::new(id, &name);
                for child in
                    self.scan_children(provider, &dir_entry.path(), &relative_path, next_id)?
                {
                    directory.add_child(child);
                }
                children.push(Entry::Directory(directory));
            } else if file_type.is_file() {
                let id = *next_id;
                *next_id += 1;
                let (content, timestamp, read_only) = match provider.snapshot(&relative_path) {
                    Some(snapshot) => (
                        snapshot
                            .bytes
                            .map(Content::Transient)
                            .unwrap_or(Content::Unavailable),
                        snapshot.timestamp,
                        !snapshot.writable,
                    ),
                    None => (Content::Unavailable, -1, false),
                };
                children.push(Entry::File(FileEntry::new(
                    id, &name, content, timestamp, read_only,
                )));
            }
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_builds_the_tree_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), b"fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), b"# readme").unwrap();

        let root = Scanner::new(WatchSettings::default())
            .scan(dir.path())
            .unwrap();

        let names: Vec<_> = root.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["README.md", "src"]);

        let file = root.find_entry("src/main.rs").unwrap().as_file().unwrap();
        assert_eq!(file.content, Content::Transient(b"fn main() {}".to_vec()));
    }

    #[test]
    fn test_scan_honors_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/out.o"), b"obj").unwrap();
        std::fs::write(dir.path().join("kept.txt"), b"kept").unwrap();

        let root = Scanner::new(WatchSettings::default())
            .scan(dir.path())
            .unwrap();

        assert!(root.find_entry("target").is_none());
        assert!(root.find_entry("kept.txt").is_some());
    }

    #[test]
    fn test_ids_are_unique_within_a_scan() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/f1"), b"1").unwrap();
        std::fs::write(dir.path().join("f2"), b"2").unwrap();

        let root = Scanner::new(WatchSettings::default())
            .scan(dir.path())
            .unwrap();

        let mut ids = vec![
            root.find_entry("a").unwrap().id(),
            root.find_entry("a/f1").unwrap().id(),
            root.find_entry("f2").unwrap().id(),
        ];
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
