use histree_core::{FileSnapshot, FileSnapshotProvider};
use std::path::PathBuf;

use crate::settings::WatchSettings;

// Content of these is never captured, only existence and metadata.
const BINARY_EXTENSIONS: &[&str] = &[
    "class", "exe", "dll", "so", "o", "a", "jar", "zip", "gz", "png", "jpg", "jpeg", "gif",
    "ico", "pdf",
];

/// [`FileSnapshotProvider`] over the real filesystem, rooted at a project
/// directory. Content capture is skipped for binary extensions and files
/// over the configured size limit; the snapshot itself still carries the
/// timestamp and writability.
pub struct LocalSnapshotProvider {
    root: PathBuf,
    settings: WatchSettings,
}

impl LocalSnapshotProvider {
    pub fn new(root: PathBuf, settings: WatchSettings) -> Self {
        LocalSnapshotProvider { root, settings }
    }

    fn captures_content(&self, path: &str, length: u64) -> bool {
        if length > self.settings.max_content_length {
            return false;
        }
        match path.rsplit('.').next() {
            Some(extension) => !BINARY_EXTENSIONS.contains(&extension),
            None => true,
        }
    }
}

impl FileSnapshotProvider for LocalSnapshotProvider {
    fn snapshot(&self, path: &str) -> Option<FileSnapshot> {
        let full_path = self.root.join(path);
        let metadata = std::fs::metadata(&full_path).ok()?;
        if !metadata.is_file() {
            return None;
        }

        let timestamp = metadata
            .modified()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or(-1);
        let writable = !metadata.permissions().readonly();

        let bytes = if self.captures_content(path, metadata.len()) {
            std::fs::read(&full_path).ok()
        } else {
            None
        };

        Some(FileSnapshot {
            bytes,
            timestamp,
            writable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn provider(root: &TempDir, settings: WatchSettings) -> LocalSnapshotProvider {
        LocalSnapshotProvider::new(root.path().to_path_buf(), settings)
    }

    #[test]
    fn test_snapshot_of_a_text_file() {
        let dir = TempDir::new().unwrap();
        let mut f = std::fs::File::create(dir.path().join("file.txt")).unwrap();
        f.write_all(b"content").unwrap();

        let snapshot = provider(&dir, WatchSettings::default())
            .snapshot("file.txt")
            .unwrap();
        assert_eq!(snapshot.bytes.unwrap(), b"content");
        assert!(snapshot.writable);
        assert!(snapshot.timestamp > 0);
    }

    #[test]
    fn test_missing_file_has_no_snapshot() {
        let dir = TempDir::new().unwrap();
        assert!(provider(&dir, WatchSettings::default())
            .snapshot("missing.txt")
            .is_none());
    }

    #[test]
    fn test_oversized_file_content_is_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), vec![b'x'; 64]).unwrap();

        let settings = WatchSettings {
            max_content_length: 16,
            ..WatchSettings::default()
        };
        let snapshot = provider(&dir, settings).snapshot("big.txt").unwrap();
        assert!(snapshot.bytes.is_none());
        assert!(snapshot.timestamp > 0);
    }

    #[test]
    fn test_binary_extension_content_is_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.class"), b"\xca\xfe\xba\xbe").unwrap();

        let snapshot = provider(&dir, WatchSettings::default())
            .snapshot("App.class")
            .unwrap();
        assert!(snapshot.bytes.is_none());
    }

    #[test]
    fn test_directory_has_no_snapshot() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(provider(&dir, WatchSettings::default())
            .snapshot("sub")
            .is_none());
    }
}
