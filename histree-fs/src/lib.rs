//! # histree-fs
//!
//! Filesystem collaborators for the histree engine: the default
//! [`FileSnapshotProvider`](histree_core::FileSnapshotProvider)
//! implementation, a directory scanner that builds snapshot trees, and a
//! debounced watcher that records filesystem events into a history
//! facade.

pub mod provider;
pub mod scanner;
pub mod settings;
pub mod watcher;

pub use provider::LocalSnapshotProvider;
pub use scanner::Scanner;
pub use settings::WatchSettings;
pub use watcher::HistoryWatcher;
