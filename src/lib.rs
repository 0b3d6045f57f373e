//! # histree
//!
//! Embedded local history engine: silently records every structural and
//! content change to a project's files so past states can be browsed and
//! restored without any external VCS.
//!
//! This crate only re-exports the workspace members; see [`histree_core`]
//! for the engine and [`histree_fs`] for the filesystem collaborators.

pub use histree_core::*;
pub use histree_fs::{HistoryWatcher, LocalSnapshotProvider, Scanner, WatchSettings};
