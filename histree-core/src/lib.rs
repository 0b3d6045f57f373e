//! # histree-core
//!
//! The embedded local history engine: a private, file-system-local
//! versioning system that records every structural and content change to
//! a project's files so past states can be browsed and restored without
//! any external VCS.
//!
//! The moving parts, leaf first: a content-addressed blob store
//! ([`storage::ContentStorage`], optionally wrapped by
//! [`compress::CompressingContentStorage`]), a binary stream codec
//! ([`stream`]), an in-memory snapshot tree ([`tree`]), a closed set of
//! reversible changes ([`changes`]), the append-only history log
//! ([`changelist`]) and the facade that turns host events into correctly
//! nested changesets ([`facade`]).
//!
//! The engine is single-writer: the host serializes all mutating calls
//! onto one logical sequence. Nothing here locks internally.

pub mod changelist;
pub mod changes;
pub mod compress;
pub mod content;
pub mod diff;
pub mod error;
pub mod facade;
pub mod idpath;
pub mod paths;
pub mod revisions;
pub mod storage;
pub mod stream;
pub mod tree;

pub use changelist::{ChangeList, ChangeLog};
pub use changes::{Change, ChangeSet};
pub use compress::CompressingContentStorage;
pub use content::{Content, ContentStore, InMemoryContentStorage};
pub use error::{Error, Result};
pub use facade::{
    Clock, FileSnapshot, FileSnapshotProvider, LocalHistoryFacade, SystemClock, UnsavedDocument,
    UnsavedDocumentSource,
};
pub use idpath::IdPath;
pub use revisions::Revision;
pub use storage::ContentStorage;
pub use stream::{StreamReader, StreamWriter};
pub use tree::{DirectoryEntry, Entry, FileEntry, RootEntry, ROOT_ID};
