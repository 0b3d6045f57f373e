use std::collections::VecDeque;
use std::path::Path;
use tracing::warn;

use crate::changelist::{ChangeLog, ChangeList};
use crate::changes::{
    Change, ChangeSet, ContentChange, CreateDirectoryChange, CreateFileChange, DeleteChange,
    MoveChange, PutEntryLabelChange, PutLabelChange, PutSystemLabelChange, ROStatusChange,
    RenameChange,
};
use crate::compress::CompressingContentStorage;
use crate::content::{Content, ContentStore};
use crate::error::{Error, Result};
use crate::revisions::{self, Revision};
use crate::storage::ContentStorage;
use crate::tree::{Entry, RootEntry};

const RECENT_CALLS_LIMIT: usize = 16;

const CONTENTS_FILE: &str = "contents.db";
const CHANGELOG_FILE: &str = "history.log";

/// Source of the current time for changeset stamping; swapped out in
/// tests to pin timestamps.
pub trait Clock: Send {
    fn now(&self) -> i64;
}

/// Wall clock in epoch milliseconds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// One captured view of a file on disk.
pub struct FileSnapshot {
    /// `None` when the bytes could not be captured (binary/huge/locked).
    pub bytes: Option<Vec<u8>>,
    pub timestamp: i64,
    pub writable: bool,
}

/// Supplied by the host: path to a captured view of the file, or `None`
/// when the file cannot be observed at all.
pub trait FileSnapshotProvider {
    fn snapshot(&self, path: &str) -> Option<FileSnapshot>;
}

/// An open edit buffer whose content is ahead of what is on disk.
pub struct UnsavedDocument {
    pub path: String,
    pub text: String,
    pub stamp: i64,
}

/// Supplied by the host: enumerates open unsaved edit buffers so edits
/// not yet persisted to primary storage are still captured.
pub trait UnsavedDocumentSource {
    fn unsaved_documents(&self) -> Vec<UnsavedDocument>;
}

impl UnsavedDocumentSource for () {
    fn unsaved_documents(&self) -> Vec<UnsavedDocument> {
        Vec::new()
    }
}

/// Converts host events into correctly nested changesets.
///
/// A single depth counter drives the nesting: only the outermost
/// begin/end pair opens and closes a changeset against the log, so bursts
/// of structural events triggered by one user-visible operation collapse
/// into a single undoable changeset. All mutating calls must arrive on
/// one logical sequence; the facade does no locking of its own.
pub struct LocalHistoryFacade {
    root: RootEntry,
    log: ChangeLog,
    store: Box<dyn ContentStore>,
    clock: Box<dyn Clock>,
    depth: u32,
    pending: Vec<Change>,
    pending_timestamp: i64,
    next_id: i64,
    recent_calls: VecDeque<String>,
}

impl LocalHistoryFacade {
    /// Opens (or creates) the history stored under `dir`: the blob heap
    /// file and the append-only log, with compressed content.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let store =
            CompressingContentStorage::new(ContentStorage::open(dir.join(CONTENTS_FILE))?);
        let log = ChangeLog::open(dir.join(CHANGELOG_FILE))?;
        Self::new(log, Box::new(store))
    }

    pub fn new(log: ChangeLog, store: Box<dyn ContentStore>) -> Result<Self> {
        Self::with_clock(log, store, Box::new(SystemClock))
    }

    /// Reconstructs the current tree by replaying the log from an empty
    /// root. A replay failure aborts the open; nothing partial escapes.
    pub fn with_clock(
        log: ChangeLog,
        store: Box<dyn ContentStore>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let mut root = RootEntry::new();
        for change in log.change_list().changes() {
            change.replay_on(&mut root)?;
        }
        let next_id = max_allocated_id(log.change_list()) + 1;

        Ok(LocalHistoryFacade {
            root,
            log,
            store,
            clock,
            depth: 0,
            pending: Vec::new(),
            pending_timestamp: 0,
            next_id,
            recent_calls: VecDeque::new(),
        })
    }

    pub fn begin_change_set(&mut self) {
        self.note_call("begin_change_set");
        self.depth += 1;
        if self.depth == 1 {
            self.pending_timestamp = self.clock.now();
        }
    }

    /// Closes the current changeset on the outermost 1→0 transition. A
    /// call with no matching begin is a host bug: it is reported with the
    /// recent call history and otherwise ignored.
    pub fn end_change_set(&mut self, name: Option<&str>) -> Result<()> {
        self.note_call(&format!("end_change_set({:?})", name));
        if self.depth == 0 {
            warn!(
                recent_calls = ?self.recent_calls,
                "end_change_set called without a matching begin_change_set"
            );
            return Ok(());
        }
        self.depth -= 1;
        if self.depth > 0 {
            return Ok(());
        }
        let changes = std::mem::take(&mut self.pending);
        let set = ChangeSet::new(self.pending_timestamp, name.map(String::from), changes);
        self.log.append(Change::Set(set))
    }

    /// Opens an action: unsaved edits predating it are flushed first so
    /// they land in their own implicit changeset, not the action's.
    pub fn start_action(&mut self, documents: &dyn UnsavedDocumentSource) -> Result<()> {
        self.flush_unsaved(documents)?;
        self.begin_change_set();
        Ok(())
    }

    /// Closes an action, capturing its unsaved edits inside the closing
    /// changeset.
    pub fn finish_action(
        &mut self,
        name: Option<&str>,
        documents: &dyn UnsavedDocumentSource,
    ) -> Result<()> {
        self.flush_unsaved(documents)?;
        self.end_change_set(name)
    }

    fn flush_unsaved(&mut self, documents: &dyn UnsavedDocumentSource) -> Result<()> {
        for doc in documents.unsaved_documents() {
            let stale = match self.root.find_entry(&doc.path) {
                Some(Entry::File(f)) => f.timestamp != doc.stamp,
                _ => false,
            };
            if stale {
                self.change_file_content(&doc.path, Some(doc.text.as_bytes()), doc.stamp)?;
            }
        }
        Ok(())
    }

    pub fn create_file(
        &mut self,
        path: &str,
        bytes: Option<&[u8]>,
        timestamp: i64,
        read_only: bool,
    ) -> Result<()> {
        let content = self.store_bytes(bytes)?;
        let id = self.allocate_id();
        self.record(Change::CreateFile(CreateFileChange::new(
            id, path, content, timestamp, read_only,
        )))
    }

    pub fn create_directory(&mut self, path: &str) -> Result<()> {
        let id = self.allocate_id();
        self.record(Change::CreateDirectory(CreateDirectoryChange::new(id, path)))
    }

    pub fn change_file_content(
        &mut self,
        path: &str,
        bytes: Option<&[u8]>,
        timestamp: i64,
    ) -> Result<()> {
        let content = self.store_bytes(bytes)?;
        self.record(Change::Content(ContentChange::new(path, content, timestamp)))
    }

    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        self.record(Change::Rename(RenameChange::new(path, new_name)))
    }

    pub fn move_entry(&mut self, path: &str, to_dir: &str) -> Result<()> {
        self.record(Change::Move(MoveChange::new(path, to_dir)))
    }

    pub fn change_ro_status(&mut self, path: &str, read_only: bool) -> Result<()> {
        self.record(Change::ROStatus(ROStatusChange::new(path, read_only)))
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.record(Change::Delete(DeleteChange::new(path)))
    }

    pub fn put_label(&mut self, name: &str) -> Result<()> {
        let timestamp = self.clock.now();
        self.record(Change::PutLabel(PutLabelChange {
            name: name.to_string(),
            timestamp,
        }))
    }

    pub fn put_entry_label(&mut self, path: &str, name: &str) -> Result<()> {
        let timestamp = self.clock.now();
        self.record(Change::PutEntryLabel(PutEntryLabelChange::new(
            path, name, timestamp,
        )))
    }

    pub fn put_system_label(&mut self, name: &str, color: i32) -> Result<()> {
        let timestamp = self.clock.now();
        self.record(Change::PutSystemLabel(PutSystemLabelChange {
            name: name.to_string(),
            color,
            timestamp,
        }))
    }

    fn record(&mut self, mut change: Change) -> Result<()> {
        change.apply_to(&mut self.root)?;
        if self.depth > 0 {
            self.pending.push(change);
            Ok(())
        } else {
            let set = ChangeSet::new(self.clock.now(), None, vec![change]);
            self.log.append(Change::Set(set))
        }
    }

    fn store_bytes(&mut self, bytes: Option<&[u8]>) -> Result<Content> {
        match bytes {
            Some(b) => Ok(Content::Stored {
                id: self.store.store(b)?,
            }),
            None => Ok(Content::Unavailable),
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn note_call(&mut self, call: &str) {
        if self.recent_calls.len() == RECENT_CALLS_LIMIT {
            self.recent_calls.pop_front();
        }
        self.recent_calls.push_back(call.to_string());
    }

    pub fn root(&self) -> &RootEntry {
        &self.root
    }

    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.root.find_entry(path)
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.root.has_entry(path)
    }

    pub fn content_store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn change_list(&self) -> &ChangeList {
        self.log.change_list()
    }

    /// Recorded changes newest-first that touch the entry at `path`,
    /// including changes still pending in an open changeset.
    pub fn changes_for(&self, path: &str) -> Vec<&Change> {
        match self.root.id_path_of(path) {
            Some(id_path) => self
                .pending
                .iter()
                .rev()
                .filter(|c| c.affects(&id_path))
                .chain(self.log.change_list().recent_affecting(&id_path))
                .collect(),
            None => Vec::new(),
        }
    }

    /// States of the entry at `path`, newest first. See
    /// [`crate::revisions`] for the exact semantics.
    pub fn revisions_for(&self, path: &str) -> Result<Vec<Revision>> {
        let id = self
            .root
            .find_entry(path)
            .ok_or_else(|| Error::inconsistent(format!("entry not found: {}", path)))?
            .id();

        let pending = if self.pending.is_empty() {
            None
        } else {
            Some(Change::Set(ChangeSet::new(
                self.pending_timestamp,
                None,
                self.pending.clone(),
            )))
        };

        let mut newest_first: Vec<&Change> = Vec::new();
        if let Some(p) = &pending {
            newest_first.push(p);
        }
        newest_first.extend(self.log.change_list().recent());

        revisions::collect_revisions(&self.root, &newest_first, id)
    }

    /// Flushes the content store and the log to durable storage.
    pub fn save(&mut self) -> Result<()> {
        self.store.flush()?;
        self.log.flush()
    }
}

fn max_allocated_id(list: &ChangeList) -> i64 {
    fn of_change(change: &Change) -> i64 {
        match change {
            Change::CreateFile(c) => c.id,
            Change::CreateDirectory(c) => c.id,
            Change::Set(set) => set.changes().iter().map(of_change).max().unwrap_or(0),
            _ => 0,
        }
    }
    list.changes().iter().map(of_change).max().unwrap_or(0)
}
