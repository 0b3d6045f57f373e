use crate::content::Content;
use crate::error::{Error, Result};
use crate::idpath::IdPath;
use crate::paths;
use crate::tree::{DirectoryEntry, Entry, FileEntry, RootEntry};

/// A reversible mutation of a snapshot tree.
///
/// The set is closed: every consumer dispatches by exhaustive `match`.
/// Applying a change captures the artifacts needed to revert it and to
/// answer [`Change::affects`] without replaying; those artifacts travel
/// with the change through the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    CreateFile(CreateFileChange),
    CreateDirectory(CreateDirectoryChange),
    Content(ContentChange),
    Delete(DeleteChange),
    Rename(RenameChange),
    Move(MoveChange),
    ROStatus(ROStatusChange),
    PutLabel(PutLabelChange),
    PutEntryLabel(PutEntryLabelChange),
    PutSystemLabel(PutSystemLabelChange),
    Set(ChangeSet),
}

impl Change {
    /// Forward mutation that also captures revert artifacts. The first
    /// application wins; replaying a deserialized change goes through
    /// [`Change::replay_on`] instead.
    pub fn apply_to(&mut self, root: &mut RootEntry) -> Result<()> {
        match self {
            Change::CreateFile(c) => {
                let id_path = root.add_entry(paths::parent_of(&c.path), c.entry())?;
                c.applied = Some(id_path);
            }
            Change::CreateDirectory(c) => {
                let entry = Entry::Directory(DirectoryEntry::new(c.id, paths::name_of(&c.path)));
                let id_path = root.add_entry(paths::parent_of(&c.path), entry)?;
                c.applied = Some(id_path);
            }
            Change::Content(c) => {
                let (id_path, old_content, old_timestamp) =
                    root.set_file_content(&c.path, c.content.clone(), c.timestamp)?;
                c.applied = Some(AppliedContent {
                    id_path,
                    old_content,
                    old_timestamp,
                });
            }
            Change::Delete(c) => {
                let (id_path, entry) = root.remove_entry(&c.path)?;
                c.applied = Some(AppliedDelete { id_path, entry });
            }
            Change::Rename(c) => {
                let (id_path, old_name) = root.rename_entry(&c.path, &c.new_name)?;
                c.applied = Some(AppliedRename { id_path, old_name });
            }
            Change::Move(c) => {
                let (from, to) = root.move_entry(&c.path, &c.to_dir)?;
                c.applied = Some(AppliedMove { from, to });
            }
            Change::ROStatus(c) => {
                let (id_path, old_status) = root.set_ro_status(&c.path, c.read_only)?;
                c.applied = Some(AppliedROStatus {
                    id_path,
                    old_status,
                });
            }
            Change::PutLabel(_) | Change::PutSystemLabel(_) => {}
            Change::PutEntryLabel(c) => {
                let id_path = root.id_path_of(&c.path).ok_or_else(|| {
                    Error::inconsistent(format!("entry not found: {}", c.path))
                })?;
                c.applied = Some(id_path);
            }
            Change::Set(set) => {
                for child in &mut set.changes {
                    child.apply_to(root)?;
                }
            }
        }
        Ok(())
    }

    /// Forward mutation without recapturing artifacts; used when a tree is
    /// reconstructed from already-recorded history. On error the target
    /// tree may hold a partial changeset and must be discarded by the
    /// replayer.
    pub fn replay_on(&self, root: &mut RootEntry) -> Result<()> {
        match self {
            Change::CreateFile(c) => {
                root.add_entry(paths::parent_of(&c.path), c.entry())?;
            }
            Change::CreateDirectory(c) => {
                let entry = Entry::Directory(DirectoryEntry::new(c.id, paths::name_of(&c.path)));
                root.add_entry(paths::parent_of(&c.path), entry)?;
            }
            Change::Content(c) => {
                root.set_file_content(&c.path, c.content.clone(), c.timestamp)?;
            }
            Change::Delete(c) => {
                root.remove_entry(&c.path)?;
            }
            Change::Rename(c) => {
                root.rename_entry(&c.path, &c.new_name)?;
            }
            Change::Move(c) => {
                root.move_entry(&c.path, &c.to_dir)?;
            }
            Change::ROStatus(c) => {
                root.set_ro_status(&c.path, c.read_only)?;
            }
            Change::PutLabel(_) | Change::PutSystemLabel(_) => {}
            Change::PutEntryLabel(c) => {
                if !root.has_entry(&c.path) {
                    return Err(Error::inconsistent(format!(
                        "entry not found: {}",
                        c.path
                    )));
                }
            }
            Change::Set(set) => {
                for child in &set.changes {
                    child.replay_on(root)?;
                }
            }
        }
        Ok(())
    }

    /// Inverse mutation from the retained artifacts. Requires the change
    /// to have been applied (or read back from the log).
    pub fn revert_on(&self, root: &mut RootEntry) -> Result<()> {
        match self {
            Change::CreateFile(c) => {
                c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.remove_entry(&c.path)?;
            }
            Change::CreateDirectory(c) => {
                c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.remove_entry(&c.path)?;
            }
            Change::Content(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.set_file_content(
                    &c.path,
                    applied.old_content.clone(),
                    applied.old_timestamp,
                )?;
            }
            Change::Delete(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.add_entry(paths::parent_of(&c.path), applied.entry.clone())?;
            }
            Change::Rename(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.rename_entry(&c.renamed_path(), &applied.old_name)?;
            }
            Change::Move(c) => {
                c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.move_entry(&c.moved_path(), paths::parent_of(&c.path))?;
            }
            Change::ROStatus(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                root.set_ro_status(&c.path, applied.old_status)?;
            }
            Change::PutLabel(_) | Change::PutEntryLabel(_) | Change::PutSystemLabel(_) => {}
            Change::Set(set) => {
                for child in set.changes.iter().rev() {
                    child.revert_on(root)?;
                }
            }
        }
        Ok(())
    }

    /// Does this change touch the entry at `id_path`? True when any
    /// affected path lies on the same root-to-leaf line: labels are
    /// tree-wide, a change inside a directory affects the directory, a
    /// change to a directory affects everything under it.
    pub fn affects(&self, id_path: &IdPath) -> bool {
        match self {
            Change::PutLabel(_) | Change::PutSystemLabel(_) => true,
            Change::Set(set) => set.changes.iter().any(|c| c.affects(id_path)),
            _ => self
                .affected_id_paths()
                .iter()
                .any(|p| p.is_child_or_parent_of(id_path)),
        }
    }

    pub fn affected_id_paths(&self) -> Vec<IdPath> {
        match self {
            Change::CreateFile(c) => c.applied.iter().cloned().collect(),
            Change::CreateDirectory(c) => c.applied.iter().cloned().collect(),
            Change::Content(c) => c.applied.iter().map(|a| a.id_path.clone()).collect(),
            Change::Delete(c) => c.applied.iter().map(|a| a.id_path.clone()).collect(),
            Change::Rename(c) => c.applied.iter().map(|a| a.id_path.clone()).collect(),
            Change::Move(c) => c
                .applied
                .iter()
                .flat_map(|a| [a.from.clone(), a.to.clone()])
                .collect(),
            Change::ROStatus(c) => c.applied.iter().map(|a| a.id_path.clone()).collect(),
            Change::PutLabel(_) | Change::PutSystemLabel(_) => Vec::new(),
            Change::PutEntryLabel(c) => c.applied.iter().cloned().collect(),
            Change::Set(set) => set
                .changes
                .iter()
                .flat_map(|c| c.affected_id_paths())
                .collect(),
        }
    }

    /// User-visible name; present for changesets and labels.
    pub fn name(&self) -> Option<&str> {
        match self {
            Change::Set(set) => set.name.as_deref(),
            Change::PutLabel(c) => Some(&c.name),
            Change::PutEntryLabel(c) => Some(&c.name),
            Change::PutSystemLabel(c) => Some(&c.name),
            _ => None,
        }
    }

    /// Recording time; present for changesets and labels.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Change::Set(set) => Some(set.timestamp),
            Change::PutLabel(c) => Some(c.timestamp),
            Change::PutEntryLabel(c) => Some(c.timestamp),
            Change::PutSystemLabel(c) => Some(c.timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileChange {
    pub path: String,
    pub id: i64,
    pub content: Content,
    pub timestamp: i64,
    pub read_only: bool,
    pub(crate) applied: Option<IdPath>,
}

impl CreateFileChange {
    pub fn new(id: i64, path: &str, content: Content, timestamp: i64, read_only: bool) -> Self {
        CreateFileChange {
            path: path.to_string(),
            id,
            content,
            timestamp,
            read_only,
            applied: None,
        }
    }

    fn entry(&self) -> Entry {
        Entry::File(FileEntry::new(
            self.id,
            paths::name_of(&self.path),
            self.content.clone(),
            self.timestamp,
            self.read_only,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDirectoryChange {
    pub path: String,
    pub id: i64,
    pub(crate) applied: Option<IdPath>,
}

impl CreateDirectoryChange {
    pub fn new(id: i64, path: &str) -> Self {
        CreateDirectoryChange {
            path: path.to_string(),
            id,
            applied: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppliedContent {
    pub(crate) id_path: IdPath,
    pub(crate) old_content: Content,
    pub(crate) old_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub path: String,
    pub content: Content,
    pub timestamp: i64,
    pub(crate) applied: Option<AppliedContent>,
}

impl ContentChange {
    pub fn new(path: &str, content: Content, timestamp: i64) -> Self {
        ContentChange {
            path: path.to_string(),
            content,
            timestamp,
            applied: None,
        }
    }

    pub fn old_content(&self) -> Option<&Content> {
        self.applied.as_ref().map(|a| &a.old_content)
    }

    pub fn old_timestamp(&self) -> Option<i64> {
        self.applied.as_ref().map(|a| a.old_timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppliedDelete {
    pub(crate) id_path: IdPath,
    pub(crate) entry: Entry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteChange {
    pub path: String,
    pub(crate) applied: Option<AppliedDelete>,
}

impl DeleteChange {
    pub fn new(path: &str) -> Self {
        DeleteChange {
            path: path.to_string(),
            applied: None,
        }
    }

    /// The removed subtree, children in their original order.
    pub fn affected_entry(&self) -> Option<&Entry> {
        self.applied.as_ref().map(|a| &a.entry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppliedRename {
    pub(crate) id_path: IdPath,
    pub(crate) old_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameChange {
    pub path: String,
    pub new_name: String,
    pub(crate) applied: Option<AppliedRename>,
}

impl RenameChange {
    pub fn new(path: &str, new_name: &str) -> Self {
        RenameChange {
            path: path.to_string(),
            new_name: new_name.to_string(),
            applied: None,
        }
    }

    pub fn old_name(&self) -> Option<&str> {
        self.applied.as_ref().map(|a| a.old_name.as_str())
    }

    fn renamed_path(&self) -> String {
        paths::join(paths::parent_of(&self.path), &self.new_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppliedMove {
    pub(crate) from: IdPath,
    pub(crate) to: IdPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveChange {
    pub path: String,
    pub to_dir: String,
    pub(crate) applied: Option<AppliedMove>,
}

impl MoveChange {
    pub fn new(path: &str, to_dir: &str) -> Self {
        MoveChange {
            path: path.to_string(),
            to_dir: to_dir.to_string(),
            applied: None,
        }
    }

    fn moved_path(&self) -> String {
        paths::join(&self.to_dir, paths::name_of(&self.path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppliedROStatus {
    pub(crate) id_path: IdPath,
    pub(crate) old_status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ROStatusChange {
    pub path: String,
    pub read_only: bool,
    pub(crate) applied: Option<AppliedROStatus>,
}

impl ROStatusChange {
    pub fn new(path: &str, read_only: bool) -> Self {
        ROStatusChange {
            path: path.to_string(),
            read_only,
            applied: None,
        }
    }

    pub fn old_status(&self) -> Option<bool> {
        self.applied.as_ref().map(|a| a.old_status)
    }
}

/// Tree-wide checkpoint marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutLabelChange {
    pub name: String,
    pub timestamp: i64,
}

/// Checkpoint scoped to one entry and its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutEntryLabelChange {
    pub path: String,
    pub name: String,
    pub timestamp: i64,
    pub(crate) applied: Option<IdPath>,
}

impl PutEntryLabelChange {
    pub fn new(path: &str, name: &str, timestamp: i64) -> Self {
        PutEntryLabelChange {
            path: path.to_string(),
            name: name.to_string(),
            timestamp,
            applied: None,
        }
    }
}

/// Tree-wide checkpoint placed by the system rather than the user,
/// carrying a UI color tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutSystemLabelChange {
    pub name: String,
    pub color: i32,
    pub timestamp: i64,
}

/// The smallest named atomic group of changes; the unit of undo and
/// browsing. Children apply in order and revert in reverse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub timestamp: i64,
    pub name: Option<String>,
    pub(crate) changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(timestamp: i64, name: Option<String>, changes: Vec<Change>) -> Self {
        ChangeSet {
            timestamp,
            name,
            changes,
        }
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}
