use crate::content::Content;
use crate::error::{Error, Result};
use crate::idpath::IdPath;
use crate::paths;

/// Id reserved for the root of every snapshot tree.
pub const ROOT_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: i64,
    pub name: String,
    pub content: Content,
    pub timestamp: i64,
    pub read_only: bool,
    pub parent: Option<i64>,
}

impl FileEntry {
    pub fn new(id: i64, name: &str, content: Content, timestamp: i64, read_only: bool) -> Self {
        FileEntry {
            id,
            name: name.to_string(),
            content,
            timestamp,
            read_only,
            parent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: i64,
    pub name: String,
    pub parent: Option<i64>,
    pub(crate) children: Vec<Entry>,
}

impl DirectoryEntry {
    pub fn new(id: i64, name: &str) -> Self {
        DirectoryEntry {
            id,
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[Entry] {
        &self.children
    }

    /// Appends a child, wiring its parent back-reference to this
    /// directory. Child order is the order of addition.
    pub fn add_child(&mut self, mut child: Entry) {
        child.set_parent(Some(self.id));
        self.children.push(child);
    }
}

/// A node in a versioned snapshot tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl Entry {
    pub fn id(&self) -> i64 {
        match self {
            Entry::File(f) => f.id,
            Entry::Directory(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => &f.name,
            Entry::Directory(d) => &d.name,
        }
    }

    pub fn parent(&self) -> Option<i64> {
        match self {
            Entry::File(f) => f.parent,
            Entry::Directory(d) => d.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<i64>) {
        match self {
            Entry::File(f) => f.parent = parent,
            Entry::Directory(d) => d.parent = parent,
        }
    }

    fn set_name(&mut self, name: &str) {
        match self {
            Entry::File(f) => f.name = name.to_string(),
            Entry::Directory(d) => d.name = name.to_string(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }

    pub fn children(&self) -> &[Entry] {
        match self {
            Entry::File(_) => &[],
            Entry::Directory(d) => &d.children,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(f) => Some(f),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryEntry> {
        match self {
            Entry::Directory(d) => Some(d),
            Entry::File(_) => None,
        }
    }
}

/// The root of a snapshot tree. Owns the top-level entries; its own id is
/// always [`ROOT_ID`] and its name is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootEntry {
    pub(crate) children: Vec<Entry>,
}

impl RootEntry {
    pub fn new() -> Self {
        RootEntry::default()
    }

    pub fn children(&self) -> &[Entry] {
        &self.children
    }

    /// Walks to the children list of `dir_path` (`""` is the root itself),
    /// returning the ids along the way, root id included.
    fn descend(&self, dir_path: &str) -> Option<(Vec<i64>, &Vec<Entry>)> {
        let mut ids = vec![ROOT_ID];
        let mut children = &self.children;
        for segment in paths::split(dir_path) {
            let pos = children.iter().position(|c| c.name() == segment)?;
            match &children[pos] {
                Entry::Directory(d) => {
                    ids.push(d.id);
                    children = &d.children;
                }
                Entry::File(_) => return None,
            }
        }
        Some((ids, children))
    }

    fn descend_mut(&mut self, dir_path: &str) -> Result<(Vec<i64>, &mut Vec<Entry>)> {
        let mut ids = vec![ROOT_ID];
        let mut children = &mut self.children;
        for segment in paths::split(dir_path) {
            let pos = children
                .iter()
                .position(|c| c.name() == segment)
                .ok_or_else(|| {
                    Error::inconsistent(format!("directory not found: {}", dir_path))
                })?;
            match &mut children[pos] {
                Entry::Directory(d) => {
                    ids.push(d.id);
                    children = &mut d.children;
                }
                Entry::File(_) => {
                    return Err(Error::inconsistent(format!(
                        "not a directory: {}",
                        dir_path
                    )))
                }
            }
        }
        Ok((ids, children))
    }

    pub fn find_entry(&self, path: &str) -> Option<&Entry> {
        let (_, children) = self.descend(paths::parent_of(path))?;
        children.iter().find(|c| c.name() == paths::name_of(path))
    }

    pub fn find_entry_mut(&mut self, path: &str) -> Option<&mut Entry> {
        let name = paths::name_of(path);
        let (_, children) = self.descend_mut(paths::parent_of(path)).ok()?;
        children.iter_mut().find(|c| c.name() == name)
    }

    pub fn has_entry(&self, path: &str) -> bool {
        self.find_entry(path).is_some()
    }

    pub fn id_path_of(&self, path: &str) -> Option<IdPath> {
        let (mut ids, children) = self.descend(paths::parent_of(path))?;
        let entry = children.iter().find(|c| c.name() == paths::name_of(path))?;
        ids.push(entry.id());
        Some(IdPath::new(ids))
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Entry> {
        find_in(&self.children, id)
    }

    pub fn id_path_of_id(&self, id: i64) -> Option<IdPath> {
        let mut ids = vec![ROOT_ID];
        if trace_ids(&self.children, id, &mut ids) {
            Some(IdPath::new(ids))
        } else {
            None
        }
    }

    pub fn path_of_id(&self, id: i64) -> Option<String> {
        let mut segments = Vec::new();
        if trace_names(&self.children, id, &mut segments) {
            Some(segments.join("/"))
        } else {
            None
        }
    }

    /// Inserts `entry` under `parent_path`. A duplicate name at that path
    /// is a fatal replay error, not an overwrite.
    pub fn add_entry(&mut self, parent_path: &str, mut entry: Entry) -> Result<IdPath> {
        let (mut ids, children) = self.descend_mut(parent_path)?;
        if children.iter().any(|c| c.name() == entry.name()) {
            return Err(Error::inconsistent(format!(
                "entry already exists: {}",
                paths::join(parent_path, entry.name())
            )));
        }
        entry.set_parent(Some(*ids.last().expect("descend keeps the root id")));
        ids.push(entry.id());
        let id_path = IdPath::new(ids);
        children.push(entry);
        Ok(id_path)
    }

    /// Removes the entry at `path`, returning it with its whole subtree
    /// intact, children in their existing order.
    pub fn remove_entry(&mut self, path: &str) -> Result<(IdPath, Entry)> {
        let name = paths::name_of(path);
        let (mut ids, children) = self.descend_mut(paths::parent_of(path))?;
        let pos = children
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| Error::inconsistent(format!("entry not found: {}", path)))?;
        let mut entry = children.remove(pos);
        entry.set_parent(None);
        ids.push(entry.id());
        Ok((IdPath::new(ids), entry))
    }

    pub fn rename_entry(&mut self, path: &str, new_name: &str) -> Result<(IdPath, String)> {
        let name = paths::name_of(path);
        let (mut ids, children) = self.descend_mut(paths::parent_of(path))?;
        if name != new_name && children.iter().any(|c| c.name() == new_name) {
            return Err(Error::inconsistent(format!(
                "entry already exists: {}",
                paths::join(paths::parent_of(path), new_name)
            )));
        }
        let entry = children
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::inconsistent(format!("entry not found: {}", path)))?;
        let old_name = entry.name().to_string();
        entry.set_name(new_name);
        ids.push(entry.id());
        Ok((IdPath::new(ids), old_name))
    }

    /// Moves the entry at `path` under the directory `to_dir`, returning
    /// the old and new id paths. Everything is validated before the first
    /// mutation so a failed move leaves the tree untouched.
    pub fn move_entry(&mut self, path: &str, to_dir: &str) -> Result<(IdPath, IdPath)> {
        if paths::is_under(path, to_dir) {
            return Err(Error::inconsistent(format!(
                "cannot move {} into its own subtree {}",
                path, to_dir
            )));
        }
        let name = paths::name_of(path);
        {
            let (_, destination) = self.descend(to_dir).ok_or_else(|| {
                Error::inconsistent(format!("directory not found: {}", to_dir))
            })?;
            if destination.iter().any(|c| c.name() == name) {
                return Err(Error::inconsistent(format!(
                    "entry already exists: {}",
                    paths::join(to_dir, name)
                )));
            }
        }
        if !self.has_entry(path) {
            return Err(Error::inconsistent(format!("entry not found: {}", path)));
        }

        let (from, entry) = self.remove_entry(path)?;
        let to = self.add_entry(to_dir, entry)?;
        Ok((from, to))
    }

    pub fn set_file_content(
        &mut self,
        path: &str,
        content: Content,
        timestamp: i64,
    ) -> Result<(IdPath, Content, i64)> {
        let id_path = self
            .id_path_of(path)
            .ok_or_else(|| Error::inconsistent(format!("entry not found: {}", path)))?;
        match self.find_entry_mut(path) {
            Some(Entry::File(f)) => {
                let old_content = std::mem::replace(&mut f.content, content);
                let old_timestamp = std::mem::replace(&mut f.timestamp, timestamp);
                Ok((id_path, old_content, old_timestamp))
            }
            _ => Err(Error::inconsistent(format!("not a file: {}", path))),
        }
    }

    pub fn set_ro_status(&mut self, path: &str, read_only: bool) -> Result<(IdPath, bool)> {
        let id_path = self
            .id_path_of(path)
            .ok_or_else(|| Error::inconsistent(format!("entry not found: {}", path)))?;
        match self.find_entry_mut(path) {
            Some(Entry::File(f)) => {
                let old = std::mem::replace(&mut f.read_only, read_only);
                Ok((id_path, old))
            }
            _ => Err(Error::inconsistent(format!("not a file: {}", path))),
        }
    }
}

fn find_in(children: &[Entry], id: i64) -> Option<&Entry> {
    for child in children {
        if child.id() == id {
            return Some(child);
        }
        if let Entry::Directory(d) = child {
            if let Some(found) = find_in(&d.children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn trace_ids(children: &[Entry], id: i64, ids: &mut Vec<i64>) -> bool {
    for child in children {
        ids.push(child.id());
        if child.id() == id {
            return true;
        }
        if let Entry::Directory(d) = child {
            if trace_ids(&d.children, id, ids) {
                return true;
            }
        }
        ids.pop();
    }
    false
}

fn trace_names(children: &[Entry], id: i64, segments: &mut Vec<String>) -> bool {
    for child in children {
        segments.push(child.name().to_string());
        if child.id() == id {
            return true;
        }
        if let Entry::Directory(d) = child {
            if trace_names(&d.children, id, segments) {
                return true;
            }
        }
        segments.pop();
    }
    false
}
