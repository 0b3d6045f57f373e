use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::changelist::ChangeList;
use crate::changes::{
    AppliedContent, AppliedDelete, AppliedMove, AppliedROStatus, AppliedRename, Change,
    ChangeSet, ContentChange, CreateDirectoryChange, CreateFileChange, DeleteChange, MoveChange,
    PutEntryLabelChange, PutLabelChange, PutSystemLabelChange, ROStatusChange, RenameChange,
};
use crate::content::Content;
use crate::error::{Error, Result};
use crate::idpath::IdPath;
use crate::tree::{DirectoryEntry, Entry, FileEntry, RootEntry, ROOT_ID};

// Every write_x/read_x pair below is symmetric: reading consumes exactly
// the bytes the matching write produced, regardless of what precedes or
// follows in the stream.

const CONTENT_STORED: u8 = 0;
const CONTENT_UNAVAILABLE: u8 = 1;

const ENTRY_FILE: u8 = 0;
const ENTRY_DIRECTORY: u8 = 1;
const ENTRY_ROOT: u8 = 2;

const CHANGE_CREATE_FILE: u8 = 0;
const CHANGE_CREATE_DIRECTORY: u8 = 1;
const CHANGE_CONTENT: u8 = 2;
const CHANGE_DELETE: u8 = 3;
const CHANGE_RENAME: u8 = 4;
const CHANGE_MOVE: u8 = 5;
const CHANGE_RO_STATUS: u8 = 6;
const CHANGE_PUT_LABEL: u8 = 7;
const CHANGE_PUT_ENTRY_LABEL: u8 = 8;
const CHANGE_PUT_SYSTEM_LABEL: u8 = 9;
const CHANGE_SET: u8 = 10;

pub struct StreamWriter<W: Write> {
    out: W,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(out: W) -> Self {
        StreamWriter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.out.write_u32::<LittleEndian>(s.len() as u32)?;
        self.out.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn write_string_or_null(&mut self, s: Option<&str>) -> Result<()> {
        self.write_boolean(s.is_some())?;
        if let Some(s) = s {
            self.write_string(s)?;
        }
        Ok(())
    }

    pub fn write_integer(&mut self, v: i32) -> Result<()> {
        self.out.write_i32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn write_long(&mut self, v: i64) -> Result<()> {
        self.out.write_i64::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn write_boolean(&mut self, v: bool) -> Result<()> {
        self.out.write_u8(v as u8)?;
        Ok(())
    }

    pub fn write_id_path(&mut self, p: &IdPath) -> Result<()> {
        self.out.write_u32::<LittleEndian>(p.ids().len() as u32)?;
        for id in p.ids() {
            self.out.write_i64::<LittleEndian>(*id)?;
        }
        Ok(())
    }

    /// Only stored and unavailable content exist on the wire; a transient
    /// buffer must be committed to a store before serialization.
    pub fn write_content(&mut self, c: &Content) -> Result<()> {
        match c {
            Content::Stored { id } => {
                self.out.write_u8(CONTENT_STORED)?;
                self.write_long(*id)?;
            }
            Content::Unavailable => {
                self.out.write_u8(CONTENT_UNAVAILABLE)?;
            }
            Content::Transient(_) => return Err(Error::UnappliedChange),
        }
        Ok(())
    }

    /// Parent links are never written; they are rebuilt on read.
    pub fn write_entry(&mut self, e: &Entry) -> Result<()> {
        match e {
            Entry::File(f) => {
                self.out.write_u8(ENTRY_FILE)?;
                self.write_long(f.id)?;
                self.write_string(&f.name)?;
                self.write_content(&f.content)?;
                self.write_long(f.timestamp)?;
                self.write_boolean(f.read_only)?;
            }
            Entry::Directory(d) => {
                self.out.write_u8(ENTRY_DIRECTORY)?;
                self.write_long(d.id)?;
                self.write_string(&d.name)?;
                self.out.write_u32::<LittleEndian>(d.children.len() as u32)?;
                for child in &d.children {
                    self.write_entry(child)?;
                }
            }
        }
        Ok(())
    }

    pub fn write_root(&mut self, root: &RootEntry) -> Result<()> {
        self.out.write_u8(ENTRY_ROOT)?;
        self.out
            .write_u32::<LittleEndian>(root.children.len() as u32)?;
        for child in &root.children {
            self.write_entry(child)?;
        }
        Ok(())
    }

    pub fn write_change(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::CreateFile(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_CREATE_FILE)?;
                self.write_string(&c.path)?;
                self.write_long(c.id)?;
                self.write_content(&c.content)?;
                self.write_long(c.timestamp)?;
                self.write_boolean(c.read_only)?;
                self.write_id_path(applied)?;
            }
            Change::CreateDirectory(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_CREATE_DIRECTORY)?;
                self.write_string(&c.path)?;
                self.write_long(c.id)?;
                self.write_id_path(applied)?;
            }
            Change::Content(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_CONTENT)?;
                self.write_string(&c.path)?;
                self.write_content(&c.content)?;
                self.write_long(c.timestamp)?;
                self.write_id_path(&applied.id_path)?;
                self.write_content(&applied.old_content)?;
                self.write_long(applied.old_timestamp)?;
            }
            Change::Delete(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_DELETE)?;
                self.write_string(&c.path)?;
                self.write_id_path(&applied.id_path)?;
                self.write_entry(&applied.entry)?;
            }
            Change::Rename(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_RENAME)?;
                self.write_string(&c.path)?;
                self.write_string(&c.new_name)?;
                self.write_id_path(&applied.id_path)?;
                self.write_string(&applied.old_name)?;
            }
            Change::Move(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_MOVE)?;
                self.write_string(&c.path)?;
                self.write_string(&c.to_dir)?;
                self.write_id_path(&applied.from)?;
                self.write_id_path(&applied.to)?;
            }
            Change::ROStatus(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_RO_STATUS)?;
                self.write_string(&c.path)?;
                self.write_boolean(c.read_only)?;
                self.write_id_path(&applied.id_path)?;
                self.write_boolean(applied.old_status)?;
            }
            Change::PutLabel(c) => {
                self.out.write_u8(CHANGE_PUT_LABEL)?;
                self.write_string(&c.name)?;
                self.write_long(c.timestamp)?;
            }
            Change::PutEntryLabel(c) => {
                let applied = c.applied.as_ref().ok_or(Error::UnappliedChange)?;
                self.out.write_u8(CHANGE_PUT_ENTRY_LABEL)?;
                self.write_string(&c.path)?;
                self.write_string(&c.name)?;
                self.write_long(c.timestamp)?;
                self.write_id_path(applied)?;
            }
            Change::PutSystemLabel(c) => {
                self.out.write_u8(CHANGE_PUT_SYSTEM_LABEL)?;
                self.write_string(&c.name)?;
                self.write_integer(c.color)?;
                self.write_long(c.timestamp)?;
            }
            Change::Set(set) => {
                self.out.write_u8(CHANGE_SET)?;
                self.write_long(set.timestamp)?;
                self.write_string_or_null(set.name.as_deref())?;
                self.out
                    .write_u32::<LittleEndian>(set.changes.len() as u32)?;
                for child in &set.changes {
                    self.write_change(child)?;
                }
            }
        }
        Ok(())
    }

    pub fn write_change_list(&mut self, list: &ChangeList) -> Result<()> {
        self.out
            .write_u32::<LittleEndian>(list.changes().len() as u32)?;
        for change in list.changes() {
            self.write_change(change)?;
        }
        Ok(())
    }
}

pub struct StreamReader<R: Read> {
    input: R,
}

impl<R: Read> StreamReader<R> {
    pub fn new(input: R) -> Self {
        StreamReader { input }
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.input.read_u32::<LittleEndian>()? as usize;
        let mut buf = vec![0u8; len];
        self.input.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| Error::stream("invalid utf-8 in string"))
    }

    pub fn read_string_or_null(&mut self) -> Result<Option<String>> {
        if self.read_boolean()? {
            Ok(Some(self.read_string()?))
        } else {
            Ok(None)
        }
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        Ok(self.input.read_i32::<LittleEndian>()?)
    }

    pub fn read_long(&mut self) -> Result<i64> {
        Ok(self.input.read_i64::<LittleEndian>()?)
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        match self.input.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::stream(format!("invalid boolean: {}", other))),
        }
    }

    pub fn read_id_path(&mut self) -> Result<IdPath> {
        let count = self.input.read_u32::<LittleEndian>()? as usize;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(self.input.read_i64::<LittleEndian>()?);
        }
        Ok(IdPath::new(ids))
    }

    pub fn read_content(&mut self) -> Result<Content> {
        match self.input.read_u8()? {
            CONTENT_STORED => Ok(Content::Stored {
                id: self.read_long()?,
            }),
            CONTENT_UNAVAILABLE => Ok(Content::Unavailable),
            other => Err(Error::stream(format!("invalid content tag: {}", other))),
        }
    }

    pub fn read_entry(&mut self) -> Result<Entry> {
        let tag = self.input.read_u8()?;
        self.read_entry_with_tag(tag)
    }

    fn read_entry_with_tag(&mut self, tag: u8) -> Result<Entry> {
        match tag {
            ENTRY_FILE => {
                let id = self.read_long()?;
                let name = self.read_string()?;
                let content = self.read_content()?;
                let timestamp = self.read_long()?;
                let read_only = self.read_boolean()?;
                Ok(Entry::File(FileEntry {
                    id,
                    name,
                    content,
                    timestamp,
                    read_only,
                    parent: None,
                }))
            }
            ENTRY_DIRECTORY => {
                let id = self.read_long()?;
                let name = self.read_string()?;
                let children = self.read_children(id)?;
                Ok(Entry::Directory(DirectoryEntry {
                    id,
                    name,
                    parent: None,
                    children,
                }))
            }
            other => Err(Error::stream(format!("invalid entry tag: {}", other))),
        }
    }

    pub fn read_root(&mut self) -> Result<RootEntry> {
        let tag = self.input.read_u8()?;
        if tag != ENTRY_ROOT {
            return Err(Error::stream(format!("invalid root entry tag: {}", tag)));
        }
        let children = self.read_children(ROOT_ID)?;
        Ok(RootEntry { children })
    }

    fn read_children(&mut self, parent_id: i64) -> Result<Vec<Entry>> {
        let count = self.input.read_u32::<LittleEndian>()? as usize;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            let mut child = self.read_entry()?;
            child.set_parent(Some(parent_id));
            children.push(child);
        }
        Ok(children)
    }

    pub fn read_change(&mut self) -> Result<Change> {
        let tag = self.input.read_u8()?;
        match tag {
            CHANGE_CREATE_FILE => {
                let path = self.read_string()?;
                let id = self.read_long()?;
                let content = self.read_content()?;
                let timestamp = self.read_long()?;
                let read_only = self.read_boolean()?;
                let applied = self.read_id_path()?;
                Ok(Change::CreateFile(CreateFileChange {
                    path,
                    id,
                    content,
                    timestamp,
                    read_only,
                    applied: Some(applied),
                }))
            }
            CHANGE_CREATE_DIRECTORY => {
                let path = self.read_string()?;
                let id = self.read_long()?;
                let applied = self.read_id_path()?;
                Ok(Change::CreateDirectory(CreateDirectoryChange {
                    path,
                    id,
                    applied: Some(applied),
                }))
            }
            CHANGE_CONTENT => {
                let path = self.read_string()?;
                let content = self.read_content()?;
                let timestamp = self.read_long()?;
                let id_path = self.read_id_path()?;
                let old_content = self.read_content()?;
                let old_timestamp = self.read_long()?;
                Ok(Change::Content(ContentChange {
                    path,
                    content,
                    timestamp,
                    applied: Some(AppliedContent {
                        id_path,
                        old_content,
                        old_timestamp,
                    }),
                }))
            }
            CHANGE_DELETE => {
                let path = self.read_string()?;
                let id_path = self.read_id_path()?;
                let entry = self.read_entry()?;
                Ok(Change::Delete(DeleteChange {
                    path,
                    applied: Some(AppliedDelete { id_path, entry }),
                }))
            }
            CHANGE_RENAME => {
                let path = self.read_string()?;
                let new_name = self.read_string()?;
                let id_path = self.read_id_path()?;
                let old_name = self.read_string()?;
                Ok(Change::Rename(RenameChange {
                    path,
                    new_name,
                    applied: Some(AppliedRename { id_path, old_name }),
                }))
            }
            CHANGE_MOVE => {
                let path = self.read_string()?;
                let to_dir = self.read_string()?;
                let from = self.read_id_path()?;
                let to = self.read_id_path()?;
                Ok(Change::Move(MoveChange {
                    path,
                    to_dir,
                    applied: Some(AppliedMove { from, to }),
                }))
            }
            CHANGE_RO_STATUS => {
                let path = self.read_string()?;
                let read_only = self.read_boolean()?;
                let id_path = self.read_id_path()?;
                let old_status = self.read_boolean()?;
                Ok(Change::ROStatus(ROStatusChange {
                    path,
                    read_only,
                    applied: Some(AppliedROStatus {
                        id_path,
                        old_status,
                    }),
                }))
            }
            CHANGE_PUT_LABEL => {
                let name = self.read_string()?;
                let timestamp = self.read_long()?;
                Ok(Change::PutLabel(PutLabelChange { name, timestamp }))
            }
            CHANGE_PUT_ENTRY_LABEL => {
                let path = self.read_string()?;
                let name = self.read_string()?;
                let timestamp = self.read_long()?;
                let applied = self.read_id_path()?;
                Ok(Change::PutEntryLabel(PutEntryLabelChange {
                    path,
                    name,
                    timestamp,
                    applied: Some(applied),
                }))
            }
            CHANGE_PUT_SYSTEM_LABEL => {
                let name = self.read_string()?;
                let color = self.read_integer()?;
                let timestamp = self.read_long()?;
                Ok(Change::PutSystemLabel(PutSystemLabelChange {
                    name,
                    color,
                    timestamp,
                }))
            }
            CHANGE_SET => {
                let timestamp = self.read_long()?;
                let name = self.read_string_or_null()?;
                let count = self.input.read_u32::<LittleEndian>()? as usize;
                let mut changes = Vec::with_capacity(count);
                for _ in 0..count {
                    changes.push(self.read_change()?);
                }
                Ok(Change::Set(ChangeSet {
                    timestamp,
                    name,
                    changes,
                }))
            }
            other => Err(Error::stream(format!("invalid change tag: {}", other))),
        }
    }

    pub fn read_change_list(&mut self) -> Result<ChangeList> {
        let count = self.input.read_u32::<LittleEndian>()? as usize;
        let mut list = ChangeList::new();
        for _ in 0..count {
            list.add_change(self.read_change()?);
        }
        Ok(list)
    }
}
