use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

use crate::changes::Change;
use crate::error::{Error, Result};
use crate::idpath::IdPath;
use crate::stream::{StreamReader, StreamWriter};

/// Append-only ordered sequence of recorded changes. The facade only ever
/// appends changesets, but every consumer treats the elements uniformly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeList {
    changes: Vec<Change>,
}

impl ChangeList {
    pub fn new() -> Self {
        ChangeList::default()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Changes newest-first, the order history is browsed in.
    pub fn recent(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().rev()
    }

    /// Changes newest-first that touch the entry at `id_path`.
    pub fn recent_affecting<'a, 'b>(
        &'a self,
        id_path: &'b IdPath,
    ) -> impl Iterator<Item = &'a Change> + use<'a, 'b> {
        self.recent().filter(move |c| c.affects(id_path))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The persistent history log: one length-framed record per appended
/// change, `[u32 len][change bytes]`.
///
/// Appends flush before returning, so everything acknowledged survives a
/// process restart. A torn trailing record (a crash mid-append) is dropped
/// on open without losing earlier records; a malformed record anywhere
/// else is surfaced as inconsistent history.
pub struct ChangeLog {
    writer: Option<BufWriter<File>>,
    list: ChangeList,
}

impl ChangeLog {
    /// Log without a backing file, for tests and throwaway sessions.
    pub fn in_memory() -> Self {
        ChangeLog {
            writer: None,
            list: ChangeList::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut list = ChangeList::new();

        if path.exists() {
            let bytes = std::fs::read(path)?;
            let mut pos = 0usize;
            while pos < bytes.len() {
                if pos + 4 > bytes.len() {
                    warn!("dropping torn length prefix at end of history log");
                    break;
                }
                let len =
                    u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
                        as usize;
                pos += 4;
                if pos + len > bytes.len() {
                    warn!("dropping torn record at end of history log");
                    break;
                }
                let mut reader = StreamReader::new(&bytes[pos..pos + len]);
                let change = reader.read_change().map_err(|e| {
                    Error::inconsistent(format!("unreadable history record: {}", e))
                })?;
                if !reader.into_inner().is_empty() {
                    return Err(Error::inconsistent(
                        "trailing bytes in history record".to_string(),
                    ));
                }
                list.add_change(change);
                pos += len;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(ChangeLog {
            writer: Some(BufWriter::new(file)),
            list,
        })
    }

    pub fn append(&mut self, change: Change) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            let mut buf = Vec::new();
            StreamWriter::new(&mut buf).write_change(&change)?;
            writer.write_u32::<LittleEndian>(buf.len() as u32)?;
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        self.list.add_change(change);
        Ok(())
    }

    pub fn change_list(&self) -> &ChangeList {
        &self.list
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeSet, CreateFileChange};
    use crate::content::Content;
    use crate::tree::RootEntry;
    use tempfile::TempDir;

    fn applied_set(name: &str, file_id: i64, path: &str) -> Change {
        let mut root = RootEntry::new();
        let mut set = Change::Set(ChangeSet::new(
            1,
            Some(name.to_string()),
            vec![Change::CreateFile(CreateFileChange::new(
                file_id,
                path,
                Content::Unavailable,
                -1,
                false,
            ))],
        ));
        set.apply_to(&mut root).unwrap();
        set
    }

    #[test]
    fn test_recent_order() {
        let mut list = ChangeList::new();
        list.add_change(applied_set("1", 1, "a"));
        list.add_change(applied_set("2", 2, "b"));

        let names: Vec<_> = list.recent().map(|c| c.name().unwrap()).collect();
        assert_eq!(names, vec!["2", "1"]);
    }

    #[test]
    fn test_recent_affecting_filters_by_id_path() {
        let mut root = RootEntry::new();
        let mut first = Change::Set(ChangeSet::new(
            1,
            Some("1".to_string()),
            vec![Change::CreateFile(CreateFileChange::new(
                1,
                "file1",
                Content::Unavailable,
                -1,
                false,
            ))],
        ));
        first.apply_to(&mut root).unwrap();
        let mut second = Change::Set(ChangeSet::new(
            2,
            Some("2".to_string()),
            vec![Change::CreateFile(CreateFileChange::new(
                2,
                "file2",
                Content::Unavailable,
                -1,
                false,
            ))],
        ));
        second.apply_to(&mut root).unwrap();

        let mut list = ChangeList::new();
        list.add_change(first);
        list.add_change(second);

        let file2 = root.id_path_of("file2").unwrap();
        let names: Vec<_> = list
            .recent_affecting(&file2)
            .map(|c| c.name().unwrap())
            .collect();
        assert_eq!(names, vec!["2"]);
    }

    #[test]
    fn test_appends_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        {
            let mut log = ChangeLog::open(&path).unwrap();
            log.append(applied_set("first", 1, "a")).unwrap();
            log.append(applied_set("second", 2, "b")).unwrap();
            log.flush().unwrap();
        }

        let log = ChangeLog::open(&path).unwrap();
        let names: Vec<_> = log
            .change_list()
            .changes()
            .iter()
            .map(|c| c.name().unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_torn_tail_is_dropped_without_losing_earlier_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        {
            let mut log = ChangeLog::open(&path).unwrap();
            log.append(applied_set("kept", 1, "a")).unwrap();
            log.append(applied_set("torn", 2, "b")).unwrap();
            log.flush().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let log = ChangeLog::open(&path).unwrap();
        let names: Vec<_> = log
            .change_list()
            .changes()
            .iter()
            .map(|c| c.name().unwrap())
            .collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn test_malformed_record_is_inconsistent_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.log");

        // a full-length frame whose body is not a change
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            ChangeLog::open(&path),
            Err(Error::InconsistentHistory(_))
        ));
    }

    #[test]
    fn test_in_memory_log_keeps_order() {
        let mut log = ChangeLog::in_memory();
        log.append(applied_set("only", 1, "a")).unwrap();
        assert_eq!(log.change_list().len(), 1);
        log.flush().unwrap();
    }
}
