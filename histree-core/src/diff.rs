use crate::content::ContentStore;
use crate::error::Result;
use crate::tree::{Entry, FileEntry};
use similar::{ChangeTag, TextDiff};

/// One structural difference between two states of a tree: an entry that
/// exists only on the left, only on the right, or on both sides with
/// different content. Entries are matched by id, so renames pair up.
#[derive(Debug, Clone)]
pub struct Difference {
    pub left: Option<Entry>,
    pub right: Option<Entry>,
}

/// Collects the file-level differences between two revisions of an entry.
pub fn differences(left: &Entry, right: &Entry) -> Vec<Difference> {
    let mut result = Vec::new();
    collect(Some(left), Some(right), &mut result);
    result
}

fn collect(left: Option<&Entry>, right: Option<&Entry>, result: &mut Vec<Difference>) {
    match (left, right) {
        (Some(Entry::File(l)), Some(Entry::File(r))) => {
            if l.content != r.content || l.name != r.name {
                result.push(Difference {
                    left: left.cloned(),
                    right: right.cloned(),
                });
            }
        }
        (Some(Entry::Directory(l)), Some(Entry::Directory(r))) => {
            for child in l.children() {
                let counterpart = r.children().iter().find(|c| c.id() == child.id());
                collect(Some(child), counterpart, result);
            }
            for child in r.children() {
                if !l.children().iter().any(|c| c.id() == child.id()) {
                    collect(None, Some(child), result);
                }
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            result.push(Difference {
                left: left.cloned(),
                right: right.cloned(),
            });
        }
        // a file on one side and a directory on the other share an id only
        // in a corrupted history; report it rather than recurse
        (Some(_), Some(_)) => {
            result.push(Difference {
                left: left.cloned(),
                right: right.cloned(),
            });
        }
        (None, None) => {}
    }
}

#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub diff_lines: Vec<DiffLine>,
}

#[derive(Debug, Clone)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
    pub old_line_number: Option<usize>,
    pub new_line_number: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineType {
    Context,
    Addition,
    Deletion,
}

impl FileDiff {
    /// Line-level diff between two revisions of a file, resolving both
    /// contents through the store. Unavailable or non-text content yields
    /// an empty line list.
    pub fn between(left: &FileEntry, right: &FileEntry, store: &dyn ContentStore) -> Result<Self> {
        let old_content = match left.content.is_available() {
            true => String::from_utf8(left.content.bytes(store)?).ok(),
            false => None,
        };
        let new_content = match right.content.is_available() {
            true => String::from_utf8(right.content.bytes(store)?).ok(),
            false => None,
        };

        let diff_lines = if let (Some(old), Some(new)) = (&old_content, &new_content) {
            Self::compute_diff(old, new)
        } else {
            Vec::new()
        };

        Ok(FileDiff {
            path: right.name.clone(),
            old_content,
            new_content,
            diff_lines,
        })
    }

    fn compute_diff(old_text: &str, new_text: &str) -> Vec<DiffLine> {
        let diff = TextDiff::from_lines(old_text, new_text);
        let mut lines = Vec::new();
        let mut old_line_num = 1;
        let mut new_line_num = 1;

        for change in diff.iter_all_changes() {
            let (line_type, old_num, new_num) = match change.tag() {
                ChangeTag::Delete => {
                    let num = old_line_num;
                    old_line_num += 1;
                    (DiffLineType::Deletion, Some(num), None)
                }
                ChangeTag::Insert => {
                    let num = new_line_num;
                    new_line_num += 1;
                    (DiffLineType::Addition, None, Some(num))
                }
                ChangeTag::Equal => {
                    let old_num = old_line_num;
                    let new_num = new_line_num;
                    old_line_num += 1;
                    new_line_num += 1;
                    (DiffLineType::Context, Some(old_num), Some(new_num))
                }
            };

            lines.push(DiffLine {
                line_type,
                content: change.to_string(),
                old_line_number: old_num,
                new_line_number: new_num,
            });
        }

        lines
    }

    pub fn format_unified(&self, context_lines: usize) -> String {
        let mut output = String::new();

        output.push_str(&format!("--- {}\n", self.path));
        output.push_str(&format!("+++ {}\n", self.path));

        let mut in_hunk = false;
        let mut hunk_start = 0;
        let mut hunk_lines = Vec::new();

        for (i, line) in self.diff_lines.iter().enumerate() {
            if line.line_type != DiffLineType::Context || in_hunk {
                if !in_hunk {
                    in_hunk = true;
                    hunk_start = i.saturating_sub(context_lines);
                }

                let prefix = match line.line_type {
                    DiffLineType::Addition => "+",
                    DiffLineType::Deletion => "-",
                    DiffLineType::Context => " ",
                };

                hunk_lines.push(format!("{}{}", prefix, line.content));

                if i + context_lines >= self.diff_lines.len() - 1 {
                    if !hunk_lines.is_empty() {
                        output.push_str(&format!(
                            "@@ -{},{} +{},{} @@\n",
                            self.diff_lines[hunk_start].old_line_number.unwrap_or(0),
                            hunk_lines.len(),
                            self.diff_lines[hunk_start].new_line_number.unwrap_or(0),
                            hunk_lines.len()
                        ));
                        output.push_str(&hunk_lines.join(""));
                        hunk_lines.clear();
                    }
                    in_hunk = false;
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Content, ContentStore, InMemoryContentStorage};
    use crate::tree::{DirectoryEntry, Entry, FileEntry};
    use similar_asserts::assert_eq;

    fn file(id: i64, name: &str, content: Content) -> Entry {
        Entry::File(FileEntry::new(id, name, content, -1, false))
    }

    #[test]
    fn test_no_differences_for_equal_directories() {
        let mut left = DirectoryEntry::new(1, "dir");
        left.add_child(file(2, "f", Content::Stored { id: 10 }));
        let right = left.clone();

        assert!(differences(&Entry::Directory(left), &Entry::Directory(right)).is_empty());
    }

    #[test]
    fn test_changed_content_is_a_difference() {
        let left = file(1, "f", Content::Stored { id: 10 });
        let right = file(1, "f", Content::Stored { id: 11 });

        let dd = differences(&left, &right);
        assert_eq!(dd.len(), 1);
        assert!(dd[0].left.is_some());
        assert!(dd[0].right.is_some());
    }

    #[test]
    fn test_created_file_has_no_left_side() {
        let left = DirectoryEntry::new(1, "dir");
        let mut right = DirectoryEntry::new(1, "dir");
        right.add_child(file(2, "f", Content::Unavailable));

        let dd = differences(&Entry::Directory(left), &Entry::Directory(right));
        assert_eq!(dd.len(), 1);
        assert!(dd[0].left.is_none());
        assert_eq!(dd[0].right.as_ref().unwrap().name(), "f");
    }

    #[test]
    fn test_deleted_file_has_no_right_side() {
        let mut left = DirectoryEntry::new(1, "dir");
        left.add_child(file(2, "f", Content::Unavailable));
        let right = DirectoryEntry::new(1, "dir");

        let dd = differences(&Entry::Directory(left), &Entry::Directory(right));
        assert_eq!(dd.len(), 1);
        assert!(dd[0].right.is_none());
    }

    #[test]
    fn test_renamed_file_pairs_up_by_id() {
        let left = file(1, "old", Content::Stored { id: 10 });
        let right = file(1, "new", Content::Stored { id: 10 });

        let dd = differences(&left, &right);
        assert_eq!(dd.len(), 1);
        assert_eq!(dd[0].left.as_ref().unwrap().name(), "old");
        assert_eq!(dd[0].right.as_ref().unwrap().name(), "new");
    }

    #[test]
    fn test_text_diff_between_revisions() {
        let mut store = InMemoryContentStorage::new();
        let old_id = store.store(b"line 1\nline 2\nline 3\n").unwrap();
        let new_id = store.store(b"line 1\nline 2 modified\nline 3\nline 4\n").unwrap();

        let left = FileEntry::new(1, "f", Content::Stored { id: old_id }, 1, false);
        let right = FileEntry::new(1, "f", Content::Stored { id: new_id }, 2, false);

        let diff = FileDiff::between(&left, &right, &store).unwrap();
        assert!(!diff.diff_lines.is_empty());
        assert!(diff
            .diff_lines
            .iter()
            .any(|l| l.line_type == DiffLineType::Addition));
        assert!(diff
            .diff_lines
            .iter()
            .any(|l| l.line_type == DiffLineType::Deletion));
    }

    #[test]
    fn test_unavailable_content_yields_no_lines() {
        let mut store = InMemoryContentStorage::new();
        let id = store.store(b"text").unwrap();

        let left = FileEntry::new(1, "f", Content::Unavailable, 1, false);
        let right = FileEntry::new(1, "f", Content::Stored { id }, 2, false);

        let diff = FileDiff::between(&left, &right, &store).unwrap();
        assert!(diff.old_content.is_none());
        assert!(diff.diff_lines.is_empty());
    }

    #[test]
    fn test_unified_output_names_the_file() {
        let mut store = InMemoryContentStorage::new();
        let old_id = store.store(b"a\n").unwrap();
        let new_id = store.store(b"b\n").unwrap();

        let left = FileEntry::new(1, "f", Content::Stored { id: old_id }, 1, false);
        let right = FileEntry::new(1, "f", Content::Stored { id: new_id }, 2, false);

        let diff = FileDiff::between(&left, &right, &store).unwrap();
        let unified = diff.format_unified(3);
        assert!(unified.starts_with("--- f\n+++ f\n"));
        assert!(unified.contains("-a"));
        assert!(unified.contains("+b"));
    }
}
