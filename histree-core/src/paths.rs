//! Path helpers for the `/`-joined relative paths used throughout the
//! engine. The empty string denotes the root.

pub const DELIMITER: char = '/';

pub fn name_of(path: &str) -> &str {
    match path.rfind(DELIMITER) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Parent of a path; the empty string for top-level entries.
pub fn parent_of(path: &str) -> &str {
    match path.rfind(DELIMITER) {
        Some(i) => &path[..i],
        None => "",
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, DELIMITER, name)
    }
}

/// Path segments from root to leaf; empty for the root itself.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split(DELIMITER).filter(|s| !s.is_empty())
}

/// True if `inner` equals `outer` or lies somewhere under it.
pub fn is_under(outer: &str, inner: &str) -> bool {
    inner == outer || inner.starts_with(&format!("{}{}", outer, DELIMITER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_parent() {
        assert_eq!(name_of("dir1/dir2/file"), "file");
        assert_eq!(name_of("file"), "file");
        assert_eq!(parent_of("dir1/dir2/file"), "dir1/dir2");
        assert_eq!(parent_of("file"), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "file"), "file");
        assert_eq!(join("dir", "file"), "dir/file");
    }

    #[test]
    fn test_split() {
        let segments: Vec<_> = split("dir1/dir2/file").collect();
        assert_eq!(segments, vec!["dir1", "dir2", "file"]);
        assert_eq!(split("").count(), 0);
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("dir1", "dir1"));
        assert!(is_under("dir1", "dir1/file"));
        assert!(!is_under("dir1", "dir10/file"));
        assert!(!is_under("dir1/file", "dir1"));
    }
}
