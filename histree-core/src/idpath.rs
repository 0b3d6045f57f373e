use crate::tree::ROOT_ID;

/// Root-to-node sequence of entry ids, starting with the root's `-1`.
///
/// Stable across renames and moves, which makes it the cheap way to ask
/// "does this change touch entry X" without replaying history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPath(Vec<i64>);

impl IdPath {
    pub fn new(ids: Vec<i64>) -> Self {
        debug_assert_eq!(ids.first(), Some(&ROOT_ID));
        IdPath(ids)
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    /// Id of the entry the path leads to.
    pub fn leaf(&self) -> i64 {
        *self.0.last().expect("id path is never empty")
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// True when one path is a prefix of the other, i.e. one entry lies on
    /// the root-to-leaf line of the other.
    pub fn is_child_or_parent_of(&self, other: &IdPath) -> bool {
        let (shorter, longer) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        longer.starts_with(shorter)
    }
}
