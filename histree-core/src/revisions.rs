use crate::changes::Change;
use crate::error::Result;
use crate::tree::{Entry, RootEntry};

/// One past state of an entry: the snapshot just after the changeset that
/// produced it, the changeset's name and timestamp, and the path the
/// entry had at that time.
#[derive(Debug, Clone)]
pub struct Revision {
    pub timestamp: i64,
    pub cause_name: Option<String>,
    pub entry: Entry,
    pub path: String,
}

/// Walks history newest-first, reverting each change on a private working
/// copy of `root`. Every change that affects the entry with `id`
/// contributes the state just before the revert, which is the state that
/// change produced. Tracking by id makes revisions follow the entry
/// across renames and moves and stop at its creation; an entry recreated
/// under the name of a deleted one never inherits the old revisions.
pub(crate) fn collect_revisions(
    root: &RootEntry,
    newest_first: &[&Change],
    id: i64,
) -> Result<Vec<Revision>> {
    let mut working = root.clone();
    let mut revisions = Vec::new();

    for change in newest_first {
        if let Some(id_path) = working.id_path_of_id(id) {
            if change.affects(&id_path) {
                let entry = working
                    .find_by_id(id)
                    .expect("entry resolved by id path")
                    .clone();
                let path = working.path_of_id(id).expect("entry resolved by id path");
                revisions.push(Revision {
                    timestamp: change.timestamp().unwrap_or(-1),
                    cause_name: change.name().map(str::to_string),
                    entry,
                    path,
                });
            }
        }
        change.revert_on(&mut working)?;
    }

    Ok(revisions)
}
