use std::collections::HashMap;

use crate::error::{Error, Result};

/// Content of a file entry at some point in history.
///
/// `Stored` references a slot in a [`ContentStore`]; `Transient` holds
/// bytes that were captured but not committed yet (snapshot trees, unsaved
/// documents); `Unavailable` marks content that could not be captured at
/// all (binary, huge or locked files). Only `Stored` and `Unavailable`
/// have wire representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Stored { id: i64 },
    Transient(Vec<u8>),
    Unavailable,
}

impl Content {
    pub fn is_available(&self) -> bool {
        !matches!(self, Content::Unavailable)
    }

    /// Resolves the content to bytes through the given store.
    pub fn bytes(&self, store: &dyn ContentStore) -> Result<Vec<u8>> {
        match self {
            Content::Stored { id } => store.load(*id),
            Content::Transient(bytes) => Ok(bytes.clone()),
            Content::Unavailable => Err(Error::ContentUnavailable),
        }
    }
}

/// A blob heap keyed by integer id. An explicit handle is passed wherever
/// content is stored or resolved, so independent histories never share
/// state.
///
/// Implementations are not internally synchronized; the host serializes
/// access (see the crate docs on the single-writer model).
pub trait ContentStore: Send {
    /// Stores the bytes and returns a fresh id that is not currently live.
    fn store(&mut self, bytes: &[u8]) -> Result<i64>;

    /// Returns a defensive copy of the bytes for `id`. Fails with
    /// [`Error::BrokenContent`] if the id is unknown, was removed, or the
    /// backing data is unreadable.
    fn load(&self, id: i64) -> Result<Vec<u8>>;

    /// Invalidates the slot. Loading the id afterwards fails.
    fn remove(&mut self, id: i64) -> Result<()>;

    /// Pushes pending writes to durable storage.
    fn flush(&mut self) -> Result<()>;
}

/// Map-backed store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryContentStorage {
    slots: HashMap<i64, Vec<u8>>,
    next_id: i64,
}

impl InMemoryContentStorage {
    pub fn new() -> Self {
        InMemoryContentStorage {
            slots: HashMap::new(),
            next_id: 1,
        }
    }
}

impl ContentStore for InMemoryContentStorage {
    fn store(&mut self, bytes: &[u8]) -> Result<i64> {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(id, bytes.to_vec());
        Ok(id)
    }

    fn load(&self, id: i64) -> Result<Vec<u8>> {
        self.slots
            .get(&id)
            .cloned()
            .ok_or(Error::BrokenContent { id })
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        self.slots.remove(&id);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load() {
        let mut s = InMemoryContentStorage::new();
        let id = s.store(b"abc").unwrap();
        assert_eq!(s.load(id).unwrap(), b"abc");
    }

    #[test]
    fn test_load_after_remove_fails() {
        let mut s = InMemoryContentStorage::new();
        let id = s.store(b"abc").unwrap();
        s.remove(id).unwrap();
        assert!(matches!(s.load(id), Err(Error::BrokenContent { .. })));
    }

    #[test]
    fn test_fresh_store_returns_new_id() {
        let mut s = InMemoryContentStorage::new();
        let first = s.store(b"one").unwrap();
        s.remove(first).unwrap();
        let second = s.store(b"two").unwrap();
        assert_eq!(s.load(second).unwrap(), b"two");
    }

    #[test]
    fn test_content_resolution() {
        let mut s = InMemoryContentStorage::new();
        let id = s.store(b"abc").unwrap();

        assert_eq!(Content::Stored { id }.bytes(&s).unwrap(), b"abc");
        assert_eq!(
            Content::Transient(b"buffered".to_vec()).bytes(&s).unwrap(),
            b"buffered"
        );
        assert!(matches!(
            Content::Unavailable.bytes(&s),
            Err(Error::ContentUnavailable)
        ));
    }
}
