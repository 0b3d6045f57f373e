use crate::content::ContentStore;
use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA_VERSION: i32 = 1;

/// File-backed blob heap keyed by integer id.
///
/// The backing store is a single SQLite file; each row carries a SHA-256
/// checksum verified on load, so corruption of one slot never bleeds into
/// unrelated ids. The slot layout and id allocation are internal details;
/// the external contract is only store/load/remove and persistence across
/// restarts of the same backing file.
pub struct ContentStorage {
    conn: Connection,
}

impl ContentStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS contents (
                id INTEGER PRIMARY KEY,
                bytes BLOB NOT NULL,
                digest TEXT NOT NULL
            );
            "#,
        )?;

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .optional()?;

        if version.is_none() {
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    fn digest(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

impl ContentStore for ContentStorage {
    fn store(&mut self, bytes: &[u8]) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO contents (bytes, digest) VALUES (?1, ?2)",
            params![bytes, Self::digest(bytes)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load(&self, id: i64) -> Result<Vec<u8>> {
        let row: Option<(Vec<u8>, String)> = self
            .conn
            .query_row(
                "SELECT bytes, digest FROM contents WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((bytes, digest)) if Self::digest(&bytes) == digest => Ok(bytes),
            _ => Err(Error::BrokenContent { id }),
        }
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM contents WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // The connection runs in autocommit mode; every store/remove is
        // durable once the statement returns.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_load_roundtrip() {
        let mut s = ContentStorage::in_memory().unwrap();
        let id = s.store(b"content").unwrap();
        assert_eq!(s.load(id).unwrap(), b"content");
    }

    #[test]
    fn test_empty_bytes() {
        let mut s = ContentStorage::in_memory().unwrap();
        let id = s.store(b"").unwrap();
        assert_eq!(s.load(id).unwrap(), b"");
    }

    #[test]
    fn test_load_unknown_id_fails() {
        let s = ContentStorage::in_memory().unwrap();
        assert!(matches!(s.load(42), Err(Error::BrokenContent { id: 42 })));
    }

    #[test]
    fn test_load_after_remove_fails() {
        let mut s = ContentStorage::in_memory().unwrap();
        let id = s.store(b"content").unwrap();
        s.remove(id).unwrap();
        assert!(matches!(s.load(id), Err(Error::BrokenContent { .. })));
    }

    #[test]
    fn test_removed_slot_reuse_never_resurrects_old_bytes() {
        let mut s = ContentStorage::in_memory().unwrap();
        let first = s.store(b"old bytes").unwrap();
        s.remove(first).unwrap();

        let second = s.store(b"new bytes").unwrap();
        assert_eq!(s.load(second).unwrap(), b"new bytes");
        if second != first {
            assert!(s.load(first).is_err());
        }
    }

    #[test]
    fn test_fresh_ids_are_distinct_while_live() {
        let mut s = ContentStorage::in_memory().unwrap();
        let a = s.store(b"a").unwrap();
        let b = s.store(b"b").unwrap();
        assert_ne!(a, b);
        assert_eq!(s.load(a).unwrap(), b"a");
        assert_eq!(s.load(b).unwrap(), b"b");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contents.db");

        let id = {
            let mut s = ContentStorage::open(&path).unwrap();
            let id = s.store(b"durable").unwrap();
            s.flush().unwrap();
            id
        };

        let s = ContentStorage::open(&path).unwrap();
        assert_eq!(s.load(id).unwrap(), b"durable");
    }

    #[test]
    fn test_corrupted_row_is_local_to_its_id() {
        let mut s = ContentStorage::in_memory().unwrap();
        let good = s.store(b"good").unwrap();
        let bad = s.store(b"bad").unwrap();

        s.conn
            .execute(
                "UPDATE contents SET bytes = ?1 WHERE id = ?2",
                params![b"tampered".as_slice(), bad],
            )
            .unwrap();

        assert!(matches!(s.load(bad), Err(Error::BrokenContent { .. })));
        assert_eq!(s.load(good).unwrap(), b"good");
    }
}
