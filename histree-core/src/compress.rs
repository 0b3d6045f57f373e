use crate::content::ContentStore;
use crate::error::{Error, Result};

/// Wrapper that compresses blobs on store and decompresses on load,
/// delegating slot management to the inner store.
///
/// Round-trips are exact for every input, including the empty byte
/// sequence. Bytes that fail to decompress are reported as broken content
/// for that id only.
pub struct CompressingContentStorage<S> {
    inner: S,
}

impl<S: ContentStore> CompressingContentStorage<S> {
    pub fn new(inner: S) -> Self {
        CompressingContentStorage { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ContentStore> ContentStore for CompressingContentStorage<S> {
    fn store(&mut self, bytes: &[u8]) -> Result<i64> {
        let compressed = zstd::encode_all(bytes, zstd::DEFAULT_COMPRESSION_LEVEL)?;
        self.inner.store(&compressed)
    }

    fn load(&self, id: i64) -> Result<Vec<u8>> {
        let compressed = self.inner.load(id)?;
        zstd::decode_all(compressed.as_slice()).map_err(|_| Error::BrokenContent { id })
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        self.inner.remove(id)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContentStorage;

    fn storage() -> CompressingContentStorage<InMemoryContentStorage> {
        CompressingContentStorage::new(InMemoryContentStorage::new())
    }

    #[test]
    fn test_roundtrip() {
        let mut s = storage();
        let id = s.store(b"some file content").unwrap();
        assert_eq!(s.load(id).unwrap(), b"some file content");
    }

    #[test]
    fn test_roundtrip_empty() {
        let mut s = storage();
        let id = s.store(b"").unwrap();
        assert_eq!(s.load(id).unwrap(), b"");
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let mut s = storage();
        let original: &[u8] = b"public void foo(){} public void foo(){}";

        let id = s.store(original).unwrap();

        let stored = s.inner.load(id).unwrap();
        assert!(stored.len() < 43, "stored {} bytes", stored.len());
        assert_eq!(s.load(id).unwrap(), original);
    }

    #[test]
    fn test_undecompressable_bytes_are_broken_content() {
        let mut s = storage();
        let id = s.inner.store(b"not a zstd frame").unwrap();
        assert!(matches!(s.load(id), Err(Error::BrokenContent { .. })));
    }

    #[test]
    fn test_load_after_remove_fails() {
        let mut s = storage();
        let id = s.store(b"content").unwrap();
        s.remove(id).unwrap();
        assert!(s.load(id).is_err());
    }
}
