//! Read-only view over another store.

use std::sync::Arc;

use crate::kv::KvStore;
use crate::{StorageError, StorageResult};

/// Wrapper that rejects every write. Handed to the enclave for queries.
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: Arc<dyn KvStore>,
}

impl ReadOnlyStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self { inner }
    }
}

impl KvStore for ReadOnlyStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn set(&self, _key: &[u8], _value: &[u8]) -> StorageResult<()> {
        Err(StorageError::ReadOnly)
    }

    fn delete(&self, _key: &[u8]) -> StorageResult<()> {
        Err(StorageError::ReadOnly)
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()> {
        self.inner.iterate(start, end, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_rejects_writes() {
        let inner: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        inner.set(b"k", b"v").unwrap();
        let ro = ReadOnlyStore::new(inner);
        assert_eq!(ro.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(matches!(ro.set(b"k", b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(ro.delete(b"k"), Err(StorageError::ReadOnly)));
        assert_eq!(ro.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
