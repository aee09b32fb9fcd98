//! Write-back overlay.
//!
//! Writes land in an in-memory overlay and reach the parent only on
//! [`CacheStore::write`]. Dropping the cache (or calling `discard`) throws
//! them away, which is how a failed call chain is rolled back.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::kv::{in_range, KvPair, KvStore};
use crate::StorageResult;

pub struct CacheStore {
    parent: Arc<dyn KvStore>,
    /// `None` marks a deletion
    writes: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl CacheStore {
    pub fn new(parent: Arc<dyn KvStore>) -> Self {
        Self {
            parent,
            writes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.writes.read().is_empty()
    }

    /// Flush buffered writes to the parent
    pub fn write(&self) -> StorageResult<()> {
        let writes = std::mem::take(&mut *self.writes.write());
        debug!(entries = writes.len(), "Flushing cache store");
        for (key, value) in writes {
            match value {
                Some(v) => self.parent.set(&key, &v)?,
                None => self.parent.delete(&key)?,
            }
        }
        Ok(())
    }

    pub fn discard(&self) {
        self.writes.write().clear();
    }

    /// Parent range merged with the overlay
    fn merged(&self, start: &[u8], end: Option<&[u8]>) -> StorageResult<Vec<KvPair>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.range(start, end)?.into_iter().collect();
        for (key, value) in self.writes.read().iter() {
            if !in_range(key, start, end) {
                continue;
            }
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl KvStore for CacheStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if let Some(entry) = self.writes.read().get(key) {
            return Ok(entry.clone());
        }
        self.parent.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.writes.write().insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.writes.write().insert(key.to_vec(), None);
        Ok(())
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()> {
        for (k, v) in self.merged(start, end)? {
            if !f(&k, &v) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_writes_are_buffered_until_flush() {
        let parent: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        parent.set(b"old", b"1").unwrap();

        let cache = CacheStore::new(parent.clone());
        cache.set(b"new", b"2").unwrap();
        cache.delete(b"old").unwrap();

        assert_eq!(cache.get(b"new").unwrap(), Some(b"2".to_vec()));
        assert_eq!(cache.get(b"old").unwrap(), None);
        assert_eq!(parent.get(b"new").unwrap(), None);
        assert_eq!(parent.get(b"old").unwrap(), Some(b"1".to_vec()));

        cache.write().unwrap();
        assert!(!cache.is_dirty());
        assert_eq!(parent.get(b"new").unwrap(), Some(b"2".to_vec()));
        assert_eq!(parent.get(b"old").unwrap(), None);
    }

    #[test]
    fn test_discard_drops_writes() {
        let parent: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cache = CacheStore::new(parent.clone());
        cache.set(b"k", b"v").unwrap();
        cache.discard();
        cache.write().unwrap();
        assert!(parent.get(b"k").unwrap().is_none());
    }

    #[test]
    fn test_iteration_merges_overlay() {
        let parent: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        parent.set(b"a", b"1").unwrap();
        parent.set(b"b", b"2").unwrap();

        let cache = CacheStore::new(parent);
        cache.delete(b"a").unwrap();
        cache.set(b"c", b"3").unwrap();
        cache.set(b"b", b"20").unwrap();

        let all = cache.range(&[], None).unwrap();
        assert_eq!(
            all,
            vec![(b"b".to_vec(), b"20".to_vec()), (b"c".to_vec(), b"3".to_vec())]
        );
    }

    #[test]
    fn test_nested_caches() {
        let parent: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let outer = Arc::new(CacheStore::new(parent.clone()));
        let inner = CacheStore::new(outer.clone());
        inner.set(b"k", b"v").unwrap();
        inner.write().unwrap();
        assert_eq!(outer.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(parent.get(b"k").unwrap().is_none());
    }
}
