//! In-memory backend.
//!
//! A `BTreeMap` behind a `parking_lot::RwLock`. Suitable for tests and
//! single-node deployments without persistence.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::kv::{KvPair, KvStore};
use crate::StorageResult;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn snapshot(&self, start: &[u8], end: Option<&[u8]>) -> Vec<KvPair> {
        let data = self.data.read();
        let upper = match end {
            Some(e) => Bound::Excluded(e.to_vec()),
            None => Bound::Unbounded,
        };
        if let Some(e) = end {
            if e <= start {
                return Vec::new();
            }
        }
        data.range((Bound::Included(start.to_vec()), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()> {
        // The lock is released before calling back, so `f` may write to this store.
        for (k, v) in self.snapshot(start, end) {
            if !f(&k, &v) {
                break;
            }
        }
        Ok(())
    }
}
