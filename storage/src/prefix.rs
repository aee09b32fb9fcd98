//! Prefix-scoped sub-store.

use std::sync::Arc;

use crate::kv::{prefix_end, KvStore};
use crate::StorageResult;

/// View of `parent` restricted to keys starting with `prefix`.
/// Keys seen through the view have the prefix stripped.
#[derive(Clone)]
pub struct PrefixStore {
    parent: Arc<dyn KvStore>,
    prefix: Vec<u8>,
}

impl PrefixStore {
    pub fn new(parent: Arc<dyn KvStore>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            parent,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl std::fmt::Debug for PrefixStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixStore")
            .field("prefix", &hex::encode(&self.prefix))
            .finish()
    }
}

impl KvStore for PrefixStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.parent.get(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.parent.set(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.parent.delete(&self.full_key(key))
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()> {
        let full_start = self.full_key(start);
        let full_end = match end {
            Some(e) => Some(self.full_key(e)),
            None => prefix_end(&self.prefix),
        };
        let plen = self.prefix.len();
        self.parent
            .iterate(&full_start, full_end.as_deref(), &mut |k, v| f(&k[plen..], v))
    }
}
