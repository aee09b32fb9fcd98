//! RocksDB backend (feature `rocks`).
//!
//! The whole namespace lives in the default column family; the prefix byte
//! scheme in the keeper already separates record kinds.

use rocksdb::{DBCompressionType, Direction, IteratorMode, Options, DB};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::kv::KvStore;
use crate::StorageResult;

#[derive(Debug, Clone)]
pub struct RocksConfig {
    pub path: PathBuf,
    pub create_if_missing: bool,
    pub write_buffer_size: usize,
    pub max_write_buffer_number: i32,
    pub compression: bool,
}

impl RocksConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            create_if_missing: true,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
            compression: true,
        }
    }

    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    pub fn without_compression(mut self) -> Self {
        self.compression = false;
        self
    }

    fn options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(self.create_if_missing);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        if self.compression {
            opts.set_compression_type(DBCompressionType::Lz4);
        } else {
            opts.set_compression_type(DBCompressionType::None);
        }
        opts
    }
}

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(config: RocksConfig) -> StorageResult<Self> {
        let db = DB::open(&config.options(), &config.path)?;
        info!(path = %config.path.display(), "Opened RocksDB store");
        Ok(Self { db })
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        Ok(self.db.delete(key)?)
    }

    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()> {
        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (k, v) = item?;
            if end.map_or(false, |e| &*k >= e) {
                break;
            }
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

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RocksStore::open(RocksConfig::new(dir.path())).unwrap();
            store.set(b"a", b"1").unwrap();
            store.set(b"b", b"2").unwrap();
            store.delete(b"a").unwrap();
        }
        let store = RocksStore::open(RocksConfig::new(dir.path())).unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_range_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(RocksConfig::new(dir.path()).without_compression()).unwrap();
        for key in [&b"a"[..], &b"b"[..], &b"c"[..]] {
            store.set(key, key).unwrap();
        }
        let keys: Vec<Vec<u8>> = store
            .range(b"a", Some(b"c"))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
