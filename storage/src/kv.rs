//! The store contract shared by every backend and wrapper.

use crate::StorageResult;

pub type KvPair = (Vec<u8>, Vec<u8>);

/// Ordered byte-key → byte-value store.
///
/// Methods take `&self`; implementations use interior mutability so a store
/// can be shared as `Arc<dyn KvStore>` between the keeper and the enclave.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Visit entries with `start <= key < end` in ascending key order.
    /// `end = None` means unbounded. Iteration stops when `f` returns false.
    fn iterate(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()>;

    fn has(&self, key: &[u8]) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Collect `start <= key < end`
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> StorageResult<Vec<KvPair>> {
        let mut out = Vec::new();
        self.iterate(start, end, &mut |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            true
        })?;
        Ok(out)
    }

    /// Collect every entry whose key starts with `prefix`
    fn prefix_scan(&self, prefix: &[u8]) -> StorageResult<Vec<KvPair>> {
        let end = prefix_end(prefix);
        self.range(prefix, end.as_deref())
    }
}

/// Smallest key greater than every key starting with `prefix`.
/// None when no such key exists (empty or all-0xff prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// True when `key` falls inside `[start, end)`
pub(crate) fn in_range(key: &[u8], start: &[u8], end: Option<&[u8]>) -> bool {
    key >= start && end.map_or(true, |e| key < e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(&[]), None);
    }

    #[test]
    fn test_in_range() {
        assert!(in_range(b"b", b"a", Some(b"c")));
        assert!(in_range(b"a", b"a", Some(b"c")));
        assert!(!in_range(b"c", b"a", Some(b"c")));
        assert!(in_range(b"zzz", b"a", None));
    }
}
