//! BCS encoding for persisted records.

use serde::{de::DeserializeOwned, Serialize};

use crate::kv::KvStore;
use crate::{StorageError, StorageResult};

pub fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bcs::to_bytes(value).map_err(|e| StorageError::Codec(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bcs::from_bytes(bytes).map_err(|e| StorageError::Codec(e.to_string()))
}

pub fn get_record<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> StorageResult<Option<T>> {
    store.get(key)?.map(|bytes| decode(&bytes)).transpose()
}

pub fn put_record<T: Serialize>(store: &dyn KvStore, key: &[u8], value: &T) -> StorageResult<()> {
    store.set(key, &encode(value)?)
}

/// Counters are stored as 8 big-endian bytes
pub fn decode_u64(bytes: &[u8]) -> StorageResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Codec(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        name: String,
    }

    #[test]
    fn test_record_roundtrip_through_store() {
        let store = MemoryStore::new();
        let record = Record { id: 7, name: "seven".into() };
        put_record(&store, b"r", &record).unwrap();
        assert_eq!(get_record::<Record>(&store, b"r").unwrap(), Some(record));
        assert_eq!(get_record::<Record>(&store, b"missing").unwrap(), None);
    }

    #[test]
    fn test_corrupt_record_is_codec_error() {
        let store = MemoryStore::new();
        store.set(b"r", &[0xff]).unwrap();
        assert!(matches!(
            get_record::<Record>(&store, b"r"),
            Err(StorageError::Codec(_))
        ));
    }

    #[test]
    fn test_decode_u64() {
        assert_eq!(decode_u64(&5u64.to_be_bytes()).unwrap(), 5);
        assert!(decode_u64(&[1, 2, 3]).is_err());
    }
}
