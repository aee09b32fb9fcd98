//! Key-value namespace for the Veil compute keeper.
//!
//! Every component reads and writes through [`KvStore`], an ordered
//! byte-key → byte-value store with range iteration. Stores compose:
//!
//! ```text
//!   RocksStore / MemoryStore        (backend)
//!        ▲
//!   CacheStore                      (write-back overlay, commit or discard)
//!        ▲
//!   PrefixStore                     (namespace, e.g. one contract's state)
//!        ▲
//!   ReadOnlyStore                   (queries)
//! ```

pub mod cache;
pub mod codec;
pub mod error;
pub mod kv;
pub mod memory;
pub mod prefix;
pub mod readonly;

#[cfg(feature = "rocks")]
pub mod rocks;

pub use cache::CacheStore;
pub use error::{StorageError, StorageResult};
pub use kv::{prefix_end, KvPair, KvStore};
pub use memory::MemoryStore;
pub use prefix::PrefixStore;
pub use readonly::ReadOnlyStore;

#[cfg(feature = "rocks")]
pub use rocks::{RocksConfig, RocksStore};
