//! Records persisted by the code and contract registries.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{AccAddress, Binary};

/// Length of a content hash produced by the enclave
pub const CODE_HASH_LENGTH: usize = 32;

/// Content hash of validated bytecode
pub type CodeHash = [u8; CODE_HASH_LENGTH];

/// Metadata of uploaded bytecode, keyed by code id. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInfo {
    #[serde(with = "hash_repr")]
    pub code_hash: CodeHash,
    pub creator: AccAddress,
    pub source: String,
    pub builder: String,
}

impl CodeInfo {
    pub fn new(
        code_hash: CodeHash,
        creator: AccAddress,
        source: impl Into<String>,
        builder: impl Into<String>,
    ) -> Self {
        Self {
            code_hash,
            creator,
            source: source.into(),
            builder: builder.into(),
        }
    }

    pub fn code_hash_hex(&self) -> String {
        hex::encode(self.code_hash)
    }
}

/// Where in the chain a contract was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreatedAt {
    pub block_height: u64,
    /// Block time, unix seconds
    pub block_time: u64,
}

/// Metadata of a contract instance, keyed by its address.
///
/// `admin` changes only through an admin update and `code_id` only through
/// a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub code_id: u64,
    pub creator: AccAddress,
    pub admin: Option<AccAddress>,
    pub init_msg: Binary,
    pub label: String,
    pub created: CreatedAt,
}

impl ContractInfo {
    pub fn new(
        code_id: u64,
        creator: AccAddress,
        admin: Option<AccAddress>,
        init_msg: Vec<u8>,
        label: impl Into<String>,
        created: CreatedAt,
    ) -> Self {
        Self {
            code_id,
            creator,
            admin,
            init_msg: Binary(init_msg),
            label: label.into(),
            created,
        }
    }

    pub fn update_code_id(&mut self, code_id: u64) {
        self.code_id = code_id;
    }
}

/// A raw contract state entry. The keeper never interprets either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub key: Binary,
    pub value: Binary,
}

impl Model {
    pub fn new(key: impl Into<Binary>, value: impl Into<Binary>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Hex in JSON, raw bytes in BCS
pub mod hash_repr {
    use super::*;

    pub fn serialize<S: Serializer>(hash: &CodeHash, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(hash))
        } else {
            hash.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CodeHash, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(de::Error::custom)?;
            if bytes.len() != CODE_HASH_LENGTH {
                return Err(de::Error::custom(format!(
                    "code hash must be {} bytes, got {}",
                    CODE_HASH_LENGTH,
                    bytes.len()
                )));
            }
            let mut arr = [0u8; CODE_HASH_LENGTH];
            arr.copy_from_slice(&bytes);
            Ok(arr)
        } else {
            CodeHash::deserialize(deserializer)
        }
    }
}
