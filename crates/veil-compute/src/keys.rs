//! Store layout of the compute keeper.
//!
//! ```text
//! compute/ 0x01 ‖ be(code_id)        → CodeInfo
//! compute/ 0x02 ‖ address            → ContractInfo
//! compute/ 0x03 ‖ address ‖ key      → contract state (sealed)
//! compute/ 0x04 ‖ "lastCodeId"       → be(u64)
//! compute/ 0x04 ‖ "lastContractId"   → be(u64)
//! compute/ 0x06 ‖ address            → enclave contract key
//! compute/ 0x07 ‖ label              → address
//! ```

use veil_types::AccAddress;

/// Namespace of the keeper inside the ledger store
pub const STORE_KEY: &[u8] = b"compute/";

pub const CODE_KEY_PREFIX: u8 = 0x01;
pub const CONTRACT_KEY_PREFIX: u8 = 0x02;
pub const CONTRACT_STORE_PREFIX: u8 = 0x03;
pub const SEQUENCE_KEY_PREFIX: u8 = 0x04;
pub const CONTRACT_ENCLAVE_KEY_PREFIX: u8 = 0x06;
pub const CONTRACT_LABEL_PREFIX: u8 = 0x07;

pub const KEY_LAST_CODE_ID: &str = "lastCodeId";
pub const KEY_LAST_INSTANCE_ID: &str = "lastContractId";

fn prefixed(prefix: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + suffix.len());
    key.push(prefix);
    key.extend_from_slice(suffix);
    key
}

pub fn code_key(code_id: u64) -> Vec<u8> {
    prefixed(CODE_KEY_PREFIX, &code_id.to_be_bytes())
}

pub fn contract_info_key(addr: &AccAddress) -> Vec<u8> {
    prefixed(CONTRACT_KEY_PREFIX, addr.as_bytes())
}

pub fn contract_store_prefix(addr: &AccAddress) -> Vec<u8> {
    prefixed(CONTRACT_STORE_PREFIX, addr.as_bytes())
}

pub fn sequence_key(name: &str) -> Vec<u8> {
    prefixed(SEQUENCE_KEY_PREFIX, name.as_bytes())
}

pub fn contract_enclave_key(addr: &AccAddress) -> Vec<u8> {
    prefixed(CONTRACT_ENCLAVE_KEY_PREFIX, addr.as_bytes())
}

pub fn contract_label_key(label: &str) -> Vec<u8> {
    prefixed(CONTRACT_LABEL_PREFIX, label.as_bytes())
}
