//! Contract address derivation

use integer_encoding::VarInt;
use veil_types::{AccAddress, ADDRESS_LENGTH};

/// Tag byte distinguishing contract addresses from key-derived ones
const CONTRACT_ADDRESS_TAG: u8 = b'C';

/// Address of the `instance_id`-th contract, of code `code_id`.
///
/// Hash of the tag byte followed by `varint(code_id << 32 + instance_id)`
/// in a zero-padded 20-byte buffer. Distinct pairs give distinct addresses
/// while both counters stay below 2^32.
pub fn contract_address(code_id: u64, instance_id: u64) -> AccAddress {
    let content_id = (code_id << 32).wrapping_add(instance_id);
    let mut buf = [0u8; ADDRESS_LENGTH];
    buf[0] = CONTRACT_ADDRESS_TAG;
    content_id.encode_var(&mut buf[1..]);
    AccAddress::hash(&buf)
}
