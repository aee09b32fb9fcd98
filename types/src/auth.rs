//! Signed transactions and the verification bundle handed to the enclave.
//!
//! The ledger authenticates a transaction by having each signer sign a
//! canonical [`StdSignDoc`]. The compute keeper rebuilds that document for
//! the current signer so the enclave can check the signature itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AccAddress, Binary, Coins, TxMsg, TypesError, TypesResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Coins,
    pub gas: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    /// Raw ed25519 public key
    pub pub_key: Binary,
    pub signature: Binary,
}

/// A decoded ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdTx {
    pub msgs: Vec<TxMsg>,
    pub fee: StdFee,
    #[serde(default)]
    pub signatures: Vec<StdSignature>,
    #[serde(default)]
    pub memo: String,
}

impl StdTx {
    pub fn new(msgs: Vec<TxMsg>, fee: StdFee, memo: impl Into<String>) -> Self {
        Self {
            msgs,
            fee,
            signatures: Vec::new(),
            memo: memo.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> TypesResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn to_bytes(&self) -> TypesResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    /// Distinct signers in order of first appearance
    pub fn signers(&self) -> Vec<AccAddress> {
        let mut out: Vec<AccAddress> = Vec::new();
        for msg in &self.msgs {
            let signer = msg.signer();
            if !out.contains(&signer) {
                out.push(signer);
            }
        }
        out
    }

    /// The signature whose public key equals `pub_key`
    pub fn signature_for(&self, pub_key: &[u8]) -> Option<&StdSignature> {
        self.signatures
            .iter()
            .find(|sig| sig.pub_key.as_slice() == pub_key)
    }
}

/// The document each signer signs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub account_number: u64,
    pub chain_id: String,
    pub fee: StdFee,
    pub memo: String,
    pub msgs: Vec<TxMsg>,
    pub sequence: u64,
}

impl StdSignDoc {
    pub fn new(chain_id: &str, account_number: u64, sequence: u64, tx: &StdTx) -> Self {
        Self {
            account_number,
            chain_id: chain_id.to_string(),
            fee: tx.fee.clone(),
            memo: tx.memo.clone(),
            msgs: tx.msgs.clone(),
            sequence,
        }
    }

    /// Canonical JSON with every object's keys sorted.
    ///
    /// Going through [`Value`] sorts nested keys, since serde_json's `Map`
    /// is ordered as long as `preserve_order` stays off.
    pub fn bytes(&self) -> TypesResult<Vec<u8>> {
        let value = serde_json::to_value(self).map_err(|e| TypesError::Encoding(e.to_string()))?;
        serde_json::to_vec(&value).map_err(|e| TypesError::Encoding(e.to_string()))
    }
}

/// Proof of authorization for one enclave call.
///
/// Exactly one path is populated: `sign_bytes` + `signature` for a call
/// coming straight from a signed transaction, or `callback_sig` for a call
/// emitted by another contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationInfo {
    pub sign_bytes: Binary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<StdSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_sig: Option<Binary>,
}

impl VerificationInfo {
    pub fn from_signature(sign_bytes: Vec<u8>, signature: StdSignature) -> Self {
        Self {
            sign_bytes: Binary(sign_bytes),
            signature: Some(signature),
            callback_sig: None,
        }
    }

    pub fn from_callback(callback_sig: Vec<u8>) -> Self {
        Self {
            sign_bytes: Binary::default(),
            signature: None,
            callback_sig: Some(Binary(callback_sig)),
        }
    }

    pub fn is_callback(&self) -> bool {
        self.callback_sig.is_some()
    }
}
