//! Software stand-ins for the enclave's key management.
//!
//! Everything derives from one seed shared by every node of a network, so
//! two mock enclaves built with the same seed accept each other's contract
//! keys and callback signatures.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use veil_types::{AccAddress, Env, StdSignDoc, TxMsg, VerificationInfo};

use crate::{EnclaveError, EnclaveResult};

const ID_LEN: usize = 32;
const TAG_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Length of a contract key: sender id followed by auth id
pub const CONTRACT_KEY_LEN: usize = 2 * ID_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryPoint {
    Instantiate,
    Execute,
    Migrate,
}

pub(crate) struct Sealer {
    /// HMAC keyed with the seed, cloned for every digest
    mac: HmacSha256,
}

impl Sealer {
    pub fn new(seed: [u8; 32]) -> Self {
        // Zero-padded to the block size, as HMAC pads short keys
        let mut key = Key::<HmacSha256>::default();
        key[..seed.len()].copy_from_slice(&seed);
        Self {
            mac: <HmacSha256 as KeyInit>::new(&key),
        }
    }

    fn digest(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part);
        }
        mac.finalize().into_bytes().into()
    }

    /// Key binding a new contract to its address. Independent of the code
    /// hash, so it survives migration.
    pub fn contract_key(&self, sender: &AccAddress, contract: &AccAddress) -> Vec<u8> {
        let sender_id: [u8; 32] = Sha256::new()
            .chain_update(b"sender")
            .chain_update(sender.as_bytes())
            .finalize()
            .into();
        let auth_id = self.digest(&[&b"auth"[..], &sender_id[..], &contract.as_bytes()[..]]);
        let mut key = Vec::with_capacity(CONTRACT_KEY_LEN);
        key.extend_from_slice(&sender_id);
        key.extend_from_slice(&auth_id);
        key
    }

    pub fn authenticate(&self, key: &[u8], contract: &AccAddress) -> EnclaveResult<()> {
        if key.len() != CONTRACT_KEY_LEN {
            return Err(EnclaveError::FailedContractAuthentication);
        }
        let (sender_id, auth_id) = key.split_at(ID_LEN);
        let expected = self.digest(&[&b"auth"[..], sender_id, &contract.as_bytes()[..]]);
        if expected[..] != *auth_id {
            return Err(EnclaveError::FailedContractAuthentication);
        }
        Ok(())
    }

    /// Token authorizing `sender` to deliver `msg` as a sub-call
    pub fn callback_sig(&self, sender: &AccAddress, msg: &[u8]) -> Vec<u8> {
        self.digest(&[&b"callback"[..], &sender.as_bytes()[..], msg]).to_vec()
    }

    fn keystream(&self, key: &[u8], store_key: &[u8], len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        let mut block = 0u64;
        while out.len() < len {
            out.extend_from_slice(&self.digest(&[&b"stream"[..], key, store_key, &block.to_be_bytes()[..]]));
            block += 1;
        }
        out.truncate(len);
        out
    }

    fn tag(&self, key: &[u8], store_key: &[u8], ciphertext: &[u8]) -> [u8; TAG_LEN] {
        let full = self.digest(&[&b"mac"[..], key, store_key, ciphertext]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&full[..TAG_LEN]);
        tag
    }

    pub fn seal(&self, key: &[u8], store_key: &[u8], plain: &[u8]) -> Vec<u8> {
        let stream = self.keystream(key, store_key, plain.len());
        let mut sealed: Vec<u8> = plain.iter().zip(stream).map(|(p, s)| p ^ s).collect();
        let tag = self.tag(key, store_key, &sealed);
        sealed.extend_from_slice(&tag);
        sealed
    }

    pub fn unseal(&self, key: &[u8], store_key: &[u8], sealed: &[u8]) -> EnclaveResult<Vec<u8>> {
        if sealed.len() < TAG_LEN {
            return Err(EnclaveError::FailedUnseal);
        }
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        if self.tag(key, store_key, ciphertext)[..] != *tag {
            return Err(EnclaveError::FailedUnseal);
        }
        let stream = self.keystream(key, store_key, ciphertext.len());
        Ok(ciphertext.iter().zip(stream).map(|(c, s)| c ^ s).collect())
    }

    /// Check the verification bundle for a call into `entry`
    pub fn verify(
        &self,
        entry: EntryPoint,
        env: &Env,
        msg: &[u8],
        info: &VerificationInfo,
    ) -> EnclaveResult<()> {
        if let Some(callback_sig) = &info.callback_sig {
            if entry == EntryPoint::Migrate {
                return Err(EnclaveError::FailedTxVerification(
                    "migration requires a signed transaction".into(),
                ));
            }
            if callback_sig.as_slice() != self.callback_sig(&env.message.sender, msg).as_slice() {
                return Err(EnclaveError::FailedTxVerification(
                    "invalid callback signature".into(),
                ));
            }
            return Ok(());
        }

        let signature = info
            .signature
            .as_ref()
            .ok_or_else(|| EnclaveError::FailedTxVerification("no signature supplied".into()))?;
        let pub_key: [u8; 32] = signature
            .pub_key
            .as_slice()
            .try_into()
            .map_err(|_| EnclaveError::FailedTxVerification("malformed public key".into()))?;
        let verifying_key = VerifyingKey::from_bytes(&pub_key)
            .map_err(|e| EnclaveError::FailedTxVerification(e.to_string()))?;
        let sig = Signature::from_slice(signature.signature.as_slice())
            .map_err(|e| EnclaveError::FailedTxVerification(e.to_string()))?;
        verifying_key
            .verify(info.sign_bytes.as_slice(), &sig)
            .map_err(|_| EnclaveError::FailedTxVerification("signature does not match".into()))?;

        let signer = AccAddress::from_pubkey(&pub_key);
        if signer != env.message.sender {
            return Err(EnclaveError::FailedTxVerification(
                "signer is not the message sender".into(),
            ));
        }

        let doc: StdSignDoc = serde_json::from_slice(info.sign_bytes.as_slice())
            .map_err(|e| EnclaveError::FailedToDeserialize(e.to_string()))?;
        if !doc.msgs.iter().any(|m| signed_msg_matches(entry, m, env, msg)) {
            return Err(EnclaveError::FailedTxVerification(
                "message not found in signed document".into(),
            ));
        }
        Ok(())
    }
}

fn signed_msg_matches(entry: EntryPoint, signed: &TxMsg, env: &Env, msg: &[u8]) -> bool {
    let sender = &env.message.sender;
    match (entry, signed) {
        (EntryPoint::Instantiate, TxMsg::InstantiateContract(m)) => {
            m.sender == *sender
                && m.init_msg.as_slice() == msg
                && m.init_funds == env.message.sent_funds
        }
        (EntryPoint::Execute, TxMsg::ExecuteContract(m)) => {
            m.sender == *sender
                && m.contract == env.contract.address
                && m.msg.as_slice() == msg
                && m.sent_funds == env.message.sent_funds
        }
        (EntryPoint::Migrate, TxMsg::MigrateContract(m)) => {
            m.sender == *sender && m.contract == env.contract.address && m.msg.as_slice() == msg
        }
        _ => false,
    }
}
