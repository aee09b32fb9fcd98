//! Authenticity bundle for enclave calls.
//!
//! For a call straight from a transaction the keeper rebuilds the bytes the
//! signer signed and picks the signer's signature out of the transaction,
//! so the enclave can verify it without trusting this node. A call emitted
//! by another contract instead carries the callback signature the enclave
//! produced when it emitted the message; that is passed through untouched.

use tracing::debug;
use veil_types::{AccAddress, Binary, StdSignDoc, StdTx, VerificationInfo};

use crate::context::Context;
use crate::ledger::{AccountKeeper, BaseAccount};
use crate::{KeeperError, KeeperResult};

/// The bytes `account` signed for `tx`.
///
/// The ante handler has already bumped the sequence by the time a message
/// runs, so the signed sequence is one lower. Genesis transactions are
/// signed with account number 0.
pub fn sign_bytes(ctx: &Context, account: &BaseAccount, tx: &StdTx) -> KeeperResult<Vec<u8>> {
    let account_number = if ctx.block_height() == 0 {
        0
    } else {
        account.account_number
    };
    StdSignDoc::new(
        ctx.chain_id(),
        account_number,
        account.sequence.saturating_sub(1),
        tx,
    )
    .bytes()
    .map_err(|e| KeeperError::Codec(e.to_string()))
}

/// Signature-path bundle for `signer`, built from the context's transaction
pub fn signer_info(
    ctx: &Context,
    accounts: &dyn AccountKeeper,
    signer: &AccAddress,
) -> KeeperResult<VerificationInfo> {
    let tx = StdTx::from_bytes(ctx.tx_bytes()).map_err(|e| {
        KeeperError::instantiate_failed(format!("Unable to decode transaction from bytes: {}", e))
    })?;

    let account = accounts.get_account(ctx, signer)?.ok_or_else(|| {
        KeeperError::instantiate_failed(format!("Unable to retrieve account by address: {}", signer))
    })?;

    let signature = account
        .pub_key
        .as_ref()
        .and_then(|pk| tx.signature_for(pk.as_slice()))
        .cloned()
        .ok_or_else(|| {
            KeeperError::instantiate_failed(format!(
                "Message sender: {} is not found in the tx signer set, callback signature not provided",
                signer
            ))
        })?;

    let bytes = sign_bytes(ctx, &account, &tx)?;
    debug!(signer = %signer, sign_bytes = bytes.len(), "Built signature verification info");
    Ok(VerificationInfo::from_signature(bytes, signature))
}

/// Callback path when `callback_sig` is present, signature path otherwise
pub fn verification_info(
    ctx: &Context,
    accounts: &dyn AccountKeeper,
    signer: &AccAddress,
    callback_sig: Option<&Binary>,
) -> KeeperResult<VerificationInfo> {
    match callback_sig {
        Some(sig) => Ok(VerificationInfo::from_callback(sig.to_vec())),
        None => signer_info(ctx, accounts, signer),
    }
}
