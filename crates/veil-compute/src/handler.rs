//! Ledger message routing.
//!
//! [`handle_msg`] runs one message against the keeper; [`deliver_tx`] runs
//! a whole transaction on a branched context and commits it only if every
//! message succeeded, so a failing sub-call anywhere in a call chain rolls
//! back the entire chain.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use veil_types::{Binary, Event, StdTx, TxMsg};

use crate::context::Context;
use crate::keeper::Keeper;
use crate::{KeeperError, KeeperResult};

pub const MODULE_NAME: &str = "compute";

/// Outcome of one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgResponse {
    pub data: Option<Binary>,
    /// Everything emitted while the message ran
    pub events: Vec<Event>,
}

pub fn handle_msg(keeper: &Keeper, ctx: &Context, msg: &TxMsg) -> KeeperResult<MsgResponse> {
    msg.validate_basic()
        .map_err(|e| KeeperError::InvalidRequest(e.to_string()))?;

    let first_event = ctx.events().len();
    let mut message = Event::new("message")
        .add_attribute("module", MODULE_NAME)
        .add_attribute("action", msg.route())
        .add_attribute("signer", msg.signer().to_string());

    let data = match msg {
        TxMsg::StoreCode(m) => {
            let code_id = keeper.create(
                ctx,
                &m.sender,
                m.wasm_byte_code.as_slice(),
                &m.source,
                &m.builder,
            )?;
            message = message.add_attribute("code_id", code_id.to_string());
            Some(Binary(code_id.to_string().into_bytes()))
        }
        TxMsg::InstantiateContract(m) => {
            let contract = keeper.instantiate(
                ctx,
                m.code_id,
                &m.sender,
                m.admin,
                m.init_msg.as_slice(),
                &m.label,
                &m.init_funds,
                m.callback_sig.as_ref(),
            )?;
            message = message
                .add_attribute("code_id", m.code_id.to_string())
                .add_attribute("contract_address", contract.to_string());
            Some(Binary(contract.to_vec()))
        }
        TxMsg::ExecuteContract(m) => {
            let data = keeper.execute(
                ctx,
                &m.contract,
                &m.sender,
                m.msg.as_slice(),
                &m.sent_funds,
                m.callback_sig.as_ref(),
            )?;
            message = message.add_attribute("contract_address", m.contract.to_string());
            data
        }
        TxMsg::MigrateContract(m) => {
            let data = keeper.migrate(ctx, &m.contract, &m.sender, m.code_id, m.msg.as_slice())?;
            message = message
                .add_attribute("code_id", m.code_id.to_string())
                .add_attribute("contract_address", m.contract.to_string());
            data
        }
        TxMsg::UpdateAdmin(m) => {
            keeper.update_contract_admin(ctx, &m.contract, &m.sender, Some(m.new_admin))?;
            message = message.add_attribute("contract_address", m.contract.to_string());
            None
        }
        TxMsg::ClearAdmin(m) => {
            keeper.update_contract_admin(ctx, &m.contract, &m.sender, None)?;
            message = message.add_attribute("contract_address", m.contract.to_string());
            None
        }
    };

    ctx.events().emit(message);
    Ok(MsgResponse {
        data,
        events: ctx.events().events_since(first_event),
    })
}

/// Decode the context's transaction and run all of its messages atomically
pub fn deliver_tx(keeper: &Keeper, ctx: &Context) -> KeeperResult<Vec<MsgResponse>> {
    let tx = StdTx::from_bytes(ctx.tx_bytes()).map_err(|e| KeeperError::Codec(e.to_string()))?;
    info!(
        msgs = tx.msgs.len(),
        height = ctx.block_height(),
        "Delivering transaction"
    );

    let branch = ctx.cache_context();
    let mut responses = Vec::with_capacity(tx.msgs.len());
    for (index, msg) in tx.msgs.iter().enumerate() {
        match handle_msg(keeper, branch.context(), msg) {
            Ok(response) => responses.push(response),
            Err(e) => {
                warn!(index = index, route = msg.route(), error = %e, "Transaction failed, discarding writes");
                return Err(e);
            }
        }
    }
    branch.commit()?;

    info!(msgs = responses.len(), gas_used = ctx.gas_meter().consumed(), "Transaction committed");
    Ok(responses)
}
