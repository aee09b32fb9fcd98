//! Replay of the effects a contract call returns.
//!
//! Messages run in order through the [`EffectHandler`] registered for
//! their kind. The first failure stops the replay and is returned as is.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use veil_types::{AccAddress, BankMsg, CosmosMsg, StakingMsg, WasmMsg};

use crate::context::Context;
use crate::keeper::Keeper;
use crate::{KeeperError, KeeperResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Bank,
    Staking,
    Wasm,
    Custom,
}

impl EffectKind {
    pub fn of(msg: &CosmosMsg) -> Self {
        match msg {
            CosmosMsg::Bank(_) => EffectKind::Bank,
            CosmosMsg::Staking(_) => EffectKind::Staking,
            CosmosMsg::Wasm(_) => EffectKind::Wasm,
            CosmosMsg::Custom(_) => EffectKind::Custom,
        }
    }
}

/// Handler for one kind of effect, emitted by `contract`
pub trait EffectHandler: Send + Sync {
    fn handle(&self, ctx: &Context, keeper: &Keeper, contract: &AccAddress, msg: &CosmosMsg) -> KeeperResult<()>;
}

impl<F> EffectHandler for F
where
    F: Fn(&Context, &Keeper, &AccAddress, &CosmosMsg) -> KeeperResult<()> + Send + Sync,
{
    fn handle(&self, ctx: &Context, keeper: &Keeper, contract: &AccAddress, msg: &CosmosMsg) -> KeeperResult<()> {
        self(ctx, keeper, contract, msg)
    }
}

#[derive(Clone, Default)]
pub struct EffectHandlers {
    handlers: HashMap<EffectKind, Arc<dyn EffectHandler>>,
}

impl EffectHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        Self::new()
            .with(EffectKind::Bank, BankHandler)
            .with(EffectKind::Staking, StakingHandler)
            .with(EffectKind::Wasm, WasmHandler)
            .with(EffectKind::Custom, RejectCustom)
    }

    pub fn with(mut self, kind: EffectKind, handler: impl EffectHandler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Handlers in `custom` replace those of the same kind
    pub fn merge(mut self, custom: EffectHandlers) -> Self {
        self.handlers.extend(custom.handlers);
        self
    }

    /// Replay `msgs` emitted by `contract`, in order
    pub fn dispatch(
        &self,
        ctx: &Context,
        keeper: &Keeper,
        contract: &AccAddress,
        msgs: Vec<CosmosMsg>,
    ) -> KeeperResult<()> {
        let total = msgs.len();
        for (index, msg) in msgs.iter().enumerate() {
            debug!(contract = %contract, index = index, total = total, kind = msg.type_name(), "Dispatching contract message");
            let handler = self.handlers.get(&EffectKind::of(msg)).ok_or_else(|| {
                KeeperError::InvalidRequest(format!("no handler for {} messages", msg.type_name()))
            })?;
            if let Err(e) = handler.handle(ctx, keeper, contract, msg) {
                warn!(contract = %contract, index = index, error = %e, "Contract message failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

fn wrong_kind(expected: &str, msg: &CosmosMsg) -> KeeperError {
    KeeperError::InvalidRequest(format!("{} handler cannot run {} message", expected, msg.type_name()))
}

/// Transfers out of the emitting contract's account
pub struct BankHandler;

impl EffectHandler for BankHandler {
    fn handle(&self, ctx: &Context, keeper: &Keeper, contract: &AccAddress, msg: &CosmosMsg) -> KeeperResult<()> {
        let CosmosMsg::Bank(BankMsg::Send {
            from_address,
            to_address,
            amount,
        }) = msg
        else {
            return Err(wrong_kind("bank", msg));
        };
        if from_address != contract {
            return Err(KeeperError::Unauthorized(format!(
                "contract {} cannot send from {}",
                contract, from_address
            )));
        }
        if amount.is_zero() {
            return Ok(());
        }
        keeper.ledger().bank.send_coins(ctx, from_address, to_address, amount)
    }
}

/// Staking with the emitting contract as delegator
pub struct StakingHandler;

impl EffectHandler for StakingHandler {
    fn handle(&self, ctx: &Context, keeper: &Keeper, contract: &AccAddress, msg: &CosmosMsg) -> KeeperResult<()> {
        let staking = &keeper.ledger().staking;
        match msg {
            CosmosMsg::Staking(StakingMsg::Delegate { validator, amount }) => {
                staking.delegate(ctx, contract, validator, amount)
            }
            CosmosMsg::Staking(StakingMsg::Undelegate { validator, amount }) => {
                staking.undelegate(ctx, contract, validator, amount)
            }
            CosmosMsg::Staking(StakingMsg::Redelegate {
                src_validator,
                dst_validator,
                amount,
            }) => staking.redelegate(ctx, contract, src_validator, dst_validator, amount),
            CosmosMsg::Staking(StakingMsg::Withdraw { validator, recipient }) => {
                let recipient = recipient.unwrap_or(*contract);
                staking
                    .withdraw_rewards(ctx, contract, validator, &recipient)
                    .map(|_| ())
            }
            other => Err(wrong_kind("staking", other)),
        }
    }
}

/// Sub-calls, authorized by the callback signature the enclave attached
pub struct WasmHandler;

impl EffectHandler for WasmHandler {
    fn handle(&self, ctx: &Context, keeper: &Keeper, contract: &AccAddress, msg: &CosmosMsg) -> KeeperResult<()> {
        match msg {
            CosmosMsg::Wasm(WasmMsg::Execute {
                contract_addr,
                msg,
                send,
                callback_sig,
            }) => keeper
                .execute(ctx, contract_addr, contract, msg.as_slice(), send, callback_sig.as_ref())
                .map(|_| ()),
            CosmosMsg::Wasm(WasmMsg::Instantiate {
                code_id,
                msg,
                send,
                label,
                callback_sig,
            }) => keeper
                .instantiate(
                    ctx,
                    *code_id,
                    contract,
                    None,
                    msg.as_slice(),
                    label,
                    send,
                    callback_sig.as_ref(),
                )
                .map(|_| ()),
            other => Err(wrong_kind("wasm", other)),
        }
    }
}

pub struct RejectCustom;

impl EffectHandler for RejectCustom {
    fn handle(&self, _ctx: &Context, _keeper: &Keeper, _contract: &AccAddress, _msg: &CosmosMsg) -> KeeperResult<()> {
        Err(KeeperError::InvalidRequest("custom messages are not supported".into()))
    }
}
