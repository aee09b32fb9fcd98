//! The compute keeper.
//!
//! ```text
//!   ledger msg ──▶ Keeper ──▶ auth (verification bundle)
//!                    │   ──▶ gas  (sandbox ceiling)
//!                    ▼
//!              EnclaveRuntime ◀──▶ QueryHandler (plugins)
//!                    │
//!                    ▼ ContractResponse
//!              charge gas ▶ emit events ▶ EffectHandlers ▶ persist
//! ```
//!
//! Operations are split by concern: [`code`] for the code registry,
//! [`contract`] for instances and their calls, [`query`] for reads.

mod code;
mod contract;
mod query;

use std::sync::Arc;
use tracing::debug;
use veil_enclave::{EnclaveRuntime, Metered};
use veil_storage::{codec, KvStore, PrefixStore};
use veil_types::{AccAddress, BlockInfo, Coins, ContractEnv, Env, Event, LogAttribute, MessageInfo};

use crate::config::ComputeConfig;
use crate::context::Context;
use crate::dispatch::EffectHandlers;
use crate::gas;
use crate::keys;
use crate::ledger::LedgerKeepers;
use crate::query_plugins::QueryPlugins;
use crate::KeeperResult;

/// Event type of contract logs
pub const CONTRACT_EVENT_TYPE: &str = "wasm";
pub const ATTRIBUTE_CONTRACT_ADDRESS: &str = "contract_address";

pub struct Keeper {
    enclave: Arc<dyn EnclaveRuntime>,
    ledger: LedgerKeepers,
    query_plugins: QueryPlugins,
    effect_handlers: EffectHandlers,
    config: ComputeConfig,
}

impl Keeper {
    /// Keeper with the default query plugins and effect handlers
    pub fn new(enclave: Arc<dyn EnclaveRuntime>, ledger: LedgerKeepers, config: ComputeConfig) -> Self {
        Self {
            enclave,
            ledger,
            query_plugins: QueryPlugins::defaults(),
            effect_handlers: EffectHandlers::defaults(),
            config,
        }
    }

    /// Override default query plugins per query kind
    pub fn with_query_plugins(mut self, custom: QueryPlugins) -> Self {
        self.query_plugins = self.query_plugins.merge(custom);
        self
    }

    /// Override default effect handlers per message kind
    pub fn with_effect_handlers(mut self, custom: EffectHandlers) -> Self {
        self.effect_handlers = self.effect_handlers.merge(custom);
        self
    }

    pub fn config(&self) -> &ComputeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerKeepers {
        &self.ledger
    }

    pub fn enclave(&self) -> &Arc<dyn EnclaveRuntime> {
        &self.enclave
    }

    pub fn query_plugins(&self) -> &QueryPlugins {
        &self.query_plugins
    }

    /// The keeper's namespace in the ledger store
    pub(crate) fn store(&self, ctx: &Context) -> PrefixStore {
        PrefixStore::new(ctx.store().clone(), keys::STORE_KEY)
    }

    /// Storage namespace of one contract, as handed to the enclave
    pub(crate) fn contract_store(&self, ctx: &Context, addr: &AccAddress) -> PrefixStore {
        PrefixStore::new(Arc::new(self.store(ctx)), keys::contract_store_prefix(addr))
    }

    /// Return the next value of counter `name` and advance it
    pub(crate) fn auto_increment_id(&self, ctx: &Context, name: &str) -> KeeperResult<u64> {
        let store = self.store(ctx);
        let key = keys::sequence_key(name);
        let id = match store.get(&key)? {
            Some(bytes) => codec::decode_u64(&bytes)?,
            None => 1,
        };
        store.set(&key, &(id + 1).to_be_bytes())?;
        Ok(id)
    }

    /// The value the next `auto_increment_id` call would return
    pub(crate) fn peek_auto_increment_id(&self, ctx: &Context, name: &str) -> KeeperResult<u64> {
        match self.store(ctx).get(&keys::sequence_key(name))? {
            Some(bytes) => Ok(codec::decode_u64(&bytes)?),
            None => Ok(1),
        }
    }

    pub(crate) fn set_auto_increment_id(&self, ctx: &Context, name: &str, value: u64) -> KeeperResult<()> {
        self.store(ctx)
            .set(&keys::sequence_key(name), &value.to_be_bytes())?;
        Ok(())
    }

    /// Environment for a call into `contract`
    pub(crate) fn env(
        &self,
        ctx: &Context,
        caller: &AccAddress,
        funds: &Coins,
        contract: &AccAddress,
        contract_key: Option<Vec<u8>>,
    ) -> Env {
        Env {
            block: BlockInfo {
                height: ctx.block_height(),
                time: ctx.block_time(),
                chain_id: ctx.chain_id().to_string(),
            },
            message: MessageInfo {
                sender: *caller,
                sent_funds: funds.clone(),
            },
            contract: ContractEnv { address: *contract },
            contract_key: contract_key.map(Into::into),
        }
    }

    /// Charge the ledger for a sandbox call, then surface its result.
    /// Gas is owed whether or not the call succeeded.
    pub(crate) fn consume_gas<T>(&self, ctx: &Context, metered: Metered<T>) -> KeeperResult<veil_enclave::EnclaveResult<T>> {
        let (result, gas_used) = metered.into_parts();
        debug!(
            sandbox_gas = gas_used,
            ledger_gas = gas::ledger_charge(gas_used),
            "Charging contract gas"
        );
        gas::charge_ledger(ctx.gas_meter(), gas_used)?;
        Ok(result)
    }
}

/// The event carrying a contract's log attributes
pub fn contract_event(contract: &AccAddress, log: &[LogAttribute]) -> Event {
    log.iter().fold(
        Event::new(CONTRACT_EVENT_TYPE).add_attribute(ATTRIBUTE_CONTRACT_ADDRESS, contract.to_string()),
        |event, attr| event.add_attribute(attr.key.clone(), attr.value.clone()),
    )
}
