//! Veil Compute - Confidential Contract Keeper
//!
//! State-transition layer for contracts whose state lives sealed inside an
//! enclave. The keeper:
//! - registers uploaded code and derives contract instances
//! - bridges ledger gas and sandbox gas
//! - proves to the enclave who authorized each call
//! - replays the effects a call returns, all-or-nothing per transaction
//!
//! The enclave itself sits behind [`veil_enclave::EnclaveRuntime`]; ledger
//! modules (accounts, bank, staking, ...) behind the traits in [`ledger`].

pub mod address;
pub mod auth;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gas;
pub mod genesis;
pub mod handler;
pub mod keeper;
pub mod keys;
pub mod ledger;
pub mod query_plugins;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use address::contract_address;
pub use config::ComputeConfig;
pub use context::{BlockHeader, CacheContext, Context, EventManager, GasMeter};
pub use dispatch::{EffectHandler, EffectHandlers, EffectKind};
pub use error::{KeeperError, KeeperResult};
pub use gas::{GAS_MULTIPLIER, MAX_GAS};
pub use genesis::{export_genesis, init_genesis, GenesisState};
pub use handler::{deliver_tx, handle_msg, MsgResponse};
pub use keeper::Keeper;
pub use ledger::{
    AccountKeeper, BankKeeper, BaseAccount, DistributionKeeper, LedgerKeepers, MintKeeper,
    StakingKeeper,
};
pub use query_plugins::{QueryHandler, QueryKind, QueryPlugin, QueryPlugins};
