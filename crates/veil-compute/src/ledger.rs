//! Ledger modules the keeper depends on.
//!
//! The keeper moves funds, resolves signer accounts and answers native
//! queries through these traits; the embedding ledger supplies them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use veil_types::{AccAddress, Binary, Coin, Coins, Delegation, Validator};

use crate::context::Context;
use crate::KeeperResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: AccAddress,
    /// Unset until the account first signs a transaction
    pub pub_key: Option<Binary>,
    pub account_number: u64,
    /// Replay counter, incremented once per signed transaction
    pub sequence: u64,
}

pub trait AccountKeeper: Send + Sync {
    fn get_account(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<Option<BaseAccount>>;

    /// A fresh account with the next account number. Not persisted until
    /// passed to `set_account`.
    fn new_account_with_address(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<BaseAccount>;

    fn set_account(&self, ctx: &Context, account: BaseAccount) -> KeeperResult<()>;
}

pub trait BankKeeper: Send + Sync {
    /// Fails with `InsufficientFunds` when `from` cannot cover `amount`.
    /// Creates the recipient account if needed.
    fn send_coins(&self, ctx: &Context, from: &AccAddress, to: &AccAddress, amount: &Coins) -> KeeperResult<()>;

    fn balance(&self, ctx: &Context, addr: &AccAddress, denom: &str) -> KeeperResult<Coin>;

    fn all_balances(&self, ctx: &Context, addr: &AccAddress) -> KeeperResult<Coins>;
}

pub trait StakingKeeper: Send + Sync {
    fn bonded_denom(&self, ctx: &Context) -> KeeperResult<String>;

    fn validators(&self, ctx: &Context) -> KeeperResult<Vec<Validator>>;

    fn delegation(&self, ctx: &Context, delegator: &AccAddress, validator: &str) -> KeeperResult<Option<Delegation>>;

    fn delegate(&self, ctx: &Context, delegator: &AccAddress, validator: &str, amount: &Coin) -> KeeperResult<()>;

    fn undelegate(&self, ctx: &Context, delegator: &AccAddress, validator: &str, amount: &Coin) -> KeeperResult<()>;

    fn redelegate(
        &self,
        ctx: &Context,
        delegator: &AccAddress,
        src_validator: &str,
        dst_validator: &str,
        amount: &Coin,
    ) -> KeeperResult<()>;

    /// Pay out accrued rewards to `recipient`, returning the amount
    fn withdraw_rewards(
        &self,
        ctx: &Context,
        delegator: &AccAddress,
        validator: &str,
        recipient: &AccAddress,
    ) -> KeeperResult<Coins>;
}

pub trait MintKeeper: Send + Sync {
    /// Decimal string
    fn inflation(&self, ctx: &Context) -> KeeperResult<String>;

    fn annual_provisions(&self, ctx: &Context) -> KeeperResult<String>;
}

pub trait DistributionKeeper: Send + Sync {
    fn rewards(&self, ctx: &Context, delegator: &AccAddress) -> KeeperResult<Coins>;
}

/// Every ledger module the keeper talks to
#[derive(Clone)]
pub struct LedgerKeepers {
    pub accounts: Arc<dyn AccountKeeper>,
    pub bank: Arc<dyn BankKeeper>,
    pub staking: Arc<dyn StakingKeeper>,
    pub mint: Arc<dyn MintKeeper>,
    pub distribution: Arc<dyn DistributionKeeper>,
}
