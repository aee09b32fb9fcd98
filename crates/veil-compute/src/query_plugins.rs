//! Queries issued by running contracts.
//!
//! Each [`QueryKind`] is served by one [`QueryPlugin`]. The default set
//! covers bank, staking, mint, distribution and other contracts; custom
//! queries have no default handler. An application overrides or adds
//! handlers with [`QueryPlugins::merge`].

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use veil_enclave::Querier;
use veil_types::{
    BankQuery, DistQuery, MintQuery, QuerierError, QueryRequest, StakingQuery, WasmQuery,
};

use crate::context::Context;
use crate::keeper::Keeper;
use crate::{KeeperError, KeeperResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Bank,
    Staking,
    Mint,
    Dist,
    Wasm,
    Custom,
}

impl QueryKind {
    pub fn of(request: &QueryRequest) -> Self {
        match request {
            QueryRequest::Bank(_) => QueryKind::Bank,
            QueryRequest::Staking(_) => QueryKind::Staking,
            QueryRequest::Mint(_) => QueryKind::Mint,
            QueryRequest::Dist(_) => QueryKind::Dist,
            QueryRequest::Wasm(_) => QueryKind::Wasm,
            QueryRequest::Custom(_) => QueryKind::Custom,
        }
    }
}

/// Handler for one kind of query. Must not write ledger state.
pub trait QueryPlugin: Send + Sync {
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>>;
}

impl<F> QueryPlugin for F
where
    F: Fn(&Context, &Keeper, &QueryRequest) -> KeeperResult<Vec<u8>> + Send + Sync,
{
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>> {
        self(ctx, keeper, request)
    }
}

#[derive(Clone, Default)]
pub struct QueryPlugins {
    plugins: HashMap<QueryKind, Arc<dyn QueryPlugin>>,
}

impl QueryPlugins {
    /// An empty set, typically filled with `with` and merged over the defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        Self::new()
            .with(QueryKind::Bank, BankQuerier)
            .with(QueryKind::Staking, StakingQuerier)
            .with(QueryKind::Mint, MintQuerier)
            .with(QueryKind::Dist, DistQuerier)
            .with(QueryKind::Wasm, WasmQuerier)
    }

    pub fn with(mut self, kind: QueryKind, plugin: impl QueryPlugin + 'static) -> Self {
        self.plugins.insert(kind, Arc::new(plugin));
        self
    }

    /// Handlers in `custom` replace those of the same kind
    pub fn merge(mut self, custom: QueryPlugins) -> Self {
        self.plugins.extend(custom.plugins);
        self
    }

    pub fn get(&self, kind: QueryKind) -> Option<&Arc<dyn QueryPlugin>> {
        self.plugins.get(&kind)
    }

    pub fn contains(&self, kind: QueryKind) -> bool {
        self.plugins.contains_key(&kind)
    }
}

fn to_json<T: Serialize>(value: &T) -> KeeperResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| KeeperError::Codec(e.to_string()))
}

fn wrong_kind(expected: &str, request: &QueryRequest) -> KeeperError {
    KeeperError::InvalidRequest(format!(
        "{} plugin cannot serve {} query",
        expected,
        request.type_name()
    ))
}

pub struct BankQuerier;

impl QueryPlugin for BankQuerier {
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>> {
        let bank = &keeper.ledger().bank;
        match request {
            QueryRequest::Bank(BankQuery::Balance { address, denom }) => {
                to_json(&serde_json::json!({ "amount": bank.balance(ctx, address, denom)? }))
            }
            QueryRequest::Bank(BankQuery::AllBalances { address }) => {
                to_json(&serde_json::json!({ "amount": bank.all_balances(ctx, address)? }))
            }
            other => Err(wrong_kind("bank", other)),
        }
    }
}

pub struct StakingQuerier;

impl QueryPlugin for StakingQuerier {
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>> {
        let staking = &keeper.ledger().staking;
        match request {
            QueryRequest::Staking(StakingQuery::BondedDenom {}) => {
                to_json(&serde_json::json!({ "denom": staking.bonded_denom(ctx)? }))
            }
            QueryRequest::Staking(StakingQuery::Validators {}) => {
                to_json(&serde_json::json!({ "validators": staking.validators(ctx)? }))
            }
            QueryRequest::Staking(StakingQuery::Delegation { delegator, validator }) => to_json(
                &serde_json::json!({ "delegation": staking.delegation(ctx, delegator, validator)? }),
            ),
            other => Err(wrong_kind("staking", other)),
        }
    }
}

pub struct MintQuerier;

impl QueryPlugin for MintQuerier {
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>> {
        let mint = &keeper.ledger().mint;
        match request {
            QueryRequest::Mint(MintQuery::Inflation {}) => {
                to_json(&serde_json::json!({ "inflation": mint.inflation(ctx)? }))
            }
            QueryRequest::Mint(MintQuery::AnnualProvisions {}) => {
                to_json(&serde_json::json!({ "annual_provisions": mint.annual_provisions(ctx)? }))
            }
            other => Err(wrong_kind("mint", other)),
        }
    }
}

pub struct DistQuerier;

impl QueryPlugin for DistQuerier {
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>> {
        match request {
            QueryRequest::Dist(DistQuery::Rewards { delegator }) => to_json(
                &serde_json::json!({ "rewards": keeper.ledger().distribution.rewards(ctx, delegator)? }),
            ),
            other => Err(wrong_kind("dist", other)),
        }
    }
}

/// Queries into other contracts
pub struct WasmQuerier;

impl QueryPlugin for WasmQuerier {
    fn handle(&self, ctx: &Context, keeper: &Keeper, request: &QueryRequest) -> KeeperResult<Vec<u8>> {
        match request {
            QueryRequest::Wasm(WasmQuery::Smart { contract_addr, msg }) => {
                keeper.query_smart(ctx, contract_addr, msg.as_slice(), true)
            }
            QueryRequest::Wasm(WasmQuery::Raw { contract_addr, key }) => {
                let models = keeper.query_raw(ctx, contract_addr, Some(key.as_slice()))?;
                to_json(&models)
            }
            other => Err(wrong_kind("wasm", other)),
        }
    }
}

/// The [`Querier`] handed to the enclave for one call
pub struct QueryHandler<'a> {
    ctx: &'a Context,
    keeper: &'a Keeper,
}

impl<'a> QueryHandler<'a> {
    pub fn new(ctx: &'a Context, keeper: &'a Keeper) -> Self {
        Self { ctx, keeper }
    }
}

impl Querier for QueryHandler<'_> {
    fn query(&self, request: &QueryRequest) -> Result<Vec<u8>, QuerierError> {
        let kind = QueryKind::of(request);
        debug!(kind = request.type_name(), "Contract issued query");
        let plugin = self
            .keeper
            .query_plugins()
            .get(kind)
            .ok_or_else(|| QuerierError::UnsupportedRequest {
                kind: request.type_name().to_string(),
            })?;
        plugin
            .handle(self.ctx, self.keeper, request)
            .map_err(|e| querier_error(request, e))
    }
}

fn querier_error(request: &QueryRequest, err: KeeperError) -> QuerierError {
    match (request, err) {
        (QueryRequest::Wasm(WasmQuery::Smart { contract_addr, .. }), KeeperError::NotFound(_))
        | (QueryRequest::Wasm(WasmQuery::Raw { contract_addr, .. }), KeeperError::NotFound(_)) => {
            QuerierError::NoSuchContract {
                addr: contract_addr.to_string(),
            }
        }
        (_, KeeperError::InvalidRequest(reason)) => QuerierError::InvalidRequest(reason),
        (_, other) => QuerierError::Failed(other.to_string()),
    }
}
