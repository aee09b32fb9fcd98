//! Read-only access to contracts

use std::sync::Arc;
use tracing::{debug, warn};
use veil_enclave::QueryInput;
use veil_storage::{KvStore, ReadOnlyStore};
use veil_types::{AccAddress, Model};

use super::Keeper;
use crate::context::{Context, GasMeter};
use crate::gas;
use crate::query_plugins::QueryHandler;
use crate::{KeeperError, KeeperResult};

impl Keeper {
    /// Run a smart query against `contract`.
    ///
    /// With `use_default_gas_limit` the query runs on the caller's meter;
    /// otherwise on a fresh meter of `smart_query_gas_limit`. The enclave
    /// sees the contract key followed by `req` and a read-only view of the
    /// contract's state.
    pub fn query_smart(
        &self,
        ctx: &Context,
        contract: &AccAddress,
        req: &[u8],
        use_default_gas_limit: bool,
    ) -> KeeperResult<Vec<u8>> {
        let ctx = if use_default_gas_limit {
            ctx.clone()
        } else {
            ctx.with_gas_meter(GasMeter::new(self.config.smart_query_gas_limit))
        };
        debug!(contract = %contract, gas_limit = ctx.gas_meter().limit(), "Querying contract");

        let (_, code_info, store) = self.contract_instance(&ctx, contract)?;
        let contract_key = self
            .get_contract_key(&ctx, contract)?
            .ok_or_else(|| KeeperError::NotFound(format!("enclave key of contract {}", contract)))?;
        let mut msg = contract_key;
        msg.extend_from_slice(req);

        let store = ReadOnlyStore::new(Arc::new(store));
        let querier = QueryHandler::new(&ctx, self);
        let metered = self.enclave.query(QueryInput {
            code_hash: code_info.code_hash,
            msg: &msg,
            store: &store,
            querier: &querier,
            gas_limit: gas::sandbox_gas_ceiling(ctx.gas_meter()),
        });
        self.consume_gas(&ctx, metered)?.map_err(|e| {
            warn!(contract = %contract, error = %e, "Contract query failed");
            KeeperError::QueryFailed(e.to_string())
        })
    }

    /// Raw lookup in the state of `contract`. Values come back exactly as
    /// stored, sealed by the enclave if it sealed them.
    pub fn query_raw(&self, ctx: &Context, contract: &AccAddress, key: Option<&[u8]>) -> KeeperResult<Vec<Model>> {
        let Some(key) = key else {
            return Ok(Vec::new());
        };
        let store = self.contract_store(ctx, contract);
        Ok(store
            .get(key)?
            .map(|value| vec![Model::new(key, value)])
            .unwrap_or_default())
    }
}
