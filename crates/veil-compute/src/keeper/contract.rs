//! Contract registry and the calls that create or drive a contract

use std::sync::Arc;
use tracing::{info, warn};
use veil_enclave::CallInput;
use veil_storage::{codec, KvStore, PrefixStore};
use veil_types::{AccAddress, Binary, CodeInfo, Coins, ContractInfo, CreatedAt, Model};

use super::{contract_event, Keeper};
use crate::address::contract_address;
use crate::auth;
use crate::context::Context;
use crate::gas;
use crate::keys;
use crate::query_plugins::QueryHandler;
use crate::{KeeperError, KeeperResult};

impl Keeper {
    /// Create a contract instance of `code_id`.
    ///
    /// Registry records are written only after every effect of the
    /// instantiation has been dispatched; a failure at any step leaves no
    /// contract info, enclave key or label behind. A deposit already sent
    /// to the new address stays there.
    #[allow(clippy::too_many_arguments)]
    pub fn instantiate(
        &self,
        ctx: &Context,
        code_id: u64,
        creator: &AccAddress,
        admin: Option<AccAddress>,
        init_msg: &[u8],
        label: &str,
        deposit: &Coins,
        callback_sig: Option<&Binary>,
    ) -> KeeperResult<AccAddress> {
        info!(
            code_id = code_id,
            creator = %creator,
            label = %label,
            callback = callback_sig.is_some(),
            "Instantiating contract"
        );

        if label.len() > self.config.max_label_size {
            return Err(KeeperError::InvalidRequest(format!(
                "label exceeds {} bytes",
                self.config.max_label_size
            )));
        }
        if self.get_contract_address(ctx, label)?.is_some() {
            return Err(KeeperError::AccountExists(format!("label already exists: {}", label)));
        }
        let code_info = self
            .get_code_info(ctx, code_id)?
            .ok_or_else(|| KeeperError::NotFound(format!("code {}", code_id)))?;
        let verification =
            auth::verification_info(ctx, self.ledger.accounts.as_ref(), creator, callback_sig)?;

        let contract = self.generate_contract_address(ctx, code_id)?;
        let accounts = &self.ledger.accounts;
        if accounts.get_account(ctx, &contract)?.is_some() {
            return Err(KeeperError::AccountExists(contract.to_string()));
        }
        if !deposit.is_zero() {
            self.ledger.bank.send_coins(ctx, creator, &contract, deposit)?;
        } else {
            let account = accounts.new_account_with_address(ctx, &contract)?;
            accounts.set_account(ctx, account)?;
        }

        let store = self.contract_store(ctx, &contract);
        let querier = QueryHandler::new(ctx, self);
        let metered = self.enclave.instantiate(CallInput {
            code_hash: code_info.code_hash,
            env: self.env(ctx, creator, deposit, &contract, None),
            msg: init_msg,
            store: &store,
            querier: &querier,
            gas_limit: gas::sandbox_gas_ceiling(ctx.gas_meter()),
            verification: &verification,
        });
        let output = self.consume_gas(ctx, metered)?.map_err(|e| {
            warn!(contract = %contract, error = %e, "Contract instantiation failed");
            KeeperError::InstantiateFailed {
                reason: e.to_string(),
                contract: Some(contract),
            }
        })?;

        ctx.events().emit(contract_event(&contract, &output.response.log));
        self.effect_handlers
            .dispatch(ctx, self, &contract, output.response.messages)?;
        // A sub-instantiation may have claimed the label during dispatch
        if self.get_contract_address(ctx, label)?.is_some() {
            return Err(KeeperError::AccountExists(format!("label already exists: {}", label)));
        }

        let created = CreatedAt {
            block_height: ctx.block_height(),
            block_time: ctx.block_time(),
        };
        let info = ContractInfo::new(code_id, *creator, admin, init_msg.to_vec(), label, created);
        self.set_contract_info(ctx, &contract, &info)?;
        let keeper_store = self.store(ctx);
        keeper_store.set(&keys::contract_enclave_key(&contract), &output.contract_key)?;
        keeper_store.set(&keys::contract_label_key(label), contract.as_bytes())?;

        info!(contract = %contract, code_id = code_id, label = %label, "Contract instantiated");
        Ok(contract)
    }

    /// Call `contract` on behalf of `caller`, returning the response data.
    ///
    /// State the contract wrote during the call is not undone if one of its
    /// effects fails to dispatch; the enclosing transaction decides that.
    pub fn execute(
        &self,
        ctx: &Context,
        contract: &AccAddress,
        caller: &AccAddress,
        msg: &[u8],
        coins: &Coins,
        callback_sig: Option<&Binary>,
    ) -> KeeperResult<Option<Binary>> {
        info!(
            contract = %contract,
            caller = %caller,
            callback = callback_sig.is_some(),
            "Executing contract"
        );

        let (_, code_info, store) = self.contract_instance(ctx, contract)?;
        let verification =
            auth::verification_info(ctx, self.ledger.accounts.as_ref(), caller, callback_sig)?;
        let contract_key = self
            .get_contract_key(ctx, contract)?
            .ok_or_else(|| KeeperError::NotFound(format!("enclave key of contract {}", contract)))?;

        if !coins.is_zero() {
            self.ledger.bank.send_coins(ctx, caller, contract, coins)?;
        }

        let querier = QueryHandler::new(ctx, self);
        let metered = self.enclave.execute(CallInput {
            code_hash: code_info.code_hash,
            env: self.env(ctx, caller, coins, contract, Some(contract_key)),
            msg,
            store: &store,
            querier: &querier,
            gas_limit: gas::sandbox_gas_ceiling(ctx.gas_meter()),
            verification: &verification,
        });
        let response = self.consume_gas(ctx, metered)?.map_err(|e| {
            warn!(contract = %contract, error = %e, "Contract execution failed");
            KeeperError::ExecuteFailed(e.to_string())
        })?;

        ctx.events().emit(contract_event(contract, &response.log));
        self.effect_handlers
            .dispatch(ctx, self, contract, response.messages)?;

        info!(contract = %contract, "Contract executed");
        Ok(response.data)
    }

    /// Move `contract` to `new_code_id`. Admin only, and only from a
    /// signed transaction.
    pub fn migrate(
        &self,
        ctx: &Context,
        contract: &AccAddress,
        caller: &AccAddress,
        new_code_id: u64,
        msg: &[u8],
    ) -> KeeperResult<Option<Binary>> {
        info!(
            contract = %contract,
            caller = %caller,
            new_code_id = new_code_id,
            "Migrating contract"
        );

        let mut contract_info = self.admin_gated(ctx, contract, caller)?;
        let new_code_info = self
            .get_code_info(ctx, new_code_id)?
            .ok_or_else(|| KeeperError::InvalidRequest("unknown code".into()))?;
        let verification = auth::signer_info(ctx, self.ledger.accounts.as_ref(), caller)?;
        let contract_key = self
            .get_contract_key(ctx, contract)?
            .ok_or_else(|| KeeperError::NotFound(format!("enclave key of contract {}", contract)))?;

        let store = self.contract_store(ctx, contract);
        let querier = QueryHandler::new(ctx, self);
        let metered = self.enclave.migrate(CallInput {
            code_hash: new_code_info.code_hash,
            env: self.env(ctx, caller, &Coins::new(), contract, Some(contract_key)),
            msg,
            store: &store,
            querier: &querier,
            gas_limit: gas::sandbox_gas_ceiling(ctx.gas_meter()),
            verification: &verification,
        });
        let response = self.consume_gas(ctx, metered)?.map_err(|e| {
            warn!(contract = %contract, error = %e, "Contract migration failed");
            KeeperError::MigrationFailed(e.to_string())
        })?;

        ctx.events().emit(contract_event(contract, &response.log));

        let old_code_id = contract_info.code_id;
        contract_info.update_code_id(new_code_id);
        self.set_contract_info(ctx, contract, &contract_info)?;

        self.effect_handlers
            .dispatch(ctx, self, contract, response.messages)
            .map_err(|e| KeeperError::Dispatch(Box::new(e)))?;

        info!(
            contract = %contract,
            old_code_id = old_code_id,
            new_code_id = new_code_id,
            "Contract migrated"
        );
        Ok(response.data)
    }

    /// Replace the admin of `contract`. `None` clears it for good.
    pub fn update_contract_admin(
        &self,
        ctx: &Context,
        contract: &AccAddress,
        caller: &AccAddress,
        new_admin: Option<AccAddress>,
    ) -> KeeperResult<()> {
        let mut contract_info = self.admin_gated(ctx, contract, caller)?;
        contract_info.admin = new_admin;
        self.set_contract_info(ctx, contract, &contract_info)?;
        match new_admin {
            Some(admin) => info!(contract = %contract, admin = %admin, "Contract admin updated"),
            None => info!(contract = %contract, "Contract admin cleared"),
        }
        Ok(())
    }

    /// Contract info of `contract`, provided `caller` is its admin
    fn admin_gated(&self, ctx: &Context, contract: &AccAddress, caller: &AccAddress) -> KeeperResult<ContractInfo> {
        let contract_info = self
            .get_contract_info(ctx, contract)?
            .ok_or_else(|| KeeperError::InvalidRequest("unknown contract".into()))?;
        match contract_info.admin {
            None => Err(KeeperError::Unauthorized(
                "migration not supported by this contract".into(),
            )),
            Some(admin) if admin != *caller => Err(KeeperError::Unauthorized("no permission".into())),
            Some(_) => Ok(contract_info),
        }
    }

    /// Next contract address for `code_id`. Advances the instance counter.
    pub fn generate_contract_address(&self, ctx: &Context, code_id: u64) -> KeeperResult<AccAddress> {
        let instance_id = self.auto_increment_id(ctx, keys::KEY_LAST_INSTANCE_ID)?;
        Ok(contract_address(code_id, instance_id))
    }

    pub fn get_contract_info(&self, ctx: &Context, contract: &AccAddress) -> KeeperResult<Option<ContractInfo>> {
        Ok(codec::get_record(&self.store(ctx), &keys::contract_info_key(contract))?)
    }

    pub(crate) fn set_contract_info(
        &self,
        ctx: &Context,
        contract: &AccAddress,
        info: &ContractInfo,
    ) -> KeeperResult<()> {
        Ok(codec::put_record(&self.store(ctx), &keys::contract_info_key(contract), info)?)
    }

    /// Opaque enclave key of `contract`
    pub fn get_contract_key(&self, ctx: &Context, contract: &AccAddress) -> KeeperResult<Option<Vec<u8>>> {
        Ok(self.store(ctx).get(&keys::contract_enclave_key(contract))?)
    }

    /// Address bound to `label`
    pub fn get_contract_address(&self, ctx: &Context, label: &str) -> KeeperResult<Option<AccAddress>> {
        match self.store(ctx).get(&keys::contract_label_key(label))? {
            Some(bytes) => AccAddress::from_slice(&bytes)
                .map(Some)
                .map_err(|e| KeeperError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    /// Code hash `contract` currently runs
    pub fn get_contract_hash(&self, ctx: &Context, contract: &AccAddress) -> KeeperResult<Option<String>> {
        let Some(info) = self.get_contract_info(ctx, contract)? else {
            return Ok(None);
        };
        Ok(self
            .get_code_info(ctx, info.code_id)?
            .map(|code| code.code_hash_hex()))
    }

    /// Visit every contract in address order until `f` returns true
    pub fn list_contract_info<F>(&self, ctx: &Context, mut f: F) -> KeeperResult<()>
    where
        F: FnMut(AccAddress, ContractInfo) -> bool,
    {
        let contracts = PrefixStore::new(Arc::new(self.store(ctx)), vec![keys::CONTRACT_KEY_PREFIX]);
        let mut failure: Option<KeeperError> = None;
        contracts.iterate(&[], None, &mut |key, value| {
            let decoded = AccAddress::from_slice(key)
                .map_err(|e| KeeperError::Codec(e.to_string()))
                .and_then(|addr| Ok((addr, codec::decode::<ContractInfo>(value)?)));
            match decoded {
                Ok((addr, info)) => !f(addr, info),
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        })?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Every raw state entry of `contract`, in key order
    pub fn get_contract_state(&self, ctx: &Context, contract: &AccAddress) -> KeeperResult<Vec<Model>> {
        Ok(self
            .contract_store(ctx, contract)
            .prefix_scan(&[])?
            .into_iter()
            .map(|(key, value)| Model::new(key, value))
            .collect())
    }

    /// Write raw state entries, bypassing the enclave
    pub fn set_contract_state(&self, ctx: &Context, contract: &AccAddress, models: &[Model]) -> KeeperResult<()> {
        let store = self.contract_store(ctx, contract);
        for model in models {
            store.set(model.key.as_slice(), model.value.as_slice())?;
        }
        Ok(())
    }

    /// Info, code and storage of a live contract
    pub(crate) fn contract_instance(
        &self,
        ctx: &Context,
        contract: &AccAddress,
    ) -> KeeperResult<(ContractInfo, CodeInfo, PrefixStore)> {
        let info = self
            .get_contract_info(ctx, contract)?
            .ok_or_else(|| KeeperError::NotFound(format!("contract {}", contract)))?;
        let code_info = self
            .get_code_info(ctx, info.code_id)?
            .ok_or_else(|| KeeperError::NotFound(format!("code {} of contract {}", info.code_id, contract)))?;
        Ok((info, code_info, self.contract_store(ctx, contract)))
    }

    /// Restore a contract with its key, label and state. Used by genesis
    /// import.
    pub(crate) fn import_contract(
        &self,
        ctx: &Context,
        contract: &AccAddress,
        info: &ContractInfo,
        contract_key: &[u8],
        state: &[Model],
    ) -> KeeperResult<()> {
        if self.get_contract_info(ctx, contract)?.is_some() {
            return Err(KeeperError::AccountExists(contract.to_string()));
        }
        if self.get_contract_address(ctx, &info.label)?.is_some() {
            return Err(KeeperError::AccountExists(format!("label already exists: {}", info.label)));
        }
        self.set_contract_info(ctx, contract, info)?;
        let store = self.store(ctx);
        store.set(&keys::contract_enclave_key(contract), contract_key)?;
        store.set(&keys::contract_label_key(&info.label), contract.as_bytes())?;
        self.set_contract_state(ctx, contract, state)
    }
}
