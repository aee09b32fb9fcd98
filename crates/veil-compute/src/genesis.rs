//! Genesis import and export of the keeper's state

use serde::{Deserialize, Serialize};
use tracing::info;
use veil_types::{AccAddress, Binary, CodeInfo, ContractInfo, Model};

use crate::context::Context;
use crate::keeper::Keeper;
use crate::keys::{KEY_LAST_CODE_ID, KEY_LAST_INSTANCE_ID};
use crate::{KeeperError, KeeperResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisCode {
    pub code_id: u64,
    pub code_info: CodeInfo,
    pub code_bytes: Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisContract {
    pub address: AccAddress,
    pub contract_info: ContractInfo,
    pub contract_key: Binary,
    pub contract_state: Vec<Model>,
}

/// A counter and the next value it hands out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisSequence {
    pub id_key: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    #[serde(default)]
    pub codes: Vec<GenesisCode>,
    #[serde(default)]
    pub contracts: Vec<GenesisContract>,
    #[serde(default)]
    pub sequences: Vec<GenesisSequence>,
}

/// Restore `state`. Every code is re-submitted to the enclave and must hash
/// to its recorded value; the code counter must lie past every imported id.
pub fn init_genesis(keeper: &Keeper, ctx: &Context, state: &GenesisState) -> KeeperResult<()> {
    let mut max_code_id = 0;
    for code in &state.codes {
        keeper.import_code(ctx, code.code_id, &code.code_info, code.code_bytes.as_slice())?;
        max_code_id = max_code_id.max(code.code_id);
    }

    for contract in &state.contracts {
        if keeper.get_code_info(ctx, contract.contract_info.code_id)?.is_none() {
            return Err(KeeperError::NotFound(format!(
                "code {} of contract {}",
                contract.contract_info.code_id, contract.address
            )));
        }
        keeper.import_contract(
            ctx,
            &contract.address,
            &contract.contract_info,
            contract.contract_key.as_slice(),
            &contract.contract_state,
        )?;
    }

    for seq in &state.sequences {
        match seq.id_key.as_str() {
            KEY_LAST_CODE_ID | KEY_LAST_INSTANCE_ID => {
                keeper.set_auto_increment_id(ctx, &seq.id_key, seq.value)?
            }
            other => {
                return Err(KeeperError::InvalidRequest(format!("unknown sequence {}", other)));
            }
        }
    }

    let next_code_id = keeper.get_next_code_id(ctx)?;
    if next_code_id <= max_code_id {
        return Err(KeeperError::InvalidRequest(format!(
            "sequence {} is {}, must be greater than the highest code id {}",
            KEY_LAST_CODE_ID, next_code_id, max_code_id
        )));
    }

    info!(
        codes = state.codes.len(),
        contracts = state.contracts.len(),
        "Imported compute genesis"
    );
    Ok(())
}

pub fn export_genesis(keeper: &Keeper, ctx: &Context) -> KeeperResult<GenesisState> {
    let mut state = GenesisState::default();

    for code_id in 1..keeper.get_next_code_id(ctx)? {
        let Some(code_info) = keeper.get_code_info(ctx, code_id)? else {
            continue;
        };
        let code_bytes = keeper
            .get_byte_code(ctx, code_id)?
            .ok_or_else(|| KeeperError::NotFound(format!("bytecode of code {}", code_id)))?;
        state.codes.push(GenesisCode {
            code_id,
            code_info,
            code_bytes: Binary(code_bytes),
        });
    }

    let mut contracts = Vec::new();
    keeper.list_contract_info(ctx, |address, info| {
        contracts.push((address, info));
        false
    })?;
    for (address, contract_info) in contracts {
        let contract_key = keeper
            .get_contract_key(ctx, &address)?
            .ok_or_else(|| KeeperError::NotFound(format!("enclave key of contract {}", address)))?;
        state.contracts.push(GenesisContract {
            address,
            contract_info,
            contract_key: Binary(contract_key),
            contract_state: keeper.get_contract_state(ctx, &address)?,
        });
    }

    for id_key in [KEY_LAST_CODE_ID, KEY_LAST_INSTANCE_ID] {
        state.sequences.push(GenesisSequence {
            id_key: id_key.to_string(),
            value: keeper.peek_auto_increment_id(ctx, id_key)?,
        });
    }
    Ok(state)
}
