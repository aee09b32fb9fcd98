//! Scripted contract behaviour for the mock enclave.
//!
//! A message is a JSON op, or an array of ops, run in order:
//!
//! ```text
//! [{"set": {"key": "count", "value": "1"}},
//!  {"send": {"to": "0x…", "amount": [{"denom": "uveil", "amount": "5"}]}},
//!  {"execute": {"contract": "0x…", "msg": {"log": {"key": "k", "value": "v"}}}}]
//! ```
//!
//! `{}` is a no-op. Queries accept a single [`QueryOp`].

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use veil_storage::KvStore;
use veil_types::{
    AccAddress, BankMsg, Binary, Coins, ContractResponse, CosmosMsg, Env, LogAttribute,
    QueryRequest, WasmMsg,
};

use super::seal::Sealer;
use crate::{EnclaveError, EnclaveResult, Querier};

/// Gas charged on entry to any call
pub const BASE_GAS: u64 = 50_000;
/// Gas charged per op
pub const OP_GAS: u64 = 5_000;
/// Gas charged per byte written
pub const WRITE_BYTE_GAS: u64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ContractOp {
    Set {
        key: String,
        value: String,
    },
    Remove {
        key: String,
    },
    /// Transfer from the contract's own account
    Send {
        to: AccAddress,
        amount: Coins,
    },
    /// Sub-call into another contract
    Execute {
        contract: AccAddress,
        msg: Value,
        #[serde(default)]
        send: Coins,
    },
    Instantiate {
        code_id: u64,
        msg: Value,
        label: String,
        #[serde(default)]
        send: Coins,
    },
    /// Any other effect, passed through unchanged
    Emit {
        msg: CosmosMsg,
    },
    /// Query through the host; the reply becomes the response data
    Query {
        request: QueryRequest,
    },
    Log {
        key: String,
        value: String,
    },
    Data {
        value: String,
    },
    Burn {
        gas: u64,
    },
    Fail {
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum QueryOp {
    Get { key: String },
    Set { key: String, value: String },
    Forward { request: QueryRequest },
    Burn { gas: u64 },
    Fail { reason: String },
}

/// Per-call gas accounting, in enclave units
pub(crate) struct GasTracker {
    used: u64,
    limit: u64,
}

impl GasTracker {
    pub fn new(limit: u64) -> Self {
        Self { used: 0, limit }
    }

    pub fn charge(&mut self, amount: u64) -> EnclaveResult<()> {
        let next = self.used.saturating_add(amount);
        if next > self.limit {
            self.used = self.limit;
            return Err(EnclaveError::OutOfGas);
        }
        self.used = next;
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }
}

pub(crate) fn parse_program(msg: &[u8]) -> EnclaveResult<Vec<ContractOp>> {
    let value: Value = serde_json::from_slice(msg)
        .map_err(|e| EnclaveError::FailedToDeserialize(e.to_string()))?;
    let ops = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ContractOp>, _>>(),
        Value::Object(ref map) if map.is_empty() => Ok(Vec::new()),
        other => serde_json::from_value(other).map(|op| vec![op]),
    };
    ops.map_err(|e| EnclaveError::FailedToDeserialize(e.to_string()))
}

/// Everything a running contract can touch
pub(crate) struct Invocation<'a> {
    pub sealer: &'a Sealer,
    pub contract_key: &'a [u8],
    pub env: &'a Env,
    pub store: &'a dyn KvStore,
    pub querier: &'a dyn Querier,
    pub debug: bool,
}

impl Invocation<'_> {
    pub fn run(&self, ops: Vec<ContractOp>, gas: &mut GasTracker) -> EnclaveResult<ContractResponse> {
        let mut response = ContractResponse::default();
        let contract = self.env.contract.address;

        for op in ops {
            gas.charge(OP_GAS)?;
            if self.debug {
                debug!(contract = %contract, op = ?op, "Running mock op");
            }
            match op {
                ContractOp::Set { key, value } => {
                    gas.charge(WRITE_BYTE_GAS * (key.len() + value.len()) as u64)?;
                    let sealed = self
                        .sealer
                        .seal(self.contract_key, key.as_bytes(), value.as_bytes());
                    self.store.set(key.as_bytes(), &sealed)?;
                }
                ContractOp::Remove { key } => self.store.delete(key.as_bytes())?,
                ContractOp::Send { to, amount } => {
                    response.messages.push(CosmosMsg::Bank(BankMsg::Send {
                        from_address: contract,
                        to_address: to,
                        amount,
                    }));
                }
                ContractOp::Execute { contract: target, msg, send } => {
                    let msg = encode(&msg)?;
                    let callback_sig = self.sealer.callback_sig(&contract, &msg);
                    response.messages.push(CosmosMsg::Wasm(WasmMsg::Execute {
                        contract_addr: target,
                        msg: Binary(msg),
                        send,
                        callback_sig: Some(Binary(callback_sig)),
                    }));
                }
                ContractOp::Instantiate { code_id, msg, label, send } => {
                    let msg = encode(&msg)?;
                    let callback_sig = self.sealer.callback_sig(&contract, &msg);
                    response.messages.push(CosmosMsg::Wasm(WasmMsg::Instantiate {
                        code_id,
                        msg: Binary(msg),
                        send,
                        label,
                        callback_sig: Some(Binary(callback_sig)),
                    }));
                }
                ContractOp::Emit { msg } => response.messages.push(msg),
                ContractOp::Query { request } => {
                    let reply = self
                        .querier
                        .query(&request)
                        .map_err(|e| EnclaveError::QueryFailed(e.to_string()))?;
                    response.data = Some(Binary(reply));
                }
                ContractOp::Log { key, value } => response.log.push(LogAttribute::new(key, value)),
                ContractOp::Data { value } => response.data = Some(Binary(value.into_bytes())),
                ContractOp::Burn { gas: amount } => gas.charge(amount)?,
                ContractOp::Fail { reason } => return Err(EnclaveError::ContractError(reason)),
            }
        }
        Ok(response)
    }
}

pub(crate) fn run_query(
    sealer: &Sealer,
    contract_key: &[u8],
    query: &[u8],
    store: &dyn KvStore,
    querier: &dyn Querier,
    gas: &mut GasTracker,
) -> EnclaveResult<Vec<u8>> {
    let op: QueryOp = serde_json::from_slice(query)
        .map_err(|e| EnclaveError::FailedToDeserialize(e.to_string()))?;
    gas.charge(OP_GAS)?;
    match op {
        QueryOp::Get { key } => {
            let value = match store.get(key.as_bytes())? {
                Some(sealed) => Some(sealer.unseal(contract_key, key.as_bytes(), &sealed)?),
                None => None,
            };
            let value = value.map(|v| String::from_utf8_lossy(&v).into_owned());
            encode(&serde_json::json!({ "value": value }))
        }
        QueryOp::Set { key, value } => {
            let sealed = sealer.seal(contract_key, key.as_bytes(), value.as_bytes());
            store.set(key.as_bytes(), &sealed)?;
            Ok(Vec::new())
        }
        QueryOp::Forward { request } => querier
            .query(&request)
            .map_err(|e| EnclaveError::QueryFailed(e.to_string())),
        QueryOp::Burn { gas: amount } => {
            gas.charge(amount)?;
            Ok(Vec::new())
        }
        QueryOp::Fail { reason } => Err(EnclaveError::ContractError(reason)),
    }
}

fn encode(value: &Value) -> EnclaveResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| EnclaveError::FailedToSerialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_program_forms() {
        assert!(parse_program(b"{}").unwrap().is_empty());
        assert_eq!(
            parse_program(br#"{"log":{"key":"a","value":"b"}}"#).unwrap().len(),
            1
        );
        assert_eq!(
            parse_program(br#"[{"burn":{"gas":1}},{"fail":{"reason":"x"}}]"#)
                .unwrap()
                .len(),
            2
        );
        assert!(matches!(
            parse_program(br#"{"unknown":{}}"#),
            Err(EnclaveError::FailedToDeserialize(_))
        ));
        assert!(parse_program(b"not json").is_err());
    }

    #[test]
    fn test_gas_tracker_caps_at_limit() {
        let mut gas = GasTracker::new(100);
        gas.charge(60).unwrap();
        assert!(matches!(gas.charge(60), Err(EnclaveError::OutOfGas)));
        assert_eq!(gas.used(), 100);
    }
}
