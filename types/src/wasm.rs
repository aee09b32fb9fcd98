//! Types exchanged with the enclave.
//!
//! Everything here is JSON on the wire: the enclave receives an [`Env`] and a
//! raw message, and answers with a [`ContractResponse`] whose `messages` the
//! keeper replays after the call. Queries issued by a running contract come
//! back out as [`QueryRequest`]s.
//!
//! ```text
//!   keeper ── Env + msg ──▶ enclave
//!     ▲                       │
//!     │  QueryRequest ◀───────┤ (synchronous, read-only)
//!     │                       │
//!     └── ContractResponse ◀──┘ (log, data, CosmosMsg effects)
//! ```

use serde::{Deserialize, Serialize};

use crate::{AccAddress, Binary, Coin, Coins};

// ============================================
// Environment
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    /// Unix seconds
    pub time: u64,
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Account that authorized this call (a user, or the calling contract)
    pub sender: AccAddress,
    pub sent_funds: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEnv {
    pub address: AccAddress,
}

/// Execution environment handed to every enclave entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    pub block: BlockInfo,
    pub message: MessageInfo,
    pub contract: ContractEnv,
    /// Capability token for the contract's sealed state.
    /// Absent during instantiation, always present afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_key: Option<Binary>,
}

// ============================================
// Response
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAttribute {
    pub key: String,
    pub value: String,
}

impl LogAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Result of a successful instantiate, execute or migrate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResponse {
    /// Effects to replay, in order, after the call returns
    #[serde(default)]
    pub messages: Vec<CosmosMsg>,
    #[serde(default)]
    pub log: Vec<LogAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Binary>,
}

// ============================================
// Effect messages
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosmosMsg {
    Bank(BankMsg),
    Staking(StakingMsg),
    Wasm(WasmMsg),
    /// Opaque payload for an application-registered handler
    Custom(Binary),
}

impl CosmosMsg {
    pub fn type_name(&self) -> &'static str {
        match self {
            CosmosMsg::Bank(_) => "bank",
            CosmosMsg::Staking(_) => "staking",
            CosmosMsg::Wasm(_) => "wasm",
            CosmosMsg::Custom(_) => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankMsg {
    Send {
        from_address: AccAddress,
        to_address: AccAddress,
        amount: Coins,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingMsg {
    Delegate {
        validator: String,
        amount: Coin,
    },
    Undelegate {
        validator: String,
        amount: Coin,
    },
    Redelegate {
        src_validator: String,
        dst_validator: String,
        amount: Coin,
    },
    Withdraw {
        validator: String,
        /// Defaults to the delegating contract
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient: Option<AccAddress>,
    },
}

/// Sub-calls into contracts. `callback_sig` is filled in by the enclave and
/// authorizes the sub-call on behalf of the emitting contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmMsg {
    Execute {
        contract_addr: AccAddress,
        msg: Binary,
        #[serde(default)]
        send: Coins,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callback_sig: Option<Binary>,
    },
    Instantiate {
        code_id: u64,
        msg: Binary,
        #[serde(default)]
        send: Coins,
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callback_sig: Option<Binary>,
    },
}

// ============================================
// Queries
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest {
    Bank(BankQuery),
    Staking(StakingQuery),
    Mint(MintQuery),
    Dist(DistQuery),
    Wasm(WasmQuery),
    Custom(Binary),
}

impl QueryRequest {
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryRequest::Bank(_) => "bank",
            QueryRequest::Staking(_) => "staking",
            QueryRequest::Mint(_) => "mint",
            QueryRequest::Dist(_) => "dist",
            QueryRequest::Wasm(_) => "wasm",
            QueryRequest::Custom(_) => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankQuery {
    Balance { address: AccAddress, denom: String },
    AllBalances { address: AccAddress },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingQuery {
    BondedDenom {},
    Validators {},
    Delegation {
        delegator: AccAddress,
        validator: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintQuery {
    Inflation {},
    AnnualProvisions {},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistQuery {
    Rewards { delegator: AccAddress },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasmQuery {
    Smart { contract_addr: AccAddress, msg: Binary },
    Raw { contract_addr: AccAddress, key: Binary },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: String,
    /// Decimal string, e.g. "0.05"
    pub commission: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: AccAddress,
    pub validator: String,
    pub amount: Coin,
}

/// Failure reported back to a contract for one of its queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum QuerierError {
    #[error("Unsupported query type: {kind}")]
    UnsupportedRequest { kind: String },

    #[error("No such contract: {addr}")]
    NoSuchContract { addr: String },

    #[error("Invalid query: {0}")]
    InvalidRequest(String),

    #[error("Query failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosmos_msg_json_shape() {
        let msg = CosmosMsg::Bank(BankMsg::Send {
            from_address: AccAddress::new([1; 20]),
            to_address: AccAddress::new([2; 20]),
            amount: Coins::from_coins(vec![Coin::new(5, "uveil")]),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["bank"]["send"]["amount"].is_array());
        assert_eq!(msg.type_name(), "bank");
    }

    #[test]
    fn test_env_without_key_omits_field() {
        let env = Env {
            block: BlockInfo {
                height: 1,
                time: 2,
                chain_id: "veil-1".into(),
            },
            message: MessageInfo {
                sender: AccAddress::new([3; 20]),
                sent_funds: Coins::new(),
            },
            contract: ContractEnv {
                address: AccAddress::new([4; 20]),
            },
            contract_key: None,
        };
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("contract_key").is_none());
        let back: Env = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_wasm_query_parses() {
        let addr = AccAddress::new([9; 20]);
        let raw = format!(r#"{{"wasm":{{"raw":{{"contract_addr":"{}","key":"a2V5"}}}}}}"#, addr);
        let query: QueryRequest = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            query,
            QueryRequest::Wasm(WasmQuery::Raw {
                contract_addr: addr,
                key: Binary(b"key".to_vec()),
            })
        );
    }

    #[test]
    fn test_response_defaults() {
        let resp: ContractResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.messages.is_empty());
        assert!(resp.data.is_none());
    }
}
