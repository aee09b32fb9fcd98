//! Shared data model for the Veil confidential compute ledger.
//!
//! Everything that crosses a crate boundary lives here: account addresses,
//! coins, the persisted registry records, the types exchanged with the
//! enclave, and the transaction types the authenticity protocol reads.

// ========== Core Modules ==========
pub mod address;
pub mod binary;
pub mod coin;
pub mod event;
pub mod registry; // CodeInfo, ContractInfo, Model

// ========== Enclave Boundary ==========
pub mod wasm; // Env, ContractResponse, effect messages, queries

// ========== Transactions ==========
pub mod auth; // StdTx, signatures, sign docs, VerificationInfo
pub mod msg; // Ledger messages routed to the compute keeper

pub use address::{AccAddress, ADDRESS_LENGTH};
pub use binary::Binary;
pub use coin::{Coin, Coins};
pub use event::{Attribute, Event};
pub use registry::{CodeHash, CodeInfo, ContractInfo, CreatedAt, Model, CODE_HASH_LENGTH};

pub use wasm::{
    BankMsg, BankQuery, BlockInfo, ContractEnv, ContractResponse, CosmosMsg, Delegation,
    DistQuery, Env, LogAttribute, MessageInfo, MintQuery, QuerierError, QueryRequest,
    StakingMsg, StakingQuery, Validator, WasmMsg, WasmQuery,
};

pub use auth::{StdFee, StdSignDoc, StdSignature, StdTx, VerificationInfo};
pub use msg::{
    MsgClearAdmin, MsgExecuteContract, MsgInstantiateContract, MsgMigrateContract,
    MsgStoreCode, MsgUpdateAdmin, TxMsg,
};

// Error types
pub type TypesResult<T> = Result<T, TypesError>;

#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid coins: {0}")]
    InvalidCoins(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}
