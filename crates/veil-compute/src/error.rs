//! Keeper error types

use thiserror::Error;
use veil_storage::StorageError;
use veil_types::AccAddress;

pub type KeeperResult<T> = Result<T, KeeperError>;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("Create wasm contract failed: {0}")]
    CreateFailed(String),

    /// `contract` is set when the sandbox failed after the address was derived
    #[error("Instantiate wasm contract failed: {reason}")]
    InstantiateFailed {
        reason: String,
        contract: Option<AccAddress>,
    },

    #[error("Execute wasm contract failed: {0}")]
    ExecuteFailed(String),

    #[error("Migrate wasm contract failed: {0}")]
    MigrationFailed(String),

    #[error("Query wasm contract failed: {0}")]
    QueryFailed(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Out of gas in {descriptor}: limit {limit}, consumed {consumed}")]
    OutOfGas {
        limit: u64,
        consumed: u64,
        descriptor: String,
    },

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Failure replaying the effects of a migration
    #[error("dispatch: {0}")]
    Dispatch(#[source] Box<KeeperError>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(String),
}

impl KeeperError {
    pub(crate) fn instantiate_failed(reason: impl Into<String>) -> Self {
        KeeperError::InstantiateFailed {
            reason: reason.into(),
            contract: None,
        }
    }

    /// The error behind any `dispatch:` wrapping
    pub fn root(&self) -> &KeeperError {
        match self {
            KeeperError::Dispatch(inner) => inner.root(),
            other => other,
        }
    }
}
