use thiserror::Error;
use veil_storage::StorageError;

pub type EnclaveResult<T> = Result<T, EnclaveError>;

/// Failures reported by the enclave. The keeper wraps these into its own
/// `*Failed` kinds and never retries.
#[derive(Debug, Error)]
pub enum EnclaveError {
    #[error("Invalid wasm: {0}")]
    InvalidWasm(String),

    #[error("Unknown code hash {0}")]
    CodeNotFound(String),

    #[error("Execution ran out of gas")]
    OutOfGas,

    #[error("Failed to authenticate contract key")]
    FailedContractAuthentication,

    #[error("Failed to verify transaction: {0}")]
    FailedTxVerification(String),

    #[error("Failed to deserialize: {0}")]
    FailedToDeserialize(String),

    #[error("Failed to serialize: {0}")]
    FailedToSerialize(String),

    #[error("Failed to unseal contract state")]
    FailedUnseal,

    #[error("Write attempted during a read-only call")]
    UnauthorizedWrite,

    #[error("Contract query failed: {0}")]
    QueryFailed(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for EnclaveError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ReadOnly => EnclaveError::UnauthorizedWrite,
            other => EnclaveError::Storage(other),
        }
    }
}
