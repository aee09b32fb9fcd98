//! The enclave contract seen from the keeper.

use serde::{Deserialize, Serialize};
use veil_storage::KvStore;
use veil_types::{CodeHash, ContractResponse, Env, QuerierError, QueryRequest, VerificationInfo};

use crate::EnclaveResult;

/// Synchronous callback a running contract uses to query the ledger or
/// other contracts. Implementations must not mutate ledger state.
pub trait Querier {
    fn query(&self, request: &QueryRequest) -> Result<Vec<u8>, QuerierError>;
}

/// Inputs shared by instantiate, execute and migrate
pub struct CallInput<'a> {
    pub code_hash: CodeHash,
    pub env: Env,
    pub msg: &'a [u8],
    /// The contract's own storage namespace
    pub store: &'a dyn KvStore,
    pub querier: &'a dyn Querier,
    /// Ceiling in enclave gas units
    pub gas_limit: u64,
    pub verification: &'a VerificationInfo,
}

pub struct QueryInput<'a> {
    pub code_hash: CodeHash,
    /// Contract key followed by the raw query
    pub msg: &'a [u8],
    /// Read-only view of the contract's namespace
    pub store: &'a dyn KvStore,
    pub querier: &'a dyn Querier,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutput {
    pub response: ContractResponse,
    /// Opaque capability for the new contract's sealed state
    pub contract_key: Vec<u8>,
}

/// A result together with the enclave gas spent producing it.
/// Gas is reported on failure too and must still be charged.
#[derive(Debug)]
pub struct Metered<T> {
    pub result: EnclaveResult<T>,
    pub gas_used: u64,
}

impl<T> Metered<T> {
    pub fn new(result: EnclaveResult<T>, gas_used: u64) -> Self {
        Self { result, gas_used }
    }

    pub fn into_parts(self) -> (EnclaveResult<T>, u64) {
        (self.result, self.gas_used)
    }
}

/// Sandbox entry points
pub trait EnclaveRuntime: Send + Sync {
    /// Validate and compile bytecode, returning its content hash
    fn create(&self, code: &[u8]) -> EnclaveResult<CodeHash>;

    /// Bytecode previously accepted by `create`
    fn get_code(&self, code_hash: &CodeHash) -> EnclaveResult<Vec<u8>>;

    fn instantiate(&self, input: CallInput<'_>) -> Metered<InitOutput>;

    fn execute(&self, input: CallInput<'_>) -> Metered<ContractResponse>;

    fn migrate(&self, input: CallInput<'_>) -> Metered<ContractResponse>;

    fn query(&self, input: QueryInput<'_>) -> Metered<Vec<u8>>;

    fn info(&self) -> EnclaveInfo;
}

/// Hardware platform behind an enclave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnclavePlatform {
    /// No TEE; state is sealed with a software key
    Mock,
    IntelSgx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnclaveInfo {
    pub enclave_id: String,
    pub platform: EnclavePlatform,
    /// MRENCLAVE for SGX, a constant for the mock
    pub measurement: [u8; 32],
    pub version: String,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnclaveConfig {
    pub enclave_id: String,
    /// Capabilities a contract may require, e.g. "staking"
    pub supported_features: Vec<String>,
    pub enable_debug_logging: bool,
}

impl Default for EnclaveConfig {
    fn default() -> Self {
        Self {
            enclave_id: "default".to_string(),
            supported_features: vec!["staking".to_string()],
            enable_debug_logging: false,
        }
    }
}

impl EnclaveConfig {
    pub fn with_enclave_id(mut self, id: impl Into<String>) -> Self {
        self.enclave_id = id.into();
        self
    }

    pub fn with_supported_features(mut self, features: Vec<String>) -> Self {
        self.supported_features = features;
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.enable_debug_logging = enabled;
        self
    }

    pub fn supports(&self, feature: &str) -> bool {
        self.supported_features.iter().any(|f| f == feature)
    }
}
