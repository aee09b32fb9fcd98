//! Mock enclave implementation for development and testing.
//!
//! The MockEnclave simulates the confidential runtime without SGX hardware.
//! It provides:
//! - Bytecode validation and content hashing
//! - Contract keys bound to the contract address
//! - Sealed (encrypted + authenticated) contract state
//! - Signature and callback-signature verification
//! - Deterministic gas metering
//!
//! Contract behaviour is scripted by the message itself, see [`ops`].

pub mod ops;
mod seal;

pub use seal::CONTRACT_KEY_LEN;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use veil_types::{CodeHash, ContractResponse, Env};

use crate::{
    CallInput, EnclaveConfig, EnclaveError, EnclaveInfo, EnclavePlatform, EnclaveResult,
    EnclaveRuntime, InitOutput, Metered, QueryInput,
};
use ops::{GasTracker, Invocation, BASE_GAS};
use seal::{EntryPoint, Sealer};

/// Mock enclave measurement (constant for testing)
const MOCK_MEASUREMENT: [u8; 32] = [
    0x4d, 0x4f, 0x43, 0x4b, // "MOCK"
    0x5f, 0x56, 0x45, 0x49, // "_VEI"
    0x4c, 0x5f, 0x56, 0x31, // "L_V1"
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Seed shared by mock enclaves unless the builder overrides it
const DEFAULT_SEED: [u8; 32] = [0x5e; 32];

const WASM_MAGIC: &[u8] = b"\0asm";
const FEATURE_MARKER: &[u8] = b"requires_";

/// Mock enclave for development and testing
pub struct MockEnclave {
    config: EnclaveConfig,
    sealer: Sealer,
    /// Accepted bytecode by content hash
    codes: RwLock<HashMap<CodeHash, Vec<u8>>>,
    /// Entry point invocations, for statistics
    call_count: AtomicU64,
}

impl MockEnclave {
    pub fn new(config: EnclaveConfig) -> Self {
        Self::with_seed(config, DEFAULT_SEED)
    }

    fn with_seed(config: EnclaveConfig, seed: [u8; 32]) -> Self {
        Self {
            config,
            sealer: Sealer::new(seed),
            codes: RwLock::new(HashMap::new()),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Features named by `requires_<name>` markers in the bytecode
    fn required_features(code: &[u8]) -> Vec<String> {
        let mut features = Vec::new();
        let mut rest = code;
        while let Some(pos) = find(rest, FEATURE_MARKER) {
            let tail = &rest[pos + FEATURE_MARKER.len()..];
            let len = tail
                .iter()
                .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || **b == b'_')
                .count();
            if len > 0 {
                features.push(String::from_utf8_lossy(&tail[..len]).into_owned());
            }
            rest = &tail[len..];
        }
        features
    }

    fn ensure_code(&self, code_hash: &CodeHash) -> EnclaveResult<()> {
        if self.codes.read().contains_key(code_hash) {
            Ok(())
        } else {
            Err(EnclaveError::CodeNotFound(hex::encode(code_hash)))
        }
    }

    fn contract_key_of(&self, env: &Env) -> EnclaveResult<Vec<u8>> {
        let key = env
            .contract_key
            .as_ref()
            .ok_or(EnclaveError::FailedContractAuthentication)?;
        self.sealer.authenticate(key.as_slice(), &env.contract.address)?;
        Ok(key.to_vec())
    }

    /// Shared body of instantiate / execute / migrate
    fn call(
        &self,
        entry: EntryPoint,
        input: &CallInput<'_>,
        gas: &mut GasTracker,
    ) -> EnclaveResult<(ContractResponse, Vec<u8>)> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        gas.charge(BASE_GAS)?;
        self.ensure_code(&input.code_hash)?;

        let contract_key = match entry {
            EntryPoint::Instantiate => self
                .sealer
                .contract_key(&input.env.message.sender, &input.env.contract.address),
            EntryPoint::Execute | EntryPoint::Migrate => self.contract_key_of(&input.env)?,
        };
        self.sealer
            .verify(entry, &input.env, input.msg, input.verification)?;

        let program = ops::parse_program(input.msg)?;
        let invocation = Invocation {
            sealer: &self.sealer,
            contract_key: &contract_key,
            env: &input.env,
            store: input.store,
            querier: input.querier,
            debug: self.config.enable_debug_logging,
        };
        let response = invocation.run(program, gas)?;
        Ok((response, contract_key))
    }

    fn run_query(&self, input: &QueryInput<'_>, gas: &mut GasTracker) -> EnclaveResult<Vec<u8>> {
        gas.charge(BASE_GAS)?;
        self.ensure_code(&input.code_hash)?;
        if input.msg.len() < CONTRACT_KEY_LEN {
            return Err(EnclaveError::FailedContractAuthentication);
        }
        let (contract_key, query) = input.msg.split_at(CONTRACT_KEY_LEN);
        ops::run_query(&self.sealer, contract_key, query, input.store, input.querier, gas)
    }

    fn metered<T>(&self, what: &str, result: EnclaveResult<T>, gas: GasTracker) -> Metered<T> {
        if let Err(e) = &result {
            warn!(enclave = %self.config.enclave_id, call = what, error = %e, "Mock enclave call failed");
        } else {
            debug!(enclave = %self.config.enclave_id, call = what, gas_used = gas.used(), "Mock enclave call finished");
        }
        Metered::new(result, gas.used())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl EnclaveRuntime for MockEnclave {
    fn create(&self, code: &[u8]) -> EnclaveResult<CodeHash> {
        if !code.starts_with(WASM_MAGIC) {
            return Err(EnclaveError::InvalidWasm("missing wasm magic header".into()));
        }
        for feature in Self::required_features(code) {
            if !self.config.supports(&feature) {
                return Err(EnclaveError::InvalidWasm(format!(
                    "unsupported feature: {}",
                    feature
                )));
            }
        }
        let code_hash: CodeHash = Sha256::digest(code).into();
        self.codes.write().insert(code_hash, code.to_vec());
        info!(code_hash = %hex::encode(code_hash), size = code.len(), "Mock enclave accepted code");
        Ok(code_hash)
    }

    fn get_code(&self, code_hash: &CodeHash) -> EnclaveResult<Vec<u8>> {
        self.codes
            .read()
            .get(code_hash)
            .cloned()
            .ok_or_else(|| EnclaveError::CodeNotFound(hex::encode(code_hash)))
    }

    fn instantiate(&self, input: CallInput<'_>) -> Metered<InitOutput> {
        let mut gas = GasTracker::new(input.gas_limit);
        let result = self
            .call(EntryPoint::Instantiate, &input, &mut gas)
            .map(|(response, contract_key)| InitOutput {
                response,
                contract_key,
            });
        self.metered("instantiate", result, gas)
    }

    fn execute(&self, input: CallInput<'_>) -> Metered<ContractResponse> {
        let mut gas = GasTracker::new(input.gas_limit);
        let result = self
            .call(EntryPoint::Execute, &input, &mut gas)
            .map(|(response, _)| response);
        self.metered("execute", result, gas)
    }

    fn migrate(&self, input: CallInput<'_>) -> Metered<ContractResponse> {
        let mut gas = GasTracker::new(input.gas_limit);
        let result = self
            .call(EntryPoint::Migrate, &input, &mut gas)
            .map(|(response, _)| response);
        self.metered("migrate", result, gas)
    }

    fn query(&self, input: QueryInput<'_>) -> Metered<Vec<u8>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut gas = GasTracker::new(input.gas_limit);
        let result = self.run_query(&input, &mut gas);
        self.metered("query", result, gas)
    }

    fn info(&self) -> EnclaveInfo {
        EnclaveInfo {
            enclave_id: self.config.enclave_id.clone(),
            platform: EnclavePlatform::Mock,
            measurement: MOCK_MEASUREMENT,
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_simulated: true,
        }
    }
}

/// Builder for MockEnclave
pub struct MockEnclaveBuilder {
    enclave_id: Option<String>,
    seed: [u8; 32],
    supported_features: Vec<String>,
    debug_logging: bool,
}

impl Default for MockEnclaveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnclaveBuilder {
    pub fn new() -> Self {
        Self {
            enclave_id: None,
            seed: DEFAULT_SEED,
            supported_features: EnclaveConfig::default().supported_features,
            debug_logging: false,
        }
    }

    pub fn enclave_id(mut self, id: impl Into<String>) -> Self {
        self.enclave_id = Some(id.into());
        self
    }

    /// Network seed; enclaves sharing it accept each other's keys
    pub fn seed(mut self, seed: [u8; 32]) -> Self {
        self.seed = seed;
        self
    }

    pub fn supported_features(mut self, features: Vec<String>) -> Self {
        self.supported_features = features;
        self
    }

    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn build(self) -> MockEnclave {
        let enclave_id = self
            .enclave_id
            .unwrap_or_else(|| format!("mock-{}", uuid::Uuid::new_v4()));
        let config = EnclaveConfig::default()
            .with_enclave_id(enclave_id)
            .with_supported_features(self.supported_features)
            .with_debug_logging(self.debug_logging);
        MockEnclave::with_seed(config, self.seed)
    }
}
