//! Configuration for the compute keeper

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use veil_types::msg::{MAX_LABEL_SIZE, MAX_WASM_SIZE};

/// Keeper configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Ledger gas offered to a smart query that does not run on the
    /// caller's meter
    pub smart_query_gas_limit: u64,

    /// Upper bound on bytecode after decompression
    pub max_contract_size: usize,

    pub max_label_size: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            smart_query_gas_limit: 3_000_000,
            max_contract_size: MAX_WASM_SIZE,
            max_label_size: MAX_LABEL_SIZE,
        }
    }
}

impl ComputeConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            smart_query_gas_limit: env_or("COMPUTE_SMART_QUERY_GAS_LIMIT", defaults.smart_query_gas_limit)?,
            max_contract_size: env_or("COMPUTE_MAX_CONTRACT_SIZE", defaults.max_contract_size)?,
            max_label_size: env_or("COMPUTE_MAX_LABEL_SIZE", defaults.max_label_size)?,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.smart_query_gas_limit == 0 {
            anyhow::bail!("smart_query_gas_limit must be greater than zero");
        }
        if self.max_contract_size == 0 {
            anyhow::bail!("max_contract_size must be greater than zero");
        }
        if self.max_label_size == 0 {
            anyhow::bail!("max_label_size must be greater than zero");
        }
        Ok(())
    }
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
