//! # Veil Enclave
//!
//! Boundary between the compute keeper and the trusted execution
//! environment that runs contract bytecode over sealed state.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       EnclaveRuntime Trait                      │
//! │  • create()       - validate + hash bytecode                    │
//! │  • instantiate()  - first call, returns the contract key        │
//! │  • execute()      - call with an existing contract key          │
//! │  • migrate()      - call new code over existing state           │
//! │  • query()        - read-only call on contract key ‖ query      │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                              ▲
//!                 ▼                              │ Querier callback
//! ┌───────────────────────────────┐   ┌──────────────────────────────┐
//! │        MockEnclave            │   │ ledger / other contracts     │
//! │      (feature: mock)          │   │ (implemented by the keeper)  │
//! │  • software-sealed state      │   └──────────────────────────────┘
//! │  • ed25519 tx verification    │
//! │  • scripted contract ops      │
//! └───────────────────────────────┘
//! ```
//!
//! Every call returns its result wrapped in [`Metered`]; gas is reported
//! even when the call fails, and the caller is expected to charge it.

pub mod error;
pub mod traits;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::{EnclaveError, EnclaveResult};
pub use traits::{
    CallInput, EnclaveConfig, EnclaveInfo, EnclavePlatform, EnclaveRuntime, InitOutput, Metered,
    Querier, QueryInput,
};

#[cfg(feature = "mock")]
pub use mock::{MockEnclave, MockEnclaveBuilder, CONTRACT_KEY_LEN};

/// Create the default enclave based on enabled features
#[cfg(feature = "mock")]
pub fn create_default_enclave(enclave_id: &str) -> MockEnclave {
    MockEnclaveBuilder::new().enclave_id(enclave_id).build()
}
