//! Gas bridge between the ledger meter and the sandbox.
//!
//! The sandbox meters in its own, finer unit. Going in, the ceiling rounds
//! down; coming out, the charge rounds up, so a call never runs more
//! sandbox gas than the ledger is charged for.

use crate::context::GasMeter;
use crate::KeeperResult;

/// Sandbox gas units per ledger gas unit
pub const GAS_MULTIPLIER: u64 = 100;

/// Absolute per-call ceiling, in sandbox gas
pub const MAX_GAS: u64 = 900_000_000;

/// Gas descriptor used when charging the ledger for a sandbox call
pub const GAS_DESCRIPTOR: &str = "wasm contract";

/// Sandbox gas offered to a call running on `meter`
pub fn sandbox_gas_ceiling(meter: &GasMeter) -> u64 {
    to_sandbox_gas(meter.remaining())
}

pub fn to_sandbox_gas(ledger_gas: u64) -> u64 {
    ledger_gas.saturating_mul(GAS_MULTIPLIER).min(MAX_GAS)
}

/// Ledger gas owed for `sandbox_used`; never zero
pub fn ledger_charge(sandbox_used: u64) -> u64 {
    sandbox_used / GAS_MULTIPLIER + 1
}

pub fn charge_ledger(meter: &GasMeter, sandbox_used: u64) -> KeeperResult<()> {
    meter.consume(ledger_charge(sandbox_used), GAS_DESCRIPTOR)
}
