//! # Protocol Configuration & Constants
//!
//! Every magic number in Accord lives here, next to the [`DispatchConfig`]
//! that carries the per-deployment settings into the dispatch core.
//!
//! Values are fixed for the lifetime of the process. There is no reload
//! path on purpose: changing the contract address or the disbursement amount
//! under live traffic would make two halves of the same request disagree.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version string reported by `/status`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Gas Parameters
// ---------------------------------------------------------------------------

/// Gas limit for the `createAgreement` call. Fixed headroom rather than a
/// per-call estimate, sized for a registry that emits or hashes the text
/// rather than storing it.
pub const CONTRACT_CALL_GAS_LIMIT: u64 = 200_000;

/// Largest chain id whose EIP-155 `v` (`chain_id * 2 + 35 + recovery_id`)
/// still fits in a `u64`.
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// Gas limit for a plain value transfer. Protocol constant on every EVM chain.
pub const VALUE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Default disbursement in wei. Enough for the counterparty to notice, and
/// on a dev chain with a 1 wei gas price, enough for several signatures.
pub const DEFAULT_DISBURSEMENT_WEI: u64 = 100_000;

/// Gas the counterparty is expected to burn countersigning. Used by
/// [`DisbursementPolicy::CoverGas`] when the operator does not override it.
pub const DEFAULT_COUNTERSIGN_GAS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Request Limits
// ---------------------------------------------------------------------------

/// Maximum agreement text length in bytes. At 16 gas per calldata byte the
/// text costs at most ~65k gas to send, which fits in
/// [`CONTRACT_CALL_GAS_LIMIT`]. Storage is not covered: a contract that
/// writes the full text needs ~20k gas per 32-byte word, so raise
/// `--call-gas-limit` for such a deployment.
pub const MAX_AGREEMENT_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Upper bound on a single `eth_sendRawTransaction` round trip. Past this the
/// submission is reported as a timeout and its nonce is treated as burned.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP timeout for read-only JSON-RPC queries (gas price, nonce, balance).
pub const RPC_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default ledger node endpoint (a local dev chain).
pub const DEFAULT_NODE_URL: &str = "http://localhost:8545";

/// Default gateway listening port.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9464;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// How much native currency the counterparty receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DisbursementPolicy {
    /// Always send the same amount, regardless of fees.
    Fixed {
        /// Amount in wei.
        amount: U256,
    },
    /// Send enough to pay for `gas_units` at the quoted gas price, never
    /// less than `floor`. Uses the same quote the transfer itself is priced at.
    CoverGas {
        /// Minimum amount in wei.
        floor: U256,
        /// Gas the counterparty needs to countersign.
        gas_units: u64,
    },
}

impl DisbursementPolicy {
    /// Resolves the amount to disburse at the given gas price (wei per gas).
    pub fn amount(&self, gas_price: U256) -> U256 {
        match *self {
            Self::Fixed { amount } => amount,
            Self::CoverGas { floor, gas_units } => {
                let covering = gas_price.saturating_mul(U256::from(gas_units));
                covering.max(floor)
            }
        }
    }
}

impl Default for DisbursementPolicy {
    fn default() -> Self {
        Self::Fixed {
            amount: U256::from(DEFAULT_DISBURSEMENT_WEI),
        }
    }
}

/// What the dispatcher does once a nonce has been burned by a rejected or
/// timed-out submission.
///
/// A burned nonce leaves a hole in the identity's on-chain sequence. Any
/// transaction with a higher nonce will sit in the node's queue until the
/// hole is filled, so by default the dispatcher stops taking new work until
/// an operator resyncs against the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Refuse new dispatches until [`resync`](crate::dispatch::Dispatcher::resync).
    #[default]
    Halt,
    /// Keep allocating. Burned nonces are still recorded and reported.
    Continue,
}

impl std::str::FromStr for GapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "continue" => Ok(Self::Continue),
            other => Err(format!("unknown gap policy: {other} (expected halt|continue)")),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/// Settings the dispatch core needs for every request.
///
/// Built once at startup from CLI/env configuration and shared read-only.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Address of the deployed agreement registry contract.
    pub contract: Address,
    /// EIP-155 chain id. `None` signs Homestead-style (no replay protection).
    pub chain_id: Option<u64>,
    /// Gas limit for the registration call.
    pub call_gas_limit: u64,
    /// Gas limit for the funding transfer.
    pub transfer_gas_limit: u64,
    /// Disbursement sizing.
    pub disbursement: DisbursementPolicy,
    /// Bound on a single submission round trip.
    pub submit_timeout: Duration,
    /// Behaviour after a burned nonce.
    pub gap_policy: GapPolicy,
}

impl DispatchConfig {
    /// Creates a config for `contract` with every other field at its default.
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            chain_id: None,
            call_gas_limit: CONTRACT_CALL_GAS_LIMIT,
            transfer_gas_limit: VALUE_TRANSFER_GAS_LIMIT,
            disbursement: DisbursementPolicy::default(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            gap_policy: GapPolicy::default(),
        }
    }
}
