//! # Ledger Module
//!
//! The boundary to the remote EVM node. Everything the dispatch core needs
//! from the chain goes through [`LedgerClient`]; nothing else in the crate
//! speaks JSON-RPC.
//!
//! ## Architecture
//!
//! ```text
//! rpc.rs    JSON-RPC 2.0 envelopes and method names
//! http.rs   HttpLedgerClient, the reqwest transport
//! memory.rs MemoryLedger, scriptable in-process node (test-util)
//! ```
//!
//! Node errors are classified into a small [`RejectReason`] taxonomy so the
//! gateway can tell "out of funds" from "nonce conflict" from "node down"
//! without parsing strings itself.

pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod rpc;

pub use http::HttpLedgerClient;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryLedger;

use std::fmt;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transaction::SignedTransaction;

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

/// Operations the service performs against the ledger node.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current gas price quote in wei per gas.
    async fn estimate_gas_price(&self) -> Result<U256, LedgerError>;

    /// Broadcasts a signed transaction and returns the hash the node
    /// acknowledged it under.
    async fn submit(&self, tx: &SignedTransaction) -> Result<B256, LedgerError>;

    /// The pending transaction count for `address`, i.e. the next nonce the
    /// node expects from it.
    async fn current_nonce(&self, address: Address) -> Result<u64, LedgerError>;

    /// The node's chain id.
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Balance of `address` in wei.
    async fn balance(&self, address: Address) -> Result<U256, LedgerError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an intent failed, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The node could not be reached or answered garbage.
    Network,
    /// The identity cannot pay `value + gas`.
    InsufficientFunds,
    /// The nonce was already used on-chain or is taken in the pool.
    NonceTooLow,
    /// Gas limit below intrinsic cost, or gas price below the node's floor.
    GasTooLow,
    /// Any other node-side refusal.
    RejectedByNode,
    /// No answer within the submit timeout. The transaction may still land.
    Timeout,
    /// The transaction could not be signed locally. Nothing was sent.
    SigningFailed,
}

impl RejectReason {
    /// Stable label used in HTTP bodies, logs, and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::InsufficientFunds => "insufficient-funds",
            Self::NonceTooLow => "nonce-too-low",
            Self::GasTooLow => "gas-too-low",
            Self::RejectedByNode => "rejected-by-node",
            Self::Timeout => "timeout",
            Self::SigningFailed => "signing-failed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`LedgerClient`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport failure or an unparseable response.
    #[error("network error: {0}")]
    Network(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("nonce too low: {0}")]
    NonceTooLow(String),

    #[error("gas too low: {0}")]
    GasTooLow(String),

    /// A JSON-RPC error the classifier did not recognise.
    #[error("rejected by node ({code}): {message}")]
    RejectedByNode { code: i64, message: String },

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// Classifies a JSON-RPC error object by its message.
    ///
    /// Matches the wording used by geth, anvil, and hardhat. Unrecognised
    /// messages keep their code and text as [`LedgerError::RejectedByNode`].
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();

        if lower.contains("insufficient funds") {
            Self::InsufficientFunds(message)
        } else if lower.contains("nonce too low")
            || lower.contains("nonce has already been used")
            || lower.contains("replacement transaction")
        {
            Self::NonceTooLow(message)
        } else if lower.contains("intrinsic gas too low")
            || lower.contains("underpriced")
            || lower.contains("less than block base fee")
        {
            Self::GasTooLow(message)
        } else {
            Self::RejectedByNode { code, message }
        }
    }

    /// The reported category.
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::Network(_) => RejectReason::Network,
            Self::InsufficientFunds(_) => RejectReason::InsufficientFunds,
            Self::NonceTooLow(_) => RejectReason::NonceTooLow,
            Self::GasTooLow(_) => RejectReason::GasTooLow,
            Self::RejectedByNode { .. } => RejectReason::RejectedByNode,
            Self::Timeout(_) => RejectReason::Timeout,
        }
    }
}

impl From<rpc::RpcError> for LedgerError {
    fn from(err: rpc::RpcError) -> Self {
        Self::from_rpc(err.code, err.message)
    }
}
