//! Per-request outcome types.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::agreement::AgreementError;
use crate::crypto::KeyError;
use crate::ledger::{LedgerError, RejectReason};
use crate::transaction::IntentKind;

// ---------------------------------------------------------------------------
// DispatchStage
// ---------------------------------------------------------------------------

/// Where a request is in its lifecycle.
///
/// ```text
/// Received -> Validated -> CallSubmitted -> CallFailed
///                                        -> CallAccepted -> TransferSubmitted -> TransferFailed
///                                                                             -> TransferAccepted
/// ```
///
/// A finished [`DispatchReport`] always carries one of the three terminal
/// stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStage {
    Received,
    Validated,
    CallSubmitted,
    /// Nothing was registered. Safe to retry the whole request.
    CallFailed,
    CallAccepted,
    TransferSubmitted,
    /// Registered but not funded. Retry only the transfer.
    TransferFailed,
    TransferAccepted,
}

impl DispatchStage {
    /// Returns `true` for stages a request ends in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CallFailed | Self::TransferFailed | Self::TransferAccepted
        )
    }
}

// ---------------------------------------------------------------------------
// DispatchResult
// ---------------------------------------------------------------------------

/// How one submission ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The node accepted the transaction into its pool.
    Accepted { tx_hash: B256 },
    /// The transaction was refused or its fate is unknown (timeout).
    Rejected { reason: RejectReason, detail: String },
}

/// Result of one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub kind: IntentKind,
    /// The nonce the intent was signed with. `None` if the request failed
    /// before a nonce was drawn (fee quote failure).
    pub nonce: Option<u64>,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Submission round trip in milliseconds, `0` if nothing was submitted.
    pub elapsed_ms: u64,
}

impl DispatchResult {
    pub(crate) fn accepted(kind: IntentKind, nonce: u64, tx_hash: B256, elapsed_ms: u64) -> Self {
        Self {
            kind,
            nonce: Some(nonce),
            outcome: Outcome::Accepted { tx_hash },
            elapsed_ms,
        }
    }

    pub(crate) fn rejected(
        kind: IntentKind,
        nonce: Option<u64>,
        err: &LedgerError,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            kind,
            nonce,
            outcome: Outcome::Rejected {
                reason: err.reason(),
                detail: err.to_string(),
            },
            elapsed_ms,
        }
    }

    /// An intent whose nonce was drawn but whose signature could not be
    /// produced. Nothing reached the node.
    pub(crate) fn signing_failed(kind: IntentKind, nonce: u64, err: &KeyError) -> Self {
        Self {
            kind,
            nonce: Some(nonce),
            outcome: Outcome::Rejected {
                reason: RejectReason::SigningFailed,
                detail: err.to_string(),
            },
            elapsed_ms: 0,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, Outcome::Accepted { .. })
    }

    /// The acknowledged hash, if accepted.
    pub fn tx_hash(&self) -> Option<B256> {
        match self.outcome {
            Outcome::Accepted { tx_hash } => Some(tx_hash),
            Outcome::Rejected { .. } => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reason(&self) -> Option<RejectReason> {
        match self.outcome {
            Outcome::Accepted { .. } => None,
            Outcome::Rejected { reason, .. } => Some(reason),
        }
    }

    /// Whether a submission actually went out for this intent.
    pub fn was_submitted(&self) -> bool {
        self.nonce.is_some() && self.reason() != Some(RejectReason::SigningFailed)
    }
}

// ---------------------------------------------------------------------------
// DispatchReport
// ---------------------------------------------------------------------------

/// Everything that happened for one request.
///
/// `results` holds one entry per attempted intent in submission order: one
/// entry when the call failed, two otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub request_id: Uuid,
    pub stage: DispatchStage,
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    /// `true` when both transactions were accepted.
    pub fn is_complete(&self) -> bool {
        self.stage == DispatchStage::TransferAccepted
    }

    /// The contract call result.
    pub fn call(&self) -> Option<&DispatchResult> {
        self.results
            .iter()
            .find(|r| r.kind == IntentKind::ContractCall)
    }

    /// The value transfer result, absent if it was never attempted.
    pub fn transfer(&self) -> Option<&DispatchResult> {
        self.results
            .iter()
            .find(|r| r.kind == IntentKind::ValueTransfer)
    }

    /// The result that ended the request, if it did not complete.
    pub fn failure(&self) -> Option<&DispatchResult> {
        self.results.iter().find(|r| !r.is_accepted())
    }
}

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// Reasons `dispatch` refuses a request outright, before or instead of
/// producing a [`DispatchReport`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request failed shape validation. No nonce consumed, no ledger
    /// call made.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] AgreementError),

    /// Burned nonces are outstanding under the `halt` gap policy.
    #[error("dispatcher halted: {burned} burned nonce(s) outstanding, resync required")]
    SequencerHalted { burned: usize },

    /// The registration call could not be signed after its nonce was drawn.
    /// The nonce is burned and nothing was registered. A signing failure on
    /// the transfer is reported inside the [`DispatchReport`] instead.
    #[error("signing failed: {0}")]
    Signing(#[from] KeyError),
}
