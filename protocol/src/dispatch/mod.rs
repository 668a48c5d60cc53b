//! # Dispatch Module
//!
//! Turns one agreement request into two ordered ledger submissions from the
//! service identity.
//!
//! ## Per-request flow
//!
//! 1. Validate the request (no side effects on failure).
//! 2. Refuse if burned nonces are outstanding under [`GapPolicy::Halt`].
//! 3. Contract call: quote gas, draw nonce, finalize, sign, submit.
//! 4. Only if the call was accepted: same again for the value transfer.
//!
//! The nonce is drawn after the gas quote, so a failed quote costs nothing.
//! Once drawn, a nonce is spent: a rejected or timed-out submission burns
//! it and it is never handed out again short of an operator resync.
//!
//! ## Concurrency
//!
//! [`Dispatcher`] is shared as `Arc<Dispatcher>`. Requests run concurrently;
//! the only coordination point is the sequencer's atomic counter. Within a
//! request the call resolves before the transfer is built.

pub mod report;

pub use report::{DispatchError, DispatchReport, DispatchResult, DispatchStage, Outcome};

use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agreement::{AgreementRequest, ValidatedAgreement};
use crate::config::{DisbursementPolicy, DispatchConfig, GapPolicy};
use crate::identity::{BurnedNonce, Identity};
use crate::ledger::{LedgerClient, LedgerError, RejectReason};
use crate::transaction::{sign_intent, IntentBuilder, IntentKind, TransactionBuilder};

/// Snapshot of the dispatcher for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherStatus {
    pub address: Address,
    pub contract: Address,
    pub chain_id: Option<u64>,
    pub next_nonce: u64,
    pub burned: Vec<BurnedNonce>,
    pub halted: bool,
    pub gap_policy: GapPolicy,
    pub disbursement: DisbursementPolicy,
}

/// Outcome of an operator resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncReport {
    /// Counter value before the resync.
    pub previous: u64,
    /// Pending nonce observed on the node, now the next value handed out.
    pub current: u64,
    /// Burned entries that were cleared.
    pub cleared: Vec<BurnedNonce>,
}

/// The dispatch core.
pub struct Dispatcher {
    identity: Identity,
    ledger: Arc<dyn LedgerClient>,
    config: DispatchConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(identity: Identity, ledger: Arc<dyn LedgerClient>, config: DispatchConfig) -> Self {
        Self {
            identity,
            ledger,
            config,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Returns `true` if new requests are currently refused.
    pub fn is_halted(&self) -> bool {
        self.config.gap_policy == GapPolicy::Halt && self.identity.sequencer().has_gaps()
    }

    pub fn status(&self) -> DispatcherStatus {
        let sequencer = self.identity.sequencer();
        DispatcherStatus {
            address: self.identity.address(),
            contract: self.config.contract,
            chain_id: self.config.chain_id,
            next_nonce: sequencer.peek(),
            burned: sequencer.burned(),
            halted: self.is_halted(),
            gap_policy: self.config.gap_policy,
            disbursement: self.config.disbursement,
        }
    }

    /// Registers the agreement and funds the counterparty.
    ///
    /// Returns `Err` only when nothing was submitted for the request (or, for
    /// [`DispatchError::Signing`], when the call's drawn nonce could not be
    /// signed).
    /// Ledger-side failures are reported inside the [`DispatchReport`].
    pub async fn dispatch(
        &self,
        request: &AgreementRequest,
    ) -> Result<DispatchReport, DispatchError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, stage = ?DispatchStage::Received, "agreement request received");

        let validated = request.validate().map_err(|err| {
            debug!(%request_id, error = %err, "agreement request rejected");
            DispatchError::InvalidRequest(err)
        })?;
        debug!(
            %request_id,
            stage = ?DispatchStage::Validated,
            account = %validated.account(),
            "agreement request validated"
        );

        if self.is_halted() {
            let burned = self.identity.sequencer().burned().len();
            warn!(%request_id, burned, "refusing request: sequencer halted");
            return Err(DispatchError::SequencerHalted { burned });
        }

        let builder = IntentBuilder::new(&self.config);
        let mut results = Vec::with_capacity(2);

        let call = self
            .submit(request_id, IntentKind::ContractCall, &validated, |v, price| {
                builder.contract_call(v, price)
            })
            .await?;
        let call_accepted = call.is_accepted();
        results.push(call);

        if !call_accepted {
            return Ok(self.finish(request_id, DispatchStage::CallFailed, results));
        }
        debug!(%request_id, stage = ?DispatchStage::CallAccepted, "proceeding to transfer");

        let transfer = self
            .submit(request_id, IntentKind::ValueTransfer, &validated, |v, price| {
                builder.value_transfer(v, price)
            })
            .await?;
        let stage = if transfer.is_accepted() {
            DispatchStage::TransferAccepted
        } else {
            DispatchStage::TransferFailed
        };
        results.push(transfer);

        Ok(self.finish(request_id, stage, results))
    }

    fn finish(
        &self,
        request_id: Uuid,
        stage: DispatchStage,
        results: Vec<DispatchResult>,
    ) -> DispatchReport {
        match stage {
            DispatchStage::TransferAccepted => {
                info!(%request_id, stage = ?stage, "agreement registered and funded")
            }
            _ => warn!(%request_id, stage = ?stage, "agreement dispatch incomplete"),
        }
        DispatchReport {
            request_id,
            stage,
            results,
        }
    }

    /// Quote, draw nonce, finalize, sign, submit.
    async fn submit<F>(
        &self,
        request_id: Uuid,
        kind: IntentKind,
        request: &ValidatedAgreement,
        draft: F,
    ) -> Result<DispatchResult, DispatchError>
    where
        F: FnOnce(&ValidatedAgreement, U256) -> TransactionBuilder,
    {
        let timeout = self.config.submit_timeout;

        let gas_price = match tokio::time::timeout(timeout, self.ledger.estimate_gas_price()).await
        {
            Ok(Ok(price)) => price,
            Ok(Err(err)) => return Ok(self.quote_failed(request_id, kind, err)),
            Err(_) => return Ok(self.quote_failed(request_id, kind, LedgerError::Timeout(timeout))),
        };

        let sequencer = self.identity.sequencer();
        let nonce = sequencer.next();
        let intent = draft(request, gas_price).finalize(nonce);

        let signed = match sign_intent(intent, &self.identity, self.config.chain_id) {
            Ok(signed) => signed,
            Err(err) => {
                error!(%request_id, %kind, nonce, error = %err, "signing failed; nonce burned");
                sequencer.mark_burned(nonce, format!("signing failed: {err}"), false);
                // After an accepted call the report must keep the call's hash.
                return match kind {
                    IntentKind::ContractCall => Err(DispatchError::Signing(err)),
                    IntentKind::ValueTransfer => {
                        Ok(DispatchResult::signing_failed(kind, nonce, &err))
                    }
                };
            }
        };

        let submitted = match kind {
            IntentKind::ContractCall => DispatchStage::CallSubmitted,
            IntentKind::ValueTransfer => DispatchStage::TransferSubmitted,
        };
        debug!(
            %request_id,
            %kind,
            nonce,
            tx_hash = %signed.hash(),
            stage = ?submitted,
            "submitting transaction"
        );

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, self.ledger.submit(&signed))
            .await
            .unwrap_or(Err(LedgerError::Timeout(timeout)));
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(tx_hash) => {
                info!(%request_id, %kind, nonce, %tx_hash, elapsed_ms, "transaction accepted");
                Ok(DispatchResult::accepted(kind, nonce, tx_hash, elapsed_ms))
            }
            Err(err) => {
                let reason = err.reason();
                warn!(%request_id, %kind, nonce, %reason, error = %err, "transaction rejected");
                sequencer.mark_burned(nonce, err.to_string(), reason == RejectReason::Timeout);
                Ok(DispatchResult::rejected(kind, Some(nonce), &err, elapsed_ms))
            }
        }
    }

    fn quote_failed(&self, request_id: Uuid, kind: IntentKind, err: LedgerError) -> DispatchResult {
        warn!(
            %request_id,
            %kind,
            reason = %err.reason(),
            error = %err,
            "gas price quote failed; no nonce drawn"
        );
        DispatchResult::rejected(kind, None, &err, 0)
    }

    /// Re-reads the identity's pending nonce from the node and resets the
    /// sequencer to it, clearing the burned ledger.
    ///
    /// Call only while no requests are in flight; a submission racing the
    /// reset may reuse a nonce and be rejected as `nonce-too-low`.
    pub async fn resync(&self) -> Result<ResyncReport, LedgerError> {
        let observed = self.ledger.current_nonce(self.identity.address()).await?;
        let (previous, cleared) = self.identity.sequencer().resync(observed);
        Ok(ResyncReport {
            previous,
            current: observed,
            cleared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LedgerKeypair;
    use crate::ledger::MemoryLedger;

    const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

    fn dispatcher(start: u64) -> (Dispatcher, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let identity = Identity::new(LedgerKeypair::generate(), start);
        let config = DispatchConfig::new(Address::repeat_byte(0xcc));
        (Dispatcher::new(identity, ledger.clone(), config), ledger)
    }

    #[tokio::test]
    async fn happy_path_uses_consecutive_nonces() {
        let (d, ledger) = dispatcher(5);
        let report = d
            .dispatch(&AgreementRequest::new(ACCOUNT, "terms-v1"))
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.call().unwrap().nonce, Some(5));
        assert_eq!(report.transfer().unwrap().nonce, Some(6));
        assert_eq!(ledger.submitted().len(), 2);
        assert_eq!(d.identity().sequencer().peek(), 7);
    }

    #[tokio::test]
    async fn invalid_request_touches_nothing() {
        let (d, ledger) = dispatcher(0);
        let err = d
            .dispatch(&AgreementRequest::new("", "terms"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::InvalidRequest(_)));
        assert_eq!(ledger.calls().total(), 0);
        assert_eq!(d.identity().sequencer().peek(), 0);
    }

    #[tokio::test]
    async fn failed_quote_consumes_no_nonce() {
        let (d, ledger) = dispatcher(3);
        ledger.fail_next_gas_price(LedgerError::Network("connection refused".into()));

        let report = d
            .dispatch(&AgreementRequest::new(ACCOUNT, "terms"))
            .await
            .unwrap();

        assert_eq!(report.stage, DispatchStage::CallFailed);
        assert_eq!(report.call().unwrap().nonce, None);
        assert_eq!(report.call().unwrap().reason(), Some(RejectReason::Network));
        assert_eq!(d.identity().sequencer().peek(), 3);
        assert!(!d.is_halted());
        assert_eq!(ledger.calls().submit, 0);
    }

    #[tokio::test]
    async fn status_reflects_sequencer() {
        let (d, _) = dispatcher(11);
        let status = d.status();
        assert_eq!(status.next_nonce, 11);
        assert!(!status.halted);
        assert!(status.burned.is_empty());
        assert_eq!(status.address, d.identity().address());
    }
}
