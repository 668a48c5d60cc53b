//! Transaction construction via the builder pattern.
//!
//! Construction is split in two so that the nonce is the very last thing
//! bound to a transaction:
//!
//! 1. [`IntentBuilder`] applies deployment policy (contract address, gas
//!    limits, disbursement) to a validated request and a gas-price quote,
//!    yielding a [`TransactionBuilder`] with every field but the nonce.
//! 2. [`TransactionBuilder::finalize`] binds the sequencer-assigned nonce
//!    and produces an immutable [`TransactionIntent`].
//!
//! Nothing here touches the network or key material, which keeps it
//! testable in isolation.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

use super::types::{IntentKind, TransactionIntent};
use crate::agreement::ValidatedAgreement;
use crate::config::DispatchConfig;

sol! {
    /// Registration entry point of the deployed agreement registry.
    function createAgreement(string agreement, address account);
}

/// ABI-encodes the `createAgreement(agreement, account)` calldata.
pub fn encode_create_agreement(agreement: &str, account: Address) -> Bytes {
    createAgreementCall {
        agreement: agreement.to_string(),
        account,
    }
    .abi_encode()
    .into()
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for a [`TransactionIntent`], minus the nonce.
///
/// ```rust
/// use accord_protocol::transaction::{IntentKind, TransactionBuilder};
/// use alloy_primitives::{Address, U256};
///
/// let intent = TransactionBuilder::new(IntentKind::ValueTransfer)
///     .to(Address::repeat_byte(0xab))
///     .value(U256::from(100_000u64))
///     .gas_limit(21_000)
///     .gas_price(U256::from(1_000_000_000u64))
///     .finalize(7);
/// assert_eq!(intent.nonce(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBuilder {
    kind: IntentKind,
    to: Address,
    value: U256,
    gas_limit: u64,
    gas_price: U256,
    data: Option<Bytes>,
}

impl TransactionBuilder {
    /// Creates a builder for the given kind with zero value, zero gas, and
    /// no calldata.
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            to: Address::ZERO,
            value: U256::ZERO,
            gas_limit: 0,
            gas_price: U256::ZERO,
            data: None,
        }
    }

    /// Sets the recipient (the contract for calls, the counterparty for
    /// transfers).
    pub fn to(mut self, to: Address) -> Self {
        self.to = to;
        self
    }

    /// Sets the value in wei.
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the gas price in wei per gas.
    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Attaches calldata.
    pub fn data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    /// Binds `nonce` and produces the immutable intent.
    pub fn finalize(self, nonce: u64) -> TransactionIntent {
        TransactionIntent {
            kind: self.kind,
            to: self.to,
            value: self.value,
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
            data: self.data,
            nonce,
        }
    }
}

// ---------------------------------------------------------------------------
// IntentBuilder
// ---------------------------------------------------------------------------

/// Applies deployment policy to produce the two per-request drafts.
#[derive(Debug, Clone, Copy)]
pub struct IntentBuilder<'a> {
    config: &'a DispatchConfig,
}

impl<'a> IntentBuilder<'a> {
    pub fn new(config: &'a DispatchConfig) -> Self {
        Self { config }
    }

    /// Draft of the registration call: `createAgreement(agreement, account)`
    /// on the configured contract, zero value, fixed gas headroom.
    pub fn contract_call(
        &self,
        request: &ValidatedAgreement,
        gas_price: U256,
    ) -> TransactionBuilder {
        TransactionBuilder::new(IntentKind::ContractCall)
            .to(self.config.contract)
            .value(U256::ZERO)
            .gas_limit(self.config.call_gas_limit)
            .gas_price(gas_price)
            .data(encode_create_agreement(request.agreement(), request.account()))
    }

    /// Draft of the funding transfer to the counterparty, sized by the
    /// disbursement policy at `gas_price`. No calldata.
    pub fn value_transfer(
        &self,
        request: &ValidatedAgreement,
        gas_price: U256,
    ) -> TransactionBuilder {
        TransactionBuilder::new(IntentKind::ValueTransfer)
            .to(request.account())
            .value(self.config.disbursement.amount(gas_price))
            .gas_limit(self.config.transfer_gas_limit)
            .gas_price(gas_price)
    }

    /// Both drafts, in submission order, priced at the same quote.
    ///
    /// The dispatcher prices each draft separately at submission time; this
    /// is the whole-request view used for previews and tests.
    pub fn build(
        &self,
        request: &ValidatedAgreement,
        gas_price: U256,
    ) -> (TransactionBuilder, TransactionBuilder) {
        (
            self.contract_call(request, gas_price),
            self.value_transfer(request, gas_price),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::AgreementRequest;
    use crate::config::DisbursementPolicy;
    use crate::crypto::keccak256;

    const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

    fn config() -> DispatchConfig {
        DispatchConfig::new(Address::repeat_byte(0xcc))
    }

    fn request() -> ValidatedAgreement {
        AgreementRequest::new(ACCOUNT, "terms-v1").validate().unwrap()
    }

    #[test]
    fn selector_matches_signature() {
        let expected = keccak256(b"createAgreement(string,address)");
        assert_eq!(createAgreementCall::SELECTOR, expected[..4]);
    }

    #[test]
    fn calldata_layout() {
        let account: Address = ACCOUNT.parse().unwrap();
        let data = encode_create_agreement("terms-v1", account);
        // selector + string offset + address + string length + one padded word
        assert_eq!(data.len(), 4 + 32 * 4);
        assert_eq!(&data[..4], &createAgreementCall::SELECTOR[..]);
        // Head word 1: offset of the dynamic string (0x40).
        assert_eq!(data[4 + 31], 0x40);
        // Head word 2: the address, left-padded.
        assert_eq!(&data[4 + 32 + 12..4 + 64], account.as_slice());
        // Tail: length then bytes.
        assert_eq!(data[4 + 64 + 31], 8);
        assert_eq!(&data[4 + 96..4 + 96 + 8], b"terms-v1");
    }

    #[test]
    fn calldata_roundtrips_through_abi_decoder() {
        let account: Address = ACCOUNT.parse().unwrap();
        let data = encode_create_agreement("terms-v1", account);
        let decoded = createAgreementCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.agreement, "terms-v1");
        assert_eq!(decoded.account, account);
    }

    #[test]
    fn contract_call_draft_targets_contract_with_zero_value() {
        let cfg = config();
        let intent = IntentBuilder::new(&cfg)
            .contract_call(&request(), U256::from(7u64))
            .finalize(5);

        assert_eq!(intent.kind(), IntentKind::ContractCall);
        assert_eq!(intent.to(), cfg.contract);
        assert_eq!(intent.value(), U256::ZERO);
        assert_eq!(intent.gas_limit(), 200_000);
        assert_eq!(intent.gas_price(), U256::from(7u64));
        assert_eq!(intent.nonce(), 5);
        assert!(intent.data().is_some());
    }

    #[test]
    fn value_transfer_draft_funds_counterparty_without_data() {
        let cfg = config();
        let intent = IntentBuilder::new(&cfg)
            .value_transfer(&request(), U256::from(3u64))
            .finalize(6);

        assert_eq!(intent.kind(), IntentKind::ValueTransfer);
        assert_eq!(intent.to(), ACCOUNT.parse::<Address>().unwrap());
        assert_eq!(intent.value(), U256::from(100_000u64));
        assert_eq!(intent.gas_limit(), 21_000);
        assert!(intent.data().is_none());
    }

    #[test]
    fn cover_gas_policy_scales_disbursement() {
        let mut cfg = config();
        cfg.disbursement = DisbursementPolicy::CoverGas {
            floor: U256::from(1u64),
            gas_units: 50_000,
        };
        let intent = IntentBuilder::new(&cfg)
            .value_transfer(&request(), U256::from(10u64))
            .finalize(0);
        assert_eq!(intent.value(), U256::from(500_000u64));
    }

    #[test]
    fn build_returns_drafts_in_submission_order() {
        let cfg = config();
        let (first, second) = IntentBuilder::new(&cfg).build(&request(), U256::from(1u64));
        assert_eq!(first.kind(), IntentKind::ContractCall);
        assert_eq!(second.kind(), IntentKind::ValueTransfer);
    }
}
