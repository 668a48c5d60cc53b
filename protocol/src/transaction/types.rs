//! Core type definitions for dispatched transactions.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// IntentKind
// ---------------------------------------------------------------------------

/// The two kinds of transaction the service issues, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// `createAgreement(agreement, account)` on the registry contract.
    ContractCall,
    /// Native-currency disbursement to the counterparty.
    ValueTransfer,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContractCall => write!(f, "contract_call"),
            Self::ValueTransfer => write!(f, "value_transfer"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionIntent
// ---------------------------------------------------------------------------

/// A fully specified, unsigned legacy transaction.
///
/// Produced by [`TransactionBuilder::finalize`](super::TransactionBuilder::finalize)
/// once the sequencer has assigned a nonce. Fields are read-only from the
/// outside so the nonce cannot drift after assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub(crate) kind: IntentKind,
    pub(crate) to: Address,
    pub(crate) value: U256,
    pub(crate) gas_limit: u64,
    pub(crate) gas_price: U256,
    pub(crate) data: Option<Bytes>,
    pub(crate) nonce: u64,
}

impl TransactionIntent {
    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    pub fn to(&self) -> Address {
        self.to
    }

    /// Wei transferred with the transaction.
    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Wei per unit of gas.
    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    /// Calldata, `None` for plain transfers.
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Worst-case cost to the sender: `value + gas_limit * gas_price`.
    pub fn max_cost(&self) -> U256 {
        self.value
            .saturating_add(self.gas_price.saturating_mul(U256::from(self.gas_limit)))
    }
}
