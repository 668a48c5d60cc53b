//! # Transaction Module
//!
//! Construction and signing of the two legacy EVM transactions every
//! agreement produces.
//!
//! ## Architecture
//!
//! ```text
//! types.rs   Intent kinds and the immutable TransactionIntent
//! builder.rs createAgreement calldata, TransactionBuilder, IntentBuilder
//! signing.rs RLP encoding, EIP-155/Homestead signing, SignedTransaction
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Draft**: [`IntentBuilder`] turns a validated request and a gas
//!    price quote into a [`TransactionBuilder`].
//! 2. **Finalize**: the sequencer's nonce is bound with
//!    [`TransactionBuilder::finalize`].
//! 3. **Sign**: [`sign_intent`] produces the broadcast bytes and hash.
//! 4. **Submit**: the dispatcher hands the [`SignedTransaction`] to a
//!    [`LedgerClient`](crate::ledger::LedgerClient) exactly once.

pub mod builder;
pub mod signing;
pub mod types;

pub use builder::{encode_create_agreement, IntentBuilder, TransactionBuilder};
pub use signing::{sign_intent, SignedTransaction};
pub use types::{IntentKind, TransactionIntent};
