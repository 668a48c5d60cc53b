// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Accord Protocol: Dispatch Core
//!
//! Accord registers bilateral agreements on an EVM ledger and funds the
//! counterparty so it can countersign. Every accepted request turns into
//! exactly two transactions from one signing identity, in a fixed order:
//! a `createAgreement` contract call, then a small native-currency transfer.
//!
//! The interesting part is not the HTTP surface (that lives in `accord-node`)
//! but keeping one identity's nonce stream strictly ordered while many
//! requests race for it against a node that is slow, priced, and fallible.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants and the immutable dispatch settings.
//! - **crypto**: secp256k1 keys, Keccak-256, address derivation.
//! - **identity**: The signing identity and its [`NonceSequencer`].
//! - **agreement**: Inbound request model and shape validation.
//! - **transaction**: Intents, the two-phase builder, legacy RLP signing.
//! - **ledger**: The [`LedgerClient`] boundary and its JSON-RPC client.
//! - **dispatch**: The per-request state machine tying it all together.
//!
//! ## Ground rules
//!
//! 1. A nonce is handed out once. Never twice, not even after a failure.
//! 2. The transfer never goes out unless the registration was accepted.
//! 3. Nothing retries behind the caller's back.
//!
//! [`NonceSequencer`]: identity::NonceSequencer
//! [`LedgerClient`]: ledger::LedgerClient

pub mod agreement;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod identity;
pub mod ledger;
pub mod transaction;
