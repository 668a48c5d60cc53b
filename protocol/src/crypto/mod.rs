//! # Cryptographic Primitives
//!
//! Everything the dispatch core needs to speak to an EVM ledger:
//!
//! - **secp256k1 ECDSA** for transaction signatures (RFC 6979 deterministic
//!   nonces, low-S normalized, recoverable).
//! - **Keccak-256** for transaction hashes and address derivation.
//!
//! Both are thin wrappers over `k256` and `sha3`. No curve arithmetic
//! happens in this crate.

pub mod hash;
pub mod keys;

pub use hash::keccak256;
pub use keys::{KeyError, LedgerKeypair, RecoverableSignature};
