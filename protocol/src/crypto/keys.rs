//! # Key Management
//!
//! secp256k1 keypair for the service's single signing identity.
//!
//! The key arrives as hex at startup and lives in memory for the lifetime of
//! the process. It is never serialized, never logged, and never leaves this
//! module except as signatures.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while loading or using key material.
///
/// Messages never echo key bytes back.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 bytes of hex")]
    InvalidEncoding,

    #[error("invalid secret key: not a valid secp256k1 scalar")]
    InvalidScalar,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("chain id {0} is too large for an EIP-155 signature")]
    ChainIdOutOfRange(u64),
}

/// An ECDSA signature with its recovery id, split the way legacy EVM
/// transactions carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// Big-endian `r` scalar.
    pub r: B256,
    /// Big-endian `s` scalar, low-S normalized.
    pub s: B256,
    /// Recovery id, `0` or `1`.
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// Recovers the signer's address from a Keccak-256 prehash.
    ///
    /// Returns `None` if the signature does not verify against any key.
    pub fn recover_address(&self, prehash: &B256) -> Option<Address> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(self.r.as_slice());
        bytes[32..].copy_from_slice(self.s.as_slice());
        let signature = Signature::from_slice(&bytes).ok()?;
        let recovery_id = RecoveryId::from_byte(self.recovery_id)?;
        let key =
            VerifyingKey::recover_from_prehash(prehash.as_slice(), &signature, recovery_id).ok()?;
        Some(address_of(&key))
    }
}

/// The service's signing keypair.
///
/// `Debug` prints the address only.
pub struct LedgerKeypair {
    signing_key: SigningKey,
    address: Address,
}

impl LedgerKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Loads a keypair from a hex-encoded 32-byte secret, with or without a
    /// `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidEncoding)?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidEncoding);
        }
        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The EVM address controlled by this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs `message` by hashing it with Keccak-256 first.
    ///
    /// Deterministic: the same key and message always yield the same
    /// signature (RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, KeyError> {
        let digest = Keccak256::new_with_prefix(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_digest_recoverable(digest)
            .map_err(|e| KeyError::SigningFailed(e.to_string()))?;

        let bytes = signature.to_bytes();
        Ok(RecoverableSignature {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..]),
            recovery_id: recovery_id.to_byte(),
        })
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerKeypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Derives the EVM address for a public key: the last 20 bytes of the
/// Keccak-256 of the uncompressed point, without its `0x04` prefix.
fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
