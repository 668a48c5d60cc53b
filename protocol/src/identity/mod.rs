//! # Identity Module
//!
//! The single signing identity this service issues transactions as: a
//! secp256k1 keypair plus the nonce counter that orders everything it signs.
//!
//! One per process. The [`Identity`] owns its [`NonceSequencer`] outright;
//! nothing else in the crate can construct one bound to the same key, so
//! there is exactly one source of nonces for the address.

pub mod sequencer;

pub use sequencer::{BurnedNonce, NonceSequencer};

use alloy_primitives::Address;

use crate::crypto::{KeyError, LedgerKeypair, RecoverableSignature};

/// A signing credential bound to its nonce counter.
#[derive(Debug)]
pub struct Identity {
    keypair: LedgerKeypair,
    sequencer: NonceSequencer,
    /// Signatures left before an injected failure.
    #[cfg(any(test, feature = "test-util"))]
    signing_fault: parking_lot::Mutex<Option<usize>>,
}

impl Identity {
    /// Binds `keypair` to a sequencer seeded at `start_nonce`, normally the
    /// node's pending transaction count for the key's address.
    pub fn new(keypair: LedgerKeypair, start_nonce: u64) -> Self {
        Self {
            keypair,
            sequencer: NonceSequencer::new(start_nonce),
            #[cfg(any(test, feature = "test-util"))]
            signing_fault: parking_lot::Mutex::new(None),
        }
    }

    /// The address transactions are sent from.
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// The nonce counter.
    pub fn sequencer(&self) -> &NonceSequencer {
        &self.sequencer
    }

    /// Signs a message with the identity's key (Keccak-256 prehash).
    pub fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, KeyError> {
        #[cfg(any(test, feature = "test-util"))]
        {
            let mut fault = self.signing_fault.lock();
            match fault.as_mut() {
                Some(0) => {
                    *fault = None;
                    return Err(KeyError::SigningFailed("injected fault".into()));
                }
                Some(remaining) => *remaining -= 1,
                None => {}
            }
        }
        self.keypair.sign(message)
    }

    /// Lets `successes` more signatures through, then fails exactly one.
    #[cfg(any(test, feature = "test-util"))]
    pub fn fail_signing_after(&self, successes: usize) {
        *self.signing_fault.lock() = Some(successes);
    }
}
