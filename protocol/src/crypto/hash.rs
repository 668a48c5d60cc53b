//! Keccak-256, the hash the EVM uses for everything.
//!
//! Note this is the original Keccak submission, not NIST SHA3-256; the two
//! differ in padding and produce different digests.

use alloy_primitives::B256;
use sha3::{Digest, Keccak256};

/// Computes the Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> B256 {
    B256::from_slice(&Keccak256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_digest() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn function_selector_matches_known_value() {
        // transfer(address,uint256) -> a9059cbb
        let digest = keccak256(b"transfer(address,uint256)");
        assert_eq!(hex::encode(&digest[..4]), "a9059cbb");
    }
}
