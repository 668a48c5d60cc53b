//! Legacy (type-0) transaction encoding and signing.
//!
//! The canonical encoding is RLP over
//! `[nonce, gasPrice, gasLimit, to, value, data]`, extended with
//! `[chainId, 0, 0]` when signing under EIP-155. The signature covers the
//! Keccak-256 of that payload; the broadcast form replaces the trailing
//! fields with `[v, r, s]`:
//!
//! - Homestead: `v = 27 + recovery_id`
//! - EIP-155:   `v = chain_id * 2 + 35 + recovery_id`
//!
//! The transaction hash the node reports back is the Keccak-256 of the
//! broadcast bytes.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{BufMut, Encodable, Header};

use super::types::TransactionIntent;
use crate::crypto::{keccak256, KeyError, RecoverableSignature};
use crate::identity::Identity;

impl TransactionIntent {
    fn fields_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data_slice().length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data_slice().encode(out);
    }

    fn data_slice(&self) -> &[u8] {
        self.data.as_ref().map_or(&[][..], |data| &data[..])
    }

    /// The RLP payload the signature covers.
    pub fn signing_payload(&self, chain_id: Option<u64>) -> Vec<u8> {
        let mut payload_length = self.fields_length();
        if let Some(id) = chain_id {
            payload_length += id.length() + 0u8.length() * 2;
        }

        let mut out = Vec::with_capacity(payload_length + 3);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        if let Some(id) = chain_id {
            id.encode(&mut out);
            0u8.encode(&mut out);
            0u8.encode(&mut out);
        }
        out
    }

    /// Keccak-256 of [`signing_payload`](Self::signing_payload).
    pub fn signature_hash(&self, chain_id: Option<u64>) -> B256 {
        keccak256(&self.signing_payload(chain_id))
    }

    fn encode_signed(&self, v: u64, r: U256, s: U256) -> Vec<u8> {
        let payload_length = self.fields_length() + v.length() + r.length() + s.length();
        let mut out = Vec::with_capacity(payload_length + 3);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        v.encode(&mut out);
        r.encode(&mut out);
        s.encode(&mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// A signed intent, ready for `eth_sendRawTransaction`.
///
/// Submitted exactly once. There is no re-signing path: a new attempt is a
/// new intent with a new nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    intent: TransactionIntent,
    from: Address,
    chain_id: Option<u64>,
    signature: RecoverableSignature,
    v: u64,
    raw: Bytes,
    hash: B256,
}

impl SignedTransaction {
    pub fn intent(&self) -> &TransactionIntent {
        &self.intent
    }

    /// The identity that signed.
    pub fn from(&self) -> Address {
        self.from
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn signature(&self) -> &RecoverableSignature {
        &self.signature
    }

    /// The `v` value as encoded on the wire.
    pub fn v(&self) -> u64 {
        self.v
    }

    /// Broadcast encoding.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Transaction hash, `keccak256(raw)`.
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Recovers the signer from the signature. Equals [`from`](Self::from)
    /// for every transaction produced by [`sign_intent`].
    pub fn recover_signer(&self) -> Option<Address> {
        self.signature
            .recover_address(&self.intent.signature_hash(self.chain_id))
    }
}

/// Signs `intent` as `identity`.
///
/// Deterministic: the same identity, intent, and chain id always produce
/// byte-identical output.
pub fn sign_intent(
    intent: TransactionIntent,
    identity: &Identity,
    chain_id: Option<u64>,
) -> Result<SignedTransaction, KeyError> {
    let payload = intent.signing_payload(chain_id);
    let signature = identity.sign(&payload)?;

    let recovery = u64::from(signature.recovery_id);
    let v = match chain_id {
        Some(id) => id
            .checked_mul(2)
            .and_then(|doubled| doubled.checked_add(35 + recovery))
            .ok_or(KeyError::ChainIdOutOfRange(id))?,
        None => 27 + recovery,
    };

    let raw = intent.encode_signed(
        v,
        U256::from_be_bytes(signature.r.0),
        U256::from_be_bytes(signature.s.0),
    );
    let hash = keccak256(&raw);

    Ok(SignedTransaction {
        from: identity.address(),
        intent,
        chain_id,
        signature,
        v,
        raw: raw.into(),
        hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_CHAIN_ID;
    use crate::crypto::LedgerKeypair;
    use crate::transaction::{IntentKind, TransactionBuilder};

    fn identity(key: &str) -> Identity {
        Identity::new(LedgerKeypair::from_hex(key).unwrap(), 0)
    }

    #[test]
    fn eip155_reference_vector() {
        // The worked example from EIP-155.
        let id = identity(&"46".repeat(32));
        let intent = TransactionBuilder::new(IntentKind::ValueTransfer)
            .to(Address::repeat_byte(0x35))
            .value(U256::from(1_000_000_000_000_000_000u128))
            .gas_limit(21_000)
            .gas_price(U256::from(20_000_000_000u64))
            .finalize(9);

        assert_eq!(
            hex::encode(intent.signing_payload(Some(1))),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(intent.signature_hash(Some(1))),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );

        let signed = sign_intent(intent, &id, Some(1)).unwrap();
        assert_eq!(signed.v(), 37);
        assert_eq!(
            hex::encode(signed.raw()),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn value_transfer_signing_is_deterministic() {
        let id = identity(&"b4".repeat(32));
        let build = || {
            TransactionBuilder::new(IntentKind::ValueTransfer)
                .to("0xabcabcabcabcabcabcabcabcabcabcabcabcabca".parse().unwrap())
                .value(U256::from(100_000u64))
                .gas_limit(21_000)
                .gas_price(U256::from(1u64))
                .finalize(7)
        };

        let a = sign_intent(build(), &id, None).unwrap();
        let b = sign_intent(build(), &id, None).unwrap();
        assert_eq!(a.raw(), b.raw());
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.intent().nonce(), 7);
    }

    #[test]
    fn homestead_v_and_signer_recovery() {
        let id = Identity::new(LedgerKeypair::generate(), 0);
        let intent = TransactionBuilder::new(IntentKind::ContractCall)
            .to(Address::repeat_byte(0xcc))
            .gas_limit(200_000)
            .gas_price(U256::from(5u64))
            .data(Bytes::from_static(b"\x01\x02"))
            .finalize(3);

        let signed = sign_intent(intent, &id, None).unwrap();
        assert!(signed.v() == 27 || signed.v() == 28);
        assert_eq!(signed.from(), id.address());
        assert_eq!(signed.recover_signer(), Some(id.address()));
        assert_eq!(signed.hash(), keccak256(signed.raw()));
    }

    #[test]
    fn nonce_changes_encoding() {
        let id = Identity::new(LedgerKeypair::generate(), 0);
        let draft = TransactionBuilder::new(IntentKind::ValueTransfer)
            .to(Address::repeat_byte(0x11))
            .value(U256::from(1u64))
            .gas_limit(21_000);

        let a = sign_intent(draft.clone().finalize(1), &id, Some(31337)).unwrap();
        let b = sign_intent(draft.finalize(2), &id, Some(31337)).unwrap();
        assert_ne!(a.hash(), b.hash());
        assert!(a.v() >= 31337 * 2 + 35);
    }

    #[test]
    fn oversized_chain_id_is_an_error() {
        let id = Identity::new(LedgerKeypair::generate(), 0);
        let draft = TransactionBuilder::new(IntentKind::ValueTransfer)
            .to(Address::repeat_byte(0x11))
            .gas_limit(21_000);

        let err = sign_intent(draft.clone().finalize(0), &id, Some(u64::MAX)).unwrap_err();
        assert!(matches!(err, KeyError::ChainIdOutOfRange(u64::MAX)));

        let signed = sign_intent(draft.finalize(0), &id, Some(MAX_CHAIN_ID)).unwrap();
        assert!(signed.v() >= MAX_CHAIN_ID * 2 + 35);
    }

    #[test]
    fn empty_data_encodes_as_empty_string() {
        let intent = TransactionBuilder::new(IntentKind::ValueTransfer).finalize(0);
        let payload = intent.signing_payload(None);
        // Every field is zero/empty: nonce, price, limit -> 0x80; to -> 20
        // zero bytes; value -> 0x80; data -> 0x80.
        assert_eq!(*payload.last().unwrap(), 0x80);
        assert_eq!(payload[0], 0xc0 + (3 + 21 + 2) as u8);
    }
}
