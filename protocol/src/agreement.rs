//! Inbound agreement requests and their shape validation.
//!
//! The HTTP layer only parses JSON; presence and address checks run inside
//! [`Dispatcher::dispatch`](crate::dispatch::Dispatcher::dispatch) before any
//! ledger call. Only a [`ValidatedAgreement`] can reach the transaction
//! builder.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_AGREEMENT_BYTES;

/// Why a request was refused before any ledger interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgreementError {
    #[error("account must be set")]
    MissingAccount,

    #[error("agreement must be set")]
    MissingAgreement,

    #[error("account is not a valid ledger address: {0}")]
    InvalidAccount(String),

    #[error("agreement is {len} bytes, limit is {max}")]
    AgreementTooLong { len: usize, max: usize },
}

/// A registration request as received.
///
/// Missing JSON fields deserialize as empty strings so that "absent" and
/// "empty" are rejected by the same rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementRequest {
    /// Counterparty address, `0x`-prefixed hex.
    #[serde(default)]
    pub account: String,
    /// Agreement text registered on-chain.
    #[serde(default)]
    pub agreement: String,
}

impl AgreementRequest {
    /// Convenience constructor.
    pub fn new(account: impl Into<String>, agreement: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            agreement: agreement.into(),
        }
    }

    /// Checks presence, address shape, and size.
    pub fn validate(&self) -> Result<ValidatedAgreement, AgreementError> {
        let account = self.account.trim();
        if account.is_empty() {
            return Err(AgreementError::MissingAccount);
        }
        if self.agreement.is_empty() {
            return Err(AgreementError::MissingAgreement);
        }
        if self.agreement.len() > MAX_AGREEMENT_BYTES {
            return Err(AgreementError::AgreementTooLong {
                len: self.agreement.len(),
                max: MAX_AGREEMENT_BYTES,
            });
        }

        let address = parse_address(account)?;
        Ok(ValidatedAgreement {
            account: address,
            agreement: self.agreement.clone(),
        })
    }
}

/// A request that passed validation. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAgreement {
    account: Address,
    agreement: String,
}

impl ValidatedAgreement {
    /// The counterparty.
    pub fn account(&self) -> Address {
        self.account
    }

    /// The agreement text.
    pub fn agreement(&self) -> &str {
        &self.agreement
    }
}

/// Parses a 20-byte hex address. The `0x` prefix is optional; mixed case is
/// accepted without enforcing the EIP-55 checksum.
fn parse_address(raw: &str) -> Result<Address, AgreementError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.len() != 40 {
        return Err(AgreementError::InvalidAccount(raw.to_string()));
    }
    raw.parse::<Address>()
        .map_err(|_| AgreementError::InvalidAccount(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn valid_request_passes() {
        let v = AgreementRequest::new(ACCOUNT, "terms-v1").validate().unwrap();
        assert_eq!(v.account(), ACCOUNT.parse::<Address>().unwrap());
        assert_eq!(v.agreement(), "terms-v1");
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert_eq!(
            AgreementRequest::new("", "terms").validate(),
            Err(AgreementError::MissingAccount)
        );
        assert_eq!(
            AgreementRequest::new("   ", "terms").validate(),
            Err(AgreementError::MissingAccount)
        );
        assert_eq!(
            AgreementRequest::new(ACCOUNT, "").validate(),
            Err(AgreementError::MissingAgreement)
        );
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        let too_long = format!("{ACCOUNT}00");
        for bad in [
            "0x1234",
            "hello",
            "0xZZ11111111111111111111111111111111111111",
            too_long.as_str(),
        ] {
            assert!(
                matches!(
                    AgreementRequest::new(bad, "terms").validate(),
                    Err(AgreementError::InvalidAccount(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn prefix_is_optional() {
        let bare = ACCOUNT.trim_start_matches("0x");
        assert!(AgreementRequest::new(bare, "terms").validate().is_ok());
    }

    #[test]
    fn oversized_agreement_is_rejected() {
        let text = "x".repeat(MAX_AGREEMENT_BYTES + 1);
        assert!(matches!(
            AgreementRequest::new(ACCOUNT, text).validate(),
            Err(AgreementError::AgreementTooLong { .. })
        ));
    }

    #[test]
    fn missing_json_fields_default_to_empty() {
        let req: AgreementRequest = serde_json::from_str(r#"{"account":"0x11"}"#).unwrap();
        assert_eq!(req.agreement, "");
        assert_eq!(req.validate(), Err(AgreementError::MissingAgreement));
    }
}
