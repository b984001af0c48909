//! Canonical leaf encoding for both address schemes.
//!
//! A leaf is `keccak256(normalized_address || amount)` where both halves are the
//! ASCII bytes of their string forms, concatenated without a separator. The amount
//! is validated as canonical decimal digits so the concatenation stays unambiguous.

use serde::{Deserialize, Serialize};

use crate::{keccak256, strip_hex_prefix, Hash};

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32_MAX_LEN: usize = 90;
const BECH32_MIN_DATA_LEN: usize = 6;
const FOREIGN_ADDRESS_HEX_LEN: usize = 40;

/// One entitlement as supplied by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantRecord {
    pub address: String,
    pub amount: String,
}

impl ClaimantRecord {
    pub fn new(address: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            amount: amount.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClaimantError {
    #[error("invalid claimant {address}: {reason}")]
    InvalidClaimant { address: String, reason: String },
}

impl ClaimantError {
    fn new(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidClaimant {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Which population a scheme encodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    Native,
    Foreign,
}

/// Address-scheme capability injected into tree building and proof lookup.
pub trait LeafScheme: Send + Sync {
    fn kind(&self) -> SchemeKind;

    /// Canonical address form that is hashed and compared.
    fn normalize_address(&self, address: &str) -> Result<String, ClaimantError>;

    fn encode(&self, record: &ClaimantRecord) -> Result<Hash, ClaimantError> {
        let address = self.normalize_address(&record.address)?;
        validate_amount(&record.address, &record.amount)?;
        let mut preimage = Vec::with_capacity(address.len() + record.amount.len());
        preimage.extend_from_slice(address.as_bytes());
        preimage.extend_from_slice(record.amount.as_bytes());
        Ok(keccak256(&preimage))
    }
}

/// Addresses native to the deploying chain (bech32-like, e.g. `terra1...`).
#[derive(Clone, Debug, Default)]
pub struct NativeScheme {
    prefix: Option<String>,
}

impl NativeScheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additionally require the human-readable part to equal `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into().to_ascii_lowercase()),
        }
    }
}

impl LeafScheme for NativeScheme {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Native
    }

    // Structure and charset only; checksum validity is the chain's concern.
    fn normalize_address(&self, address: &str) -> Result<String, ClaimantError> {
        let normalized = address.trim().to_ascii_lowercase();
        if normalized.is_empty() || normalized.len() > BECH32_MAX_LEN {
            return Err(ClaimantError::new(address, "bech32 address length out of range"));
        }
        if !normalized.is_ascii() {
            return Err(ClaimantError::new(address, "non-ascii characters in address"));
        }
        let sep = normalized
            .rfind('1')
            .ok_or_else(|| ClaimantError::new(address, "missing bech32 separator"))?;
        let (hrp, data) = (&normalized[..sep], &normalized[sep + 1..]);
        if hrp.is_empty() || !hrp.bytes().all(|b| (33..=126).contains(&b)) {
            return Err(ClaimantError::new(address, "invalid human-readable prefix"));
        }
        if let Some(expected) = &self.prefix {
            if hrp != expected {
                return Err(ClaimantError::new(
                    address,
                    format!("expected prefix {expected}, got {hrp}"),
                ));
            }
        }
        if data.len() < BECH32_MIN_DATA_LEN {
            return Err(ClaimantError::new(address, "bech32 data part too short"));
        }
        if !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
            return Err(ClaimantError::new(address, "invalid bech32 data character"));
        }
        Ok(normalized)
    }
}

/// 20-byte addresses of the external ECDSA chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForeignScheme;

impl LeafScheme for ForeignScheme {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Foreign
    }

    fn normalize_address(&self, address: &str) -> Result<String, ClaimantError> {
        normalize_foreign_address(address)
    }
}

/// Lowercase hex without `0x`. Shared with signature verification.
pub fn normalize_foreign_address(address: &str) -> Result<String, ClaimantError> {
    let stripped = strip_hex_prefix(address.trim());
    if stripped.len() != FOREIGN_ADDRESS_HEX_LEN {
        return Err(ClaimantError::new(
            address,
            format!(
                "expected {FOREIGN_ADDRESS_HEX_LEN} hex chars, got {}",
                stripped.len()
            ),
        ));
    }
    if !stripped.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ClaimantError::new(address, "invalid hex character"));
    }
    Ok(stripped.to_ascii_lowercase())
}

/// Canonical non-negative decimal that fits in `u128`.
pub fn validate_amount(address: &str, amount: &str) -> Result<u128, ClaimantError> {
    if amount.is_empty() {
        return Err(ClaimantError::new(address, "empty amount"));
    }
    if !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClaimantError::new(
            address,
            format!("amount is not a decimal integer: {amount}"),
        ));
    }
    if amount.len() > 1 && amount.starts_with('0') {
        return Err(ClaimantError::new(
            address,
            format!("amount has leading zeros: {amount}"),
        ));
    }
    amount
        .parse::<u128>()
        .map_err(|_| ClaimantError::new(address, format!("amount overflows u128: {amount}")))
}
