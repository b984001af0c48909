//! Foreign-chain (EVM) claim signatures.
//!
//! A foreign claimant signs a message with `personal_sign` semantics. The claim
//! carries the 32-byte message hash and the 64-byte `r || s` signature. The
//! verifier recovers the signer from those two values and compares the derived
//! address with the claimed one.

use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, SecretKey, SECP256K1,
};
use serde::{Deserialize, Serialize};

use crate::{keccak256, leaf::normalize_foreign_address, strip_hex_prefix, Hash};

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";
const COMPACT_SIGNATURE_LEN: usize = 64;
const RECOVERABLE_SIGNATURE_LEN: usize = 65;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),
    #[error("invalid signed message hash: {0}")]
    InvalidMessageHash(String),
    #[error("invalid evm address: {0}")]
    InvalidAddress(String),
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
}

/// Output of signing one claim message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureBundle {
    pub message_hash: Hash,
    /// `r || s || v` with `v` in `{27, 28}`.
    pub signature: [u8; RECOVERABLE_SIGNATURE_LEN],
    pub recovered_address: [u8; 20],
}

impl SignatureBundle {
    /// `r || s` as 128 lowercase hex chars, the form claim messages carry.
    pub fn wire_signature(&self) -> String {
        hex::encode(&self.signature[..COMPACT_SIGNATURE_LEN])
    }

    pub fn wire_message_hash(&self) -> String {
        hex::encode(self.message_hash)
    }

    pub fn wire_address(&self) -> String {
        hex::encode(self.recovered_address)
    }
}

/// Answer to a signature verification query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerification {
    pub is_valid: bool,
    /// Uncompressed point, hex with the leading `04` marker.
    pub public_key: String,
    /// Lowercase hex without `0x`.
    pub recovered_address: String,
}

impl SignatureVerification {
    fn unrecoverable() -> Self {
        Self {
            is_valid: false,
            public_key: String::new(),
            recovered_address: String::new(),
        }
    }
}

/// `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn hash_message(message: &[u8]) -> Hash {
    let mut preimage = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    preimage.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    preimage.extend_from_slice(message.len().to_string().as_bytes());
    preimage.extend_from_slice(message);
    keccak256(&preimage)
}

/// Message a foreign claimant signs to direct the airdrop to `native_recipient`.
pub fn claim_message(foreign_address: &str, native_recipient: &str) -> Result<String, SignatureError> {
    let address = normalize_foreign_address(foreign_address)
        .map_err(|e| SignatureError::InvalidAddress(e.to_string()))?;
    Ok(format!("0x{address}{}", native_recipient.trim()))
}

/// Converts a public key into an address by hashing the uncompressed encoding
/// (without the `0x04` tag) and keeping the last 20 bytes.
pub fn address_from_public_key(public: &PublicKey) -> [u8; 20] {
    let hash = keccak256(&public.serialize_uncompressed()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

pub fn address_from_secret_key(secret: &[u8; 32]) -> Result<[u8; 20], SignatureError> {
    let secret = SecretKey::from_slice(secret)
        .map_err(|e| SignatureError::InvalidSecretKey(e.to_string()))?;
    Ok(address_from_public_key(&PublicKey::from_secret_key(SECP256K1, &secret)))
}

/// Sign `message` with `personal_sign` hashing. Deterministic (RFC 6979, low-s).
pub fn sign_message(secret: &[u8; 32], message: &[u8]) -> Result<SignatureBundle, SignatureError> {
    let secret_key = SecretKey::from_slice(secret)
        .map_err(|e| SignatureError::InvalidSecretKey(e.to_string()))?;
    let message_hash = hash_message(message);
    let msg = Message::from_slice(&message_hash)
        .map_err(|e| SignatureError::InvalidMessageHash(e.to_string()))?;

    let (recovery_id, compact) = SECP256K1
        .sign_ecdsa_recoverable(&msg, &secret_key)
        .serialize_compact();

    let mut signature = [0u8; RECOVERABLE_SIGNATURE_LEN];
    signature[..COMPACT_SIGNATURE_LEN].copy_from_slice(&compact);
    signature[COMPACT_SIGNATURE_LEN] = 27 + recovery_id.to_i32() as u8;

    Ok(SignatureBundle {
        message_hash,
        signature,
        recovered_address: address_from_public_key(&PublicKey::from_secret_key(
            SECP256K1,
            &secret_key,
        )),
    })
}

/// Recover the signer of `message_hash` and compare with `foreign_address`.
///
/// Accepts 64-byte `r || s` (both recovery ids are tried) or 65-byte
/// `r || s || v` signatures, each optionally `0x`-prefixed. A mismatch or an
/// unrecoverable signature is reported through `is_valid`, not as an error.
pub fn verify_signature(
    foreign_address: &str,
    signature: &str,
    message_hash: &str,
) -> Result<SignatureVerification, SignatureError> {
    let claimed = normalize_foreign_address(foreign_address)
        .map_err(|e| SignatureError::InvalidAddress(e.to_string()))?;
    let msg = parse_message_hash(message_hash)?;
    let (compact, recovery_ids) = parse_signature(signature)?;

    let mut first = None;
    for recovery_id in recovery_ids {
        let Some(public) = recover(&msg, &compact, recovery_id) else {
            continue;
        };
        let recovered_address = hex::encode(address_from_public_key(&public));
        let outcome = SignatureVerification {
            is_valid: recovered_address == claimed,
            public_key: hex::encode(public.serialize_uncompressed()),
            recovered_address,
        };
        if outcome.is_valid {
            return Ok(outcome);
        }
        first.get_or_insert(outcome);
    }

    Ok(first.unwrap_or_else(SignatureVerification::unrecoverable))
}

fn recover(msg: &Message, compact: &[u8; 64], recovery_id: i32) -> Option<PublicKey> {
    let id = RecoveryId::from_i32(recovery_id).ok()?;
    let sig = RecoverableSignature::from_compact(compact, id).ok()?;
    SECP256K1.recover_ecdsa(msg, &sig).ok()
}

fn parse_message_hash(value: &str) -> Result<Message, SignatureError> {
    let stripped = strip_hex_prefix(value.trim());
    let bytes = hex::decode(stripped)
        .map_err(|e| SignatureError::InvalidMessageHash(format!("{e}: {value}")))?;
    if bytes.len() != 32 {
        return Err(SignatureError::InvalidMessageHash(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Message::from_slice(&bytes).map_err(|e| SignatureError::InvalidMessageHash(e.to_string()))
}

fn parse_signature(value: &str) -> Result<([u8; 64], Vec<i32>), SignatureError> {
    let stripped = strip_hex_prefix(value.trim());
    let bytes = hex::decode(stripped)
        .map_err(|e| SignatureError::InvalidSignatureFormat(format!("{e}")))?;

    let mut compact = [0u8; COMPACT_SIGNATURE_LEN];
    match bytes.len() {
        COMPACT_SIGNATURE_LEN => {
            compact.copy_from_slice(&bytes);
            Ok((compact, vec![0, 1]))
        }
        RECOVERABLE_SIGNATURE_LEN => {
            compact.copy_from_slice(&bytes[..COMPACT_SIGNATURE_LEN]);
            let recovery_id = match bytes[COMPACT_SIGNATURE_LEN] {
                v @ (0 | 1) => v as i32,
                v @ (27 | 28) => (v - 27) as i32,
                v => {
                    return Err(SignatureError::InvalidSignatureFormat(format!(
                        "unsupported recovery byte {v}"
                    )))
                }
            };
            Ok((compact, vec![recovery_id]))
        }
        other => Err(SignatureError::InvalidSignatureFormat(format!(
            "expected 64 or 65 bytes, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // web3.js / ethers documentation key and "Some data" signature
    const DOC_SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const DOC_ADDRESS: &str = "2c7536e3605d9c16a7a3d7b1898e529396a65c23";
    const DOC_HASH: &str = "1da44b586eb0729ff70a73c326926f6ed5a25f5b056e7f47fbc6e58d86871655";
    const DOC_SIGNATURE: &str = "b91467e570a6466aa9e9876cbcd013baba02900b8979d43fe208a4a4f339f5fd6007e74cd82e037b800186422fc2da167c747ef045e5d18a5f5d4300f8e1a0291c";

    fn doc_secret() -> [u8; 32] {
        let mut out = [0u8; 32];
        hex::decode_to_slice(DOC_SECRET, &mut out).unwrap();
        out
    }

    #[test]
    fn address_from_known_secret() {
        let address = address_from_secret_key(&doc_secret()).unwrap();
        assert_eq!(hex::encode(address), DOC_ADDRESS);
    }

    #[test]
    fn personal_message_hash_matches_known_vector() {
        assert_eq!(hex::encode(hash_message(b"Some data")), DOC_HASH);
    }

    #[test]
    fn signing_is_deterministic_and_matches_known_vector() {
        let bundle = sign_message(&doc_secret(), b"Some data").unwrap();
        assert_eq!(hex::encode(bundle.signature), DOC_SIGNATURE);
        assert_eq!(bundle.wire_message_hash(), DOC_HASH);
        assert_eq!(bundle.wire_signature(), &DOC_SIGNATURE[..128]);
        assert_eq!(bundle, sign_message(&doc_secret(), b"Some data").unwrap());
    }

    #[test]
    fn recovers_known_ecrecover_vector() {
        let sig = "650acf9d3f5f0a2c799776a1254355d5f4061762a237396a99a0e0e3fc2bcd6729514a0dacb2e623ac4abd157cb18163ff942280db4d5caad66ddf941ba12e0300";
        let hash = "47173285a8d7341e5e972fc677286384f802f8ef42a5ec5f03bbfa254cb01fad";
        let address = "c08b5542d177ac6686946920409741463a15dddb";

        let full = verify_signature(address, sig, hash).unwrap();
        assert!(full.is_valid);
        assert_eq!(full.recovered_address, address);
        assert!(full.public_key.starts_with("04"));
        assert_eq!(full.public_key.len(), 130);

        // same signature without the recovery byte
        let compact = verify_signature(address, &sig[..128], hash).unwrap();
        assert_eq!(compact, full);
    }

    #[test]
    fn sign_then_verify_recovers_signer() {
        let secret = doc_secret();
        let bundle = sign_message(&secret, b"testing").unwrap();
        assert_eq!(hex::encode(bundle.recovered_address), DOC_ADDRESS);

        let outcome = verify_signature(
            &format!("0x{}", DOC_ADDRESS.to_uppercase()),
            &format!("0x{}", bundle.wire_signature()),
            &format!("0x{}", bundle.wire_message_hash()),
        )
        .unwrap();
        assert!(outcome.is_valid);
        assert_eq!(outcome.recovered_address, DOC_ADDRESS);

        let unprefixed =
            verify_signature(DOC_ADDRESS, &bundle.wire_signature(), &bundle.wire_message_hash())
                .unwrap();
        assert_eq!(unprefixed, outcome);
    }

    #[test]
    fn wrong_address_is_reported_not_raised() {
        let bundle = sign_message(&doc_secret(), b"testing").unwrap();
        let outcome = verify_signature(
            &"11".repeat(20),
            &bundle.wire_signature(),
            &bundle.wire_message_hash(),
        )
        .unwrap();
        assert!(!outcome.is_valid);
        assert_ne!(outcome.recovered_address, "11".repeat(20));
    }

    #[test]
    fn wrong_hash_recovers_other_address() {
        let bundle = sign_message(&doc_secret(), b"testing").unwrap();
        let other_hash = hex::encode(hash_message(b"testing!"));
        let outcome =
            verify_signature(DOC_ADDRESS, &bundle.wire_signature(), &other_hash).unwrap();
        assert!(!outcome.is_valid);
    }

    #[test]
    fn malformed_inputs_are_errors() {
        let hash = hex::encode(hash_message(b"x"));
        assert!(matches!(
            verify_signature(DOC_ADDRESS, "abcd", &hash),
            Err(SignatureError::InvalidSignatureFormat(_))
        ));
        assert!(matches!(
            verify_signature(DOC_ADDRESS, &"zz".repeat(64), &hash),
            Err(SignatureError::InvalidSignatureFormat(_))
        ));
        let bad_v = format!("{}05", "11".repeat(64));
        assert!(matches!(
            verify_signature(DOC_ADDRESS, &bad_v, &hash),
            Err(SignatureError::InvalidSignatureFormat(_))
        ));
        assert!(matches!(
            verify_signature(DOC_ADDRESS, &"11".repeat(64), "1234"),
            Err(SignatureError::InvalidMessageHash(_))
        ));
        assert!(matches!(
            verify_signature("0x1234", &"11".repeat(64), &hash),
            Err(SignatureError::InvalidAddress(_))
        ));
    }

    #[test]
    fn unrecoverable_signature_is_invalid() {
        // r = 0 is never a valid curve point
        let sig = format!("{}{}", "00".repeat(32), "11".repeat(32));
        let hash = hex::encode(hash_message(b"x"));
        let outcome = verify_signature(DOC_ADDRESS, &sig, &hash).unwrap();
        assert_eq!(outcome, SignatureVerification::unrecoverable());
    }

    #[test]
    fn claim_message_normalizes_foreign_address() {
        let msg = claim_message(
            "0x2C7536E3605D9C16A7A3D7B1898E529396A65C23",
            "terra17lmam6zguazs5q5u6z5mmx76uj63gldnse2pdp",
        )
        .unwrap();
        assert_eq!(
            msg,
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23terra17lmam6zguazs5q5u6z5mmx76uj63gldnse2pdp"
        );
    }
}
