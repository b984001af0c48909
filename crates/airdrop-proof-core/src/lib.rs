//! Core entitlement logic for multi-root Merkle airdrops.
//!
//! Claimant lists are encoded into keccak256 leaves, sharded into independent
//! sorted-pair Merkle trees, and proven against the resulting root set. Foreign
//! (EVM) claimants additionally bind their claim to a host-chain identity with a
//! recoverable secp256k1 signature.
//!
//! Nothing in this crate performs I/O.

pub mod leaf;
pub mod shard;
pub mod signature;
pub mod tree;

use tiny_keccak::{Hasher, Keccak};

pub use leaf::{
    normalize_foreign_address, validate_amount, ClaimantError, ClaimantRecord, ForeignScheme,
    LeafScheme, NativeScheme, SchemeKind,
};
pub use shard::{
    shard_ranges, Proof, ProofError, RootSet, RootSetError, ShardConfig, ShardError, ShardedTree,
};
pub use signature::{
    address_from_public_key, address_from_secret_key, claim_message, hash_message, sign_message,
    verify_signature, SignatureBundle, SignatureError, SignatureVerification,
};
pub use tree::{hash_pair, verify_proof, MerkleTree, TreeError};

/// A 32-byte keccak256 digest. Leaves and internal nodes share this type.
pub type Hash = [u8; 32];

/// Width of a hex-encoded [`Hash`] without prefix.
pub const HASH_HEX_LEN: usize = 64;

pub fn keccak256(data: &[u8]) -> Hash {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; 32];
    keccak.finalize(&mut out);
    out
}

/// Strip a single leading `0x`/`0X`, if present.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a 32-byte hash from hex, with or without `0x`.
pub fn parse_hash_hex(value: &str) -> Option<Hash> {
    let stripped = strip_hex_prefix(value.trim());
    if stripped.len() != HASH_HEX_LEN {
        return None;
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(stripped, &mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_empty_input() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn parse_hash_hex_accepts_optional_prefix() {
        let hex_str = "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";
        let plain = parse_hash_hex(hex_str).unwrap();
        let prefixed = parse_hash_hex(&format!("0x{hex_str}")).unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain, keccak256(b""));
    }

    #[test]
    fn parse_hash_hex_rejects_bad_input() {
        assert!(parse_hash_hex("abcd").is_none());
        assert!(parse_hash_hex(&"zz".repeat(32)).is_none());
        // double prefix is only stripped once
        assert!(parse_hash_hex(&format!("0x0x{}", "00".repeat(31))).is_none());
    }
}
