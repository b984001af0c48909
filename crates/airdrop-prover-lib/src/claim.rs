//! Off-chain replay of the contract's claim checks.

use airdrop_proof_core::{
    normalize_foreign_address, parse_hash_hex, verify_signature, ClaimantRecord, ForeignScheme, Hash, LeafScheme,
    NativeScheme, Proof, RootSet,
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::messages::{ClaimMsg, RootsPayload};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ClaimCheck {
    Valid,
    UnknownRoot { root_index: u32, available: usize },
    ProofMismatch,
    InvalidSignature { recovered_address: String },
}

impl ClaimCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Check `claim` the way the contract would when `sender` submits it.
///
/// A native claim is proven for `sender`. A foreign claim is proven for its
/// `eth_address` and must carry a signature recovering to that address.
pub fn verify_claim(
    payload: &RootsPayload,
    native: &NativeScheme,
    sender: &str,
    claim: &ClaimMsg,
) -> Result<ClaimCheck> {
    let check = match claim {
        ClaimMsg::ClaimByTerraUser {
            claim_amount,
            merkle_proof,
            root_index,
        } => {
            let record = ClaimantRecord::new(sender, claim_amount.as_str());
            check_inclusion(
                &payload.native_roots()?,
                native,
                &record,
                merkle_proof,
                *root_index,
            )?
        }
        ClaimMsg::ClaimByEvmUser {
            eth_address,
            claim_amount,
            merkle_proof,
            root_index,
            signature,
            signed_msg_hash,
        } => {
            let canonical = normalize_foreign_address(eth_address)?;
            let record = ClaimantRecord::new(eth_address.as_str(), claim_amount.as_str());
            let mut inclusion = check_inclusion(
                &payload.foreign_roots()?,
                &ForeignScheme,
                &record,
                merkle_proof,
                *root_index,
            )?;
            // the contract hashes `eth_address` exactly as submitted
            if inclusion.is_valid() && canonical != *eth_address {
                inclusion = ClaimCheck::ProofMismatch;
            }
            if inclusion.is_valid() {
                let verification = verify_signature(eth_address, signature, signed_msg_hash)
                    .context("malformed claim signature")?;
                if verification.is_valid {
                    ClaimCheck::Valid
                } else {
                    ClaimCheck::InvalidSignature {
                        recovered_address: verification.recovered_address,
                    }
                }
            } else {
                inclusion
            }
        }
    };
    if check.is_valid() {
        debug!(sender, root_index = claim.root_index(), "claim verified");
    } else {
        warn!(sender, root_index = claim.root_index(), ?check, "claim rejected");
    }
    Ok(check)
}

fn check_inclusion<S: LeafScheme>(
    roots: &RootSet,
    scheme: &S,
    record: &ClaimantRecord,
    merkle_proof: &[String],
    root_index: u32,
) -> Result<ClaimCheck> {
    if roots.get(root_index).is_none() {
        return Ok(ClaimCheck::UnknownRoot {
            root_index,
            available: roots.len(),
        });
    }
    let leaf = scheme.encode(record)?;
    let proof = Proof {
        root_index,
        siblings: parse_siblings(merkle_proof)?,
    };
    Ok(if roots.verify(&leaf, &proof) {
        ClaimCheck::Valid
    } else {
        ClaimCheck::ProofMismatch
    })
}

fn parse_siblings(merkle_proof: &[String]) -> Result<Vec<Hash>> {
    merkle_proof
        .iter()
        .enumerate()
        .map(|(i, value)| {
            parse_hash_hex(value)
                .ok_or_else(|| anyhow!("merkle_proof[{i}] is not a 32-byte hex hash: {value}"))
        })
        .collect()
}
