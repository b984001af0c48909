//! JSON messages exchanged with the airdrop contract and frontends.

use airdrop_proof_core::{
    normalize_foreign_address, verify_signature, ClaimantRecord, LeafScheme, Proof, RootSet,
    ShardedTree, SignatureBundle, SignatureVerification,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Root lists as the contract is instantiated with them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsPayload {
    #[serde(rename = "terra_merkle_roots")]
    pub native: Vec<String>,
    #[serde(rename = "evm_merkle_roots")]
    pub foreign: Vec<String>,
}

impl RootsPayload {
    /// Both sets must start at root index 0; the payload carries no offsets.
    pub fn from_root_sets(native: &RootSet, foreign: &RootSet) -> Result<Self> {
        for (name, set) in [("native", native), ("foreign", foreign)] {
            if let Some(first) = set.first_index() {
                if first != 0 {
                    bail!("{name} root set starts at index {first}, payload roots must start at 0");
                }
            }
        }
        Ok(Self {
            native: native.to_wire(),
            foreign: foreign.to_wire(),
        })
    }

    pub fn native_roots(&self) -> Result<RootSet> {
        RootSet::from_wire(&self.native).context("invalid terra_merkle_roots")
    }

    pub fn foreign_roots(&self) -> Result<RootSet> {
        RootSet::from_wire(&self.foreign).context("invalid evm_merkle_roots")
    }
}

/// Claim execute message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimMsg {
    ClaimByTerraUser {
        claim_amount: String,
        merkle_proof: Vec<String>,
        root_index: u32,
    },
    ClaimByEvmUser {
        eth_address: String,
        claim_amount: String,
        merkle_proof: Vec<String>,
        root_index: u32,
        signature: String,
        signed_msg_hash: String,
    },
}

impl ClaimMsg {
    pub fn native(record: &ClaimantRecord, proof: &Proof) -> Self {
        Self::ClaimByTerraUser {
            claim_amount: record.amount.clone(),
            merkle_proof: proof.siblings_hex(),
            root_index: proof.root_index,
        }
    }

    pub fn foreign(
        record: &ClaimantRecord,
        proof: &Proof,
        signature: &SignatureBundle,
    ) -> Result<Self> {
        Ok(Self::ClaimByEvmUser {
            eth_address: normalize_foreign_address(&record.address)?,
            claim_amount: record.amount.clone(),
            merkle_proof: proof.siblings_hex(),
            root_index: proof.root_index,
            signature: signature.wire_signature(),
            signed_msg_hash: signature.wire_message_hash(),
        })
    }

    pub fn root_index(&self) -> u32 {
        match self {
            Self::ClaimByTerraUser { root_index, .. } | Self::ClaimByEvmUser { root_index, .. } => {
                *root_index
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureQuery {
    IsValidSignature {
        evm_address: String,
        evm_signature: String,
        signed_msg_hash: String,
    },
}

impl SignatureQuery {
    /// Query for the signer's own address, as a frontend would issue it.
    pub fn from_bundle(bundle: &SignatureBundle) -> Self {
        Self::IsValidSignature {
            evm_address: bundle.wire_address(),
            evm_signature: bundle.wire_signature(),
            signed_msg_hash: bundle.wire_message_hash(),
        }
    }
}

pub fn answer_signature_query(query: &SignatureQuery) -> Result<SignatureVerification> {
    match query {
        SignatureQuery::IsValidSignature {
            evm_address,
            evm_signature,
            signed_msg_hash,
        } => verify_signature(evm_address, evm_signature, signed_msg_hash)
            .with_context(|| format!("failed verifying signature for {evm_address}")),
    }
}

/// One row of the eligible-claimants export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleClaimant {
    pub address: String,
    pub amount: String,
    pub merkle_proof: Vec<String>,
    /// Root index the proof verifies against.
    pub index: u32,
}

/// Proof material for every claimant, in source order.
pub fn export_eligible_claimants<S: LeafScheme>(
    tree: &ShardedTree<S>,
) -> Result<Vec<EligibleClaimant>> {
    let proofs = tree.proofs().context("failed generating claimant proofs")?;
    let rows: Vec<_> = proofs
        .into_iter()
        .map(|(record, proof)| EligibleClaimant {
            address: record.address.clone(),
            amount: record.amount.clone(),
            merkle_proof: proof.siblings_hex(),
            index: proof.root_index,
        })
        .collect();
    tracing::info!(
        scheme = ?tree.scheme().kind(),
        claimants = rows.len(),
        "exported eligible claimants"
    );
    Ok(rows)
}
