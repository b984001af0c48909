//! Root sharding and proof lookup across shards.
//!
//! A claimant list is cut into `K` contiguous ranges. Each range becomes an
//! independent [`MerkleTree`] whose root is published at
//! `base_index + shard` in the [`RootSet`].

use std::{collections::HashMap, ops::Range};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    leaf::{ClaimantError, ClaimantRecord, LeafScheme},
    parse_hash_hex,
    tree::{verify_proof, MerkleTree, TreeError},
    Hash,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    #[error("shard count must be at least 1")]
    ZeroShards,
    #[error("root indices starting at {base_index} overflow for {shard_count} shards")]
    IndexOverflow { base_index: u32, shard_count: u32 },
    #[error("shard {shard} has no claimants")]
    EmptyShard { shard: usize },
    #[error("{shard_count} shards requested for {claimants} claimants")]
    TooManyShards { shard_count: u32, claimants: usize },
    #[error("claimant {address} listed more than once (shards {first_shard} and {second_shard})")]
    DuplicateClaimant {
        address: String,
        first_shard: usize,
        second_shard: usize,
    },
    #[error(transparent)]
    Claimant(#[from] ClaimantError),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error("claimant {address} is not eligible in any shard")]
    ClaimantNotEligible { address: String },
    #[error(transparent)]
    Claimant(#[from] ClaimantError),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RootSetError {
    #[error("root set is append-only: expected index {expected}, got {found}")]
    NonContiguous { expected: u32, found: u32 },
    #[error("invalid merkle root at index {index}: {value}")]
    InvalidRoot { index: usize, value: String },
}

/// Operator-chosen sharding parameters for one scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardConfig {
    pub shard_count: u32,
    /// Root index of the first shard. Non-zero when layering a later era.
    pub base_index: u32,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shard_count: 1,
            base_index: 0,
        }
    }
}

impl ShardConfig {
    pub fn new(shard_count: u32) -> Self {
        Self {
            shard_count,
            ..Self::default()
        }
    }

    pub fn with_base_index(mut self, base_index: u32) -> Self {
        self.base_index = base_index;
        self
    }
}

/// Shard `i` covers `[round(i*n/k), round((i+1)*n/k))`, rounding half up.
///
/// The ranges are contiguous and cover `[0, n)` exactly; sizes may differ by
/// one when `k` does not divide `n`, and shards are empty when `k > n`.
pub fn shard_ranges(n: usize, k: usize) -> Result<Vec<Range<usize>>, ShardError> {
    if k == 0 {
        return Err(ShardError::ZeroShards);
    }
    let bound = |i: usize| -> usize {
        let (i, n, k) = (i as u128, n as u128, k as u128);
        ((2 * i * n + k) / (2 * k)) as usize
    };
    Ok((0..k).map(|i| bound(i)..bound(i + 1)).collect())
}

/// Inclusion proof for one claimant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub root_index: u32,
    pub siblings: Vec<Hash>,
}

impl Proof {
    /// Lowercase hex without `0x`, as the claim message carries it.
    pub fn siblings_hex(&self) -> Vec<String> {
        self.siblings.iter().map(hex::encode).collect()
    }
}

/// Published roots, keyed by consecutive root index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootSet {
    entries: Vec<(u32, Hash)>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roots indexed from zero in the given order.
    pub fn from_roots(roots: impl IntoIterator<Item = Hash>) -> Self {
        Self {
            entries: roots
                .into_iter()
                .enumerate()
                .map(|(i, root)| (i as u32, root))
                .collect(),
        }
    }

    pub fn from_wire(roots: &[String]) -> Result<Self, RootSetError> {
        let mut parsed = Vec::with_capacity(roots.len());
        for (index, value) in roots.iter().enumerate() {
            let root = parse_hash_hex(value).ok_or_else(|| RootSetError::InvalidRoot {
                index,
                value: value.clone(),
            })?;
            parsed.push(root);
        }
        Ok(Self::from_roots(parsed))
    }

    /// Roots in index order as lowercase hex without `0x`.
    pub fn to_wire(&self) -> Vec<String> {
        self.entries.iter().map(|(_, root)| hex::encode(root)).collect()
    }

    pub fn first_index(&self) -> Option<u32> {
        self.entries.first().map(|(index, _)| *index)
    }

    pub fn next_index(&self) -> u32 {
        self.entries.last().map_or(0, |(index, _)| index + 1)
    }

    /// Append a later era. Its first index must continue this set.
    pub fn append(&mut self, era: RootSet) -> Result<(), RootSetError> {
        if let Some(found) = era.first_index() {
            let expected = self.next_index();
            if found != expected {
                return Err(RootSetError::NonContiguous { expected, found });
            }
        }
        self.entries.extend(era.entries);
        Ok(())
    }

    pub fn get(&self, root_index: u32) -> Option<&Hash> {
        let first = self.first_index()?;
        let offset = root_index.checked_sub(first)? as usize;
        self.entries.get(offset).map(|(_, root)| root)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u32, Hash)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `false` when the proof targets an index this set does not hold.
    pub fn verify(&self, leaf: &Hash, proof: &Proof) -> bool {
        self.get(proof.root_index)
            .is_some_and(|root| verify_proof(leaf, &proof.siblings, root))
    }
}

/// All shard trees of one scheme, built from one finalized claimant list.
#[derive(Debug)]
pub struct ShardedTree<S> {
    scheme: S,
    base_index: u32,
    records: Vec<ClaimantRecord>,
    leaves: Vec<Hash>,
    ranges: Vec<Range<usize>>,
    shards: Vec<MerkleTree>,
}

impl<S: LeafScheme> ShardedTree<S> {
    pub fn build(
        scheme: S,
        records: Vec<ClaimantRecord>,
        config: ShardConfig,
    ) -> Result<Self, ShardError> {
        if config.base_index.checked_add(config.shard_count).is_none() {
            return Err(ShardError::IndexOverflow {
                base_index: config.base_index,
                shard_count: config.shard_count,
            });
        }
        if config.shard_count == 0 {
            return Err(ShardError::ZeroShards);
        }
        // at least one shard would be empty; reject before sizing the ranges
        if config.shard_count as usize > records.len() {
            return Err(ShardError::TooManyShards {
                shard_count: config.shard_count,
                claimants: records.len(),
            });
        }
        let ranges = shard_ranges(records.len(), config.shard_count as usize)?;

        let mut leaves = Vec::with_capacity(records.len());
        let mut seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for (shard, range) in ranges.iter().enumerate() {
            for record in &records[range.clone()] {
                let address = scheme.normalize_address(&record.address)?;
                leaves.push(scheme.encode(record)?);
                if let Some(first_shard) = seen.insert(address.clone(), shard) {
                    return Err(ShardError::DuplicateClaimant {
                        address,
                        first_shard,
                        second_shard: shard,
                    });
                }
            }
        }

        let shards = ranges
            .par_iter()
            .enumerate()
            .map(|(shard, range)| {
                let tree = MerkleTree::build(leaves[range.clone()].to_vec()).map_err(
                    |err| match err {
                        TreeError::Empty => ShardError::EmptyShard { shard },
                    },
                )?;
                debug!(
                    shard,
                    leaves = tree.len(),
                    root = %hex::encode(tree.root()),
                    "built shard tree"
                );
                Ok(tree)
            })
            .collect::<Result<Vec<_>, ShardError>>()?;

        info!(
            scheme = ?scheme.kind(),
            claimants = records.len(),
            shards = shards.len(),
            base_index = config.base_index,
            "built sharded merkle trees"
        );

        Ok(Self {
            scheme,
            base_index: config.base_index,
            records,
            leaves,
            ranges,
            shards,
        })
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    pub fn base_index(&self) -> u32 {
        self.base_index
    }

    pub fn records(&self) -> &[ClaimantRecord] {
        &self.records
    }

    pub fn shards(&self) -> &[MerkleTree] {
        &self.shards
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn root_set(&self) -> RootSet {
        RootSet {
            entries: self
                .shards
                .iter()
                .enumerate()
                .map(|(shard, tree)| (self.base_index + shard as u32, tree.root()))
                .collect(),
        }
    }

    /// Proof for `record` from the first shard that holds its leaf.
    pub fn prove_for(&self, record: &ClaimantRecord) -> Result<Proof, ProofError> {
        let leaf = self.scheme.encode(record)?;
        self.prove_leaf(&leaf)
            .ok_or_else(|| ProofError::ClaimantNotEligible {
                address: record.address.clone(),
            })
    }

    pub fn prove_leaf(&self, leaf: &Hash) -> Option<Proof> {
        self.shards.iter().enumerate().find_map(|(shard, tree)| {
            let siblings = tree.proof(leaf)?;
            // an empty path only proves membership in a single-leaf shard
            if siblings.is_empty() && tree.len() > 1 {
                return None;
            }
            Some(Proof {
                root_index: self.base_index + shard as u32,
                siblings,
            })
        })
    }

    /// A proof for every claimant, in source order.
    pub fn proofs(&self) -> Result<Vec<(&ClaimantRecord, Proof)>, ProofError> {
        let mut out = Vec::with_capacity(self.records.len());
        for (shard, range) in self.ranges.iter().enumerate() {
            let tree = &self.shards[shard];
            for index in range.clone() {
                let record = &self.records[index];
                let siblings = tree.proof(&self.leaves[index]).ok_or_else(|| {
                    ProofError::ClaimantNotEligible {
                        address: record.address.clone(),
                    }
                })?;
                out.push((
                    record,
                    Proof {
                        root_index: self.base_index + shard as u32,
                        siblings,
                    },
                ));
            }
        }
        Ok(out)
    }
}
