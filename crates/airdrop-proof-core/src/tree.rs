//! Sorted-pair Merkle tree over one shard of leaves.
//!
//! Leaves are sorted before building. Each level pairs nodes left to right and
//! hashes every pair in byte order, so a verifier folds siblings without knowing
//! their side. An unpaired last node is carried up unchanged rather than
//! duplicated.

use crate::{keccak256, Hash};

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("cannot build a merkle tree without leaves")]
    Empty,
}

/// `keccak256(min(a, b) || max(a, b))`.
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo);
    buf[32..].copy_from_slice(hi);
    keccak256(&buf)
}

/// Fold `siblings` into `leaf` and compare with `root`.
pub fn verify_proof(leaf: &Hash, siblings: &[Hash], root: &Hash) -> bool {
    let computed = siblings
        .iter()
        .fold(*leaf, |node, sibling| hash_pair(&node, sibling));
    computed == *root
}

#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// `levels[0]` holds the sorted leaves, the last level holds the root.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    pub fn build(mut leaves: Vec<Hash>) -> Result<Self, TreeError> {
        if leaves.is_empty() {
            return Err(TreeError::Empty);
        }
        leaves.sort_unstable();

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Hash> = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> Hash {
        // build() guarantees at least one level with at least one node
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn contains(&self, leaf: &Hash) -> bool {
        self.leaves().binary_search(leaf).is_ok()
    }

    /// Sibling path from `leaf` up to the root, or `None` if the leaf is absent.
    ///
    /// Levels where the node was promoted without a partner contribute nothing,
    /// so paths may be shorter than the tree height.
    pub fn proof(&self, leaf: &Hash) -> Option<Vec<Hash>> {
        let mut index = self.leaves().binary_search(leaf).ok()?;
        let mut path = Vec::with_capacity(self.levels.len().saturating_sub(1));

        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if sibling < level.len() {
                path.push(level[sibling]);
            }
            index /= 2;
        }

        Some(path)
    }

    pub fn verify(&self, leaf: &Hash, siblings: &[Hash]) -> bool {
        verify_proof(leaf, siblings, &self.root())
    }
}
