//! Incremental Merkle tree for audit trail inclusion proofs
//!
//! - Binary Merkle tree with SHA-256 hashing
//! - Incremental updates (append-only)
//! - Efficient proof generation (O(log n))

use sha2::{Digest, Sha256};

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Which side of a proof step the sibling hash sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// A path from one leaf up to the tree's root at the time the proof was taken.
#[derive(Debug, Clone)]
pub struct MerkleProof {
    pub leaf_hash: [u8; 32],
    pub siblings: Vec<(Direction, [u8; 32])>,
    pub root_hash: [u8; 32],
}

impl MerkleProof {
    /// Recompute the root from `leaf_hash` and `siblings`, and compare to `root_hash`.
    pub fn verify(&self) -> bool {
        let mut current_hash = self.leaf_hash;
        for (direction, sibling_hash) in &self.siblings {
            current_hash = match direction {
                Direction::Left => hash_pair(sibling_hash, &current_hash),
                Direction::Right => hash_pair(&current_hash, sibling_hash),
            };
        }
        current_hash == self.root_hash
    }
}

/// Incremental Merkle tree over the audit entry hash chain.
///
/// Rebuilt append-by-append as the audit trail's in-memory index; the
/// durable source of truth is the hash chain itself, this tree just
/// gives callers a cheap inclusion proof against the current root.
#[derive(Debug, Default)]
pub struct MerkleTree {
    leaves: Vec<[u8; 32]>,
    cached_root: Option<[u8; 32]>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Self {
        let mut tree = Self::new();
        for leaf in leaves {
            tree.append(leaf);
        }
        tree
    }

    pub fn append(&mut self, leaf_hash: [u8; 32]) {
        self.leaves.push(leaf_hash);
        self.cached_root = None;
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn root(&mut self) -> [u8; 32] {
        if let Some(root) = self.cached_root {
            return root;
        }
        let root = Self::compute_root(&self.leaves);
        self.cached_root = Some(root);
        root
    }

    fn compute_root(leaves: &[[u8; 32]]) -> [u8; 32] {
        if leaves.is_empty() {
            return [0u8; 32];
        }
        if leaves.len() == 1 {
            return leaves[0];
        }

        let mut current_level = leaves.to_vec();
        while current_level.len() > 1 {
            let mut next_level = Vec::new();
            for i in (0..current_level.len()).step_by(2) {
                let left = current_level[i];
                let right = current_level.get(i + 1).copied().unwrap_or(left);
                next_level.push(hash_pair(&left, &right));
            }
            current_level = next_level;
        }
        current_level[0]
    }

    /// Build an inclusion proof for the leaf at `leaf_index` against the current root.
    pub fn generate_proof(&mut self, leaf_index: usize) -> Option<MerkleProof> {
        if leaf_index >= self.leaves.len() {
            return None;
        }

        let leaf_hash = self.leaves[leaf_index];
        let root_hash = self.root();

        if self.leaves.len() == 1 {
            return Some(MerkleProof { leaf_hash, siblings: Vec::new(), root_hash });
        }

        let mut current_level = self.leaves.clone();
        let mut current_index = leaf_index;
        let mut siblings = Vec::new();

        while current_level.len() > 1 {
            let is_left = current_index % 2 == 0;
            let sibling_index = if is_left {
                (current_index + 1).min(current_level.len() - 1)
            } else {
                current_index - 1
            };
            let sibling_hash = current_level[sibling_index];
            let direction = if is_left { Direction::Right } else { Direction::Left };
            siblings.push((direction, sibling_hash));

            let mut next_level = Vec::new();
            for i in (0..current_level.len()).step_by(2) {
                let left = current_level[i];
                let right = current_level.get(i + 1).copied().unwrap_or(left);
                next_level.push(hash_pair(&left, &right));
            }
            current_level = next_level;
            current_index /= 2;
        }

        Some(MerkleProof { leaf_hash, siblings, root_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_data(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let mut tree = MerkleTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), [0u8; 32]);
    }

    #[test]
    fn two_leaves_root_matches_manual_hash() {
        let mut tree = MerkleTree::new();
        let leaf1 = hash_data(b"entry1");
        let leaf2 = hash_data(b"entry2");
        tree.append(leaf1);
        tree.append(leaf2);
        assert_eq!(tree.root(), hash_pair(&leaf1, &leaf2));
    }

    #[test]
    fn proof_verifies_for_every_leaf_with_odd_count() {
        let leaves: Vec<_> = ["a", "b", "c", "d", "e"].iter().map(|s| hash_data(s.as_bytes())).collect();
        let mut tree = MerkleTree::from_leaves(leaves.clone());
        for i in 0..leaves.len() {
            let proof = tree.generate_proof(i).unwrap();
            assert_eq!(proof.leaf_hash, leaves[i]);
            assert!(proof.verify());
        }
    }

    #[test]
    fn tampered_root_fails_verification() {
        let mut tree = MerkleTree::new();
        tree.append(hash_data(b"entry1"));
        tree.append(hash_data(b"entry2"));
        let mut proof = tree.generate_proof(0).unwrap();
        proof.root_hash = hash_data(b"not the root");
        assert!(!proof.verify());
    }
}
