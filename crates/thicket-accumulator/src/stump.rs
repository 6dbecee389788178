//! Compact accumulator state: the roots plus the number of leaves ever added.
//!
//! A [`Stump`] is all a verifier needs. The proof index persists one per
//! connected block as the state snapshot.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use thicket_core::types::Hash256;

use crate::error::AccumulatorError;
use crate::proof::Proof;
use crate::util::{
    detect_row, is_root_position, parent, parent_hash, proof_positions, root_positions, tree_rows,
};

/// Roots and leaf count of an accumulator.
#[derive(
    Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Stump {
    /// Roots, tallest tree first. Empty trees have a zero root.
    pub roots: Vec<Hash256>,
    /// Total number of leaves ever added, including deleted ones.
    pub num_leaves: u64,
}

impl Stump {
    /// The empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the root count agrees with the leaf count.
    pub fn is_well_formed(&self) -> bool {
        self.roots.len() == self.num_leaves.count_ones() as usize
    }

    /// Verify that `hashes` sit at `proof.targets` under these roots.
    ///
    /// An empty proof over no hashes always verifies.
    pub fn verify(&self, hashes: &[Hash256], proof: &Proof) -> Result<(), AccumulatorError> {
        if hashes.len() != proof.targets.len() {
            return Err(AccumulatorError::InvalidProof(format!(
                "{} hashes for {} targets",
                hashes.len(),
                proof.targets.len()
            )));
        }
        if proof.is_empty() {
            return Ok(());
        }
        if !self.is_well_formed() {
            return Err(AccumulatorError::InvalidProof(
                "root count does not match leaf count".into(),
            ));
        }

        let num_leaves = self.num_leaves;
        let rows = tree_rows(num_leaves);

        let mut nodes: BTreeMap<u64, Hash256> = BTreeMap::new();
        let mut seen = HashSet::with_capacity(proof.targets.len());
        for (&target, hash) in proof.targets.iter().zip(hashes) {
            if target >= num_leaves {
                return Err(AccumulatorError::TargetOutOfRange { target, num_leaves });
            }
            if hash.is_zero() {
                return Err(AccumulatorError::EmptyLeaf);
            }
            if !seen.insert(target) {
                return Err(AccumulatorError::DuplicateTarget(target));
            }
            nodes.insert(target, *hash);
        }

        let needed = proof_positions(&proof.targets, num_leaves, rows);
        if needed.len() != proof.hashes.len() {
            return Err(AccumulatorError::InvalidProof(format!(
                "expected {} proof hashes, got {}",
                needed.len(),
                proof.hashes.len()
            )));
        }
        for (pos, hash) in needed.into_iter().zip(&proof.hashes) {
            nodes.insert(pos, *hash);
        }

        let expected: BTreeMap<u64, Hash256> = root_positions(num_leaves)
            .into_iter()
            .zip(self.roots.iter().copied())
            .collect();

        let mut frontier: BTreeSet<u64> = proof.targets.iter().copied().collect();
        for row in 0..=rows {
            let row_nodes: Vec<u64> = frontier
                .iter()
                .copied()
                .filter(|&p| detect_row(p, rows) == row)
                .collect();
            for pos in row_nodes {
                let hash = nodes[&pos];
                if is_root_position(pos, num_leaves, rows) {
                    if expected.get(&pos) != Some(&hash) {
                        return Err(AccumulatorError::ProofMismatch(pos));
                    }
                    continue;
                }
                let sibling = nodes.get(&(pos ^ 1)).copied().ok_or_else(|| {
                    AccumulatorError::InvalidProof(format!("missing sibling of {pos}"))
                })?;
                let (left, right) = if pos & 1 == 0 {
                    (hash, sibling)
                } else {
                    (sibling, hash)
                };
                let up = parent(pos, rows);
                nodes.insert(up, parent_hash(&left, &right));
                frontier.insert(up);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(b: u8) -> Hash256 {
        Hash256([b; 32])
    }

    #[test]
    fn empty_stump_is_well_formed() {
        let s = Stump::new();
        assert!(s.is_well_formed());
        assert!(s.verify(&[], &Proof::default()).is_ok());
    }

    #[test]
    fn verify_two_leaf_tree() {
        let root = parent_hash(&h(1), &h(2));
        let s = Stump { roots: vec![root], num_leaves: 2 };
        assert!(s.verify(&[h(1)], &Proof::new(vec![0], vec![h(2)])).is_ok());
        assert!(s.verify(&[h(2)], &Proof::new(vec![1], vec![h(1)])).is_ok());
        assert!(s.verify(&[h(1), h(2)], &Proof::with_targets(vec![0, 1])).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_leaf() {
        let root = parent_hash(&h(1), &h(2));
        let s = Stump { roots: vec![root], num_leaves: 2 };
        assert_eq!(
            s.verify(&[h(9)], &Proof::new(vec![0], vec![h(2)])),
            Err(AccumulatorError::ProofMismatch(2))
        );
    }

    #[test]
    fn verify_rejects_malformed_proofs() {
        let root = parent_hash(&h(1), &h(2));
        let s = Stump { roots: vec![root], num_leaves: 2 };
        assert!(matches!(
            s.verify(&[h(1)], &Proof::with_targets(vec![0])),
            Err(AccumulatorError::InvalidProof(_))
        ));
        assert_eq!(
            s.verify(&[h(1)], &Proof::new(vec![5], vec![h(2)])),
            Err(AccumulatorError::TargetOutOfRange { target: 5, num_leaves: 2 })
        );
        assert_eq!(
            s.verify(&[h(1), h(1)], &Proof::with_targets(vec![0, 0])),
            Err(AccumulatorError::DuplicateTarget(0))
        );
        assert_eq!(
            s.verify(&[Hash256::ZERO], &Proof::new(vec![0], vec![h(2)])),
            Err(AccumulatorError::EmptyLeaf)
        );
    }

    #[test]
    fn empty_proof_needs_no_hashes() {
        let s = Stump { roots: vec![parent_hash(&h(1), &h(2))], num_leaves: 2 };
        let proof = Proof::default();
        assert!(proof.is_empty());
        assert!(s.verify(&[], &proof).is_ok());
        assert!(!Proof::with_targets(vec![0]).is_empty());
    }

    #[test]
    fn lone_leaf_is_its_own_root() {
        let s = Stump { roots: vec![parent_hash(&h(1), &h(2)), h(3)], num_leaves: 3 };
        assert!(s.verify(&[h(3)], &Proof::with_targets(vec![2])).is_ok());
    }
}
