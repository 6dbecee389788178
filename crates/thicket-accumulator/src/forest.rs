//! In-memory forest that keeps every node, so it can prove any leaf.
//!
//! Leaves never move: a deleted leaf becomes an empty (zero) slot, and a node
//! whose children are both empty is empty too. This keeps positions stable
//! across modifications, which makes [`undo`](Accumulator::undo) a matter of
//! truncating the additions and refilling the deleted slots.
//!
//! Every modification rebuilds the interior nodes, so cost is linear in the
//! number of leaves ever added. Suitable for tests and small chains.

use std::collections::{HashMap, HashSet};

use thicket_core::types::Hash256;

use crate::error::AccumulatorError;
use crate::proof::Proof;
use crate::traits::Accumulator;
use crate::util::{parent, parent_hash, proof_positions, root_position, tree_rows};

/// Full in-memory accumulator forest.
#[derive(Clone, Debug, Default)]
pub struct MemForest {
    /// Leaf slots in insertion order. Deleted leaves are zero.
    leaves: Vec<Hash256>,
    /// Live leaf hash → position.
    positions: HashMap<Hash256, u64>,
    /// Every node of the forest by position.
    nodes: HashMap<u64, Hash256>,
    /// Roots, tallest tree first.
    roots: Vec<Hash256>,
}

impl MemForest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves that have not been deleted.
    pub fn live_leaves(&self) -> usize {
        self.positions.len()
    }

    /// Recompute interior nodes and roots from the leaf slots.
    fn rebuild(&mut self) {
        let num_leaves = self.leaves.len() as u64;
        let rows = tree_rows(num_leaves);
        self.nodes.clear();

        let mut row: Vec<(u64, Hash256)> = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, h)| (i as u64, *h))
            .collect();

        for r in 0..=rows {
            self.nodes.extend(row.iter().copied());
            if r == rows {
                break;
            }
            // Rows are contiguous and start on an even position, so adjacent
            // pairs are siblings. A trailing odd node is a root.
            row = row
                .chunks(2)
                .filter_map(|pair| match pair {
                    [(left_pos, left), (_, right)] => {
                        Some((parent(*left_pos, rows), parent_hash(left, right)))
                    }
                    _ => None,
                })
                .collect();
        }

        self.roots = (0..=rows)
            .rev()
            .filter(|r| (num_leaves >> r) & 1 == 1)
            .map(|r| self.hash_at(root_position(num_leaves, r, rows)))
            .collect();
    }
}

impl Accumulator for MemForest {
    fn modify(
        &mut self,
        adds: &[Hash256],
        dels: &[Hash256],
        proof: &Proof,
    ) -> Result<(), AccumulatorError> {
        if dels.len() != proof.targets.len() {
            return Err(AccumulatorError::InvalidProof(format!(
                "{} deletions for {} targets",
                dels.len(),
                proof.targets.len()
            )));
        }
        self.verify(dels, proof)?;

        // Validate additions before touching anything.
        let deleted: HashSet<&Hash256> = dels.iter().collect();
        let mut fresh = HashSet::with_capacity(adds.len());
        for add in adds {
            if add.is_zero() {
                return Err(AccumulatorError::EmptyLeaf);
            }
            let present = self.positions.contains_key(add) && !deleted.contains(add);
            if present || !fresh.insert(add) {
                return Err(AccumulatorError::DuplicateLeaf(*add));
            }
        }

        for (&target, hash) in proof.targets.iter().zip(dels) {
            self.leaves[target as usize] = Hash256::ZERO;
            self.positions.remove(hash);
        }
        for add in adds {
            self.positions.insert(*add, self.leaves.len() as u64);
            self.leaves.push(*add);
        }

        self.rebuild();
        tracing::trace!(
            adds = adds.len(),
            dels = dels.len(),
            num_leaves = self.leaves.len(),
            "forest modified"
        );
        Ok(())
    }

    fn undo(
        &mut self,
        num_adds: u64,
        proof: &Proof,
        del_hashes: &[Hash256],
        expected_roots: &[Hash256],
    ) -> Result<(), AccumulatorError> {
        if self.roots.as_slice() != expected_roots {
            return Err(AccumulatorError::RootMismatch);
        }
        if proof.targets.len() != del_hashes.len() {
            return Err(AccumulatorError::InvalidUndo(format!(
                "{} targets for {} deleted hashes",
                proof.targets.len(),
                del_hashes.len()
            )));
        }
        let num_leaves = self.leaves.len() as u64;
        if num_adds > num_leaves {
            return Err(AccumulatorError::InvalidUndo(format!(
                "cannot remove {num_adds} of {num_leaves} leaves"
            )));
        }
        let remaining = num_leaves - num_adds;
        for &target in &proof.targets {
            if target >= remaining {
                return Err(AccumulatorError::TargetOutOfRange {
                    target,
                    num_leaves: remaining,
                });
            }
            if !self.leaves[target as usize].is_zero() {
                return Err(AccumulatorError::InvalidUndo(format!(
                    "position {target} is not empty"
                )));
            }
        }

        for removed in self.leaves.drain(remaining as usize..) {
            self.positions.remove(&removed);
        }
        for (&target, hash) in proof.targets.iter().zip(del_hashes) {
            self.leaves[target as usize] = *hash;
            self.positions.insert(*hash, target);
        }

        self.rebuild();
        tracing::trace!(
            num_adds,
            restored = del_hashes.len(),
            num_leaves = self.leaves.len(),
            "forest undo"
        );
        Ok(())
    }

    fn prove(&self, hashes: &[Hash256]) -> Result<Proof, AccumulatorError> {
        if hashes.is_empty() {
            return Ok(Proof::default());
        }
        let mut targets = Vec::with_capacity(hashes.len());
        let mut seen = HashSet::with_capacity(hashes.len());
        for hash in hashes {
            let pos = *self
                .positions
                .get(hash)
                .ok_or(AccumulatorError::LeafNotFound(*hash))?;
            if !seen.insert(pos) {
                return Err(AccumulatorError::DuplicateTarget(pos));
            }
            targets.push(pos);
        }

        let num_leaves = self.leaves.len() as u64;
        let proof_hashes = proof_positions(&targets, num_leaves, tree_rows(num_leaves))
            .into_iter()
            .map(|pos| self.hash_at(pos))
            .collect();

        Ok(Proof::new(targets, proof_hashes))
    }

    fn leaf_positions(&self, hashes: &[Hash256]) -> Vec<Option<u64>> {
        hashes.iter().map(|h| self.positions.get(h).copied()).collect()
    }

    fn hash_at(&self, position: u64) -> Hash256 {
        self.nodes.get(&position).copied().unwrap_or(Hash256::ZERO)
    }

    fn num_leaves(&self) -> u64 {
        self.leaves.len() as u64
    }

    fn roots(&self) -> Vec<Hash256> {
        self.roots.clone()
    }
}
