//! The accumulator engine contract.
//!
//! The proof index depends only on [`Accumulator`]; any forest representation
//! that can prove arbitrary leaves and reverse a modification can back it.

use thicket_core::types::Hash256;

use crate::error::AccumulatorError;
use crate::proof::Proof;
use crate::stump::Stump;

/// A dynamic hash accumulator over the unspent-output set.
///
/// Mutated only through [`modify`](Accumulator::modify) and
/// [`undo`](Accumulator::undo). Callers serialize access; implementations do
/// no locking of their own.
pub trait Accumulator: Send + Sync {
    /// Add `adds` and delete `dels`, which `proof` must prove against the
    /// current roots.
    ///
    /// On error the accumulator is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`AccumulatorError::InvalidProof`] / [`AccumulatorError::ProofMismatch`]
    ///   if `proof` does not prove `dels`
    /// - [`AccumulatorError::DuplicateLeaf`] if an added hash is already present
    fn modify(
        &mut self,
        adds: &[Hash256],
        dels: &[Hash256],
        proof: &Proof,
    ) -> Result<(), AccumulatorError>;

    /// Reverse the last [`modify`](Accumulator::modify).
    ///
    /// `num_adds` leaves are removed from the end, and `del_hashes` are put
    /// back at `proof.targets`. The current roots must equal
    /// `expected_roots` first, otherwise nothing changes.
    ///
    /// # Errors
    ///
    /// - [`AccumulatorError::RootMismatch`] if the current roots differ from `expected_roots`
    /// - [`AccumulatorError::InvalidUndo`] if the parameters cannot describe the last modify
    fn undo(
        &mut self,
        num_adds: u64,
        proof: &Proof,
        del_hashes: &[Hash256],
        expected_roots: &[Hash256],
    ) -> Result<(), AccumulatorError>;

    /// Prove that `hashes` are in the accumulator. Targets follow the order
    /// of `hashes`.
    fn prove(&self, hashes: &[Hash256]) -> Result<Proof, AccumulatorError>;

    /// Verify `proof` for `hashes` against the current roots.
    fn verify(&self, hashes: &[Hash256], proof: &Proof) -> Result<(), AccumulatorError> {
        self.stump().verify(hashes, proof)
    }

    /// Current position of each hash, `None` for hashes not in the accumulator.
    fn leaf_positions(&self, hashes: &[Hash256]) -> Vec<Option<u64>>;

    /// Hash stored at `position`, or the zero hash if the position is empty
    /// or does not exist.
    fn hash_at(&self, position: u64) -> Hash256;

    /// Total number of leaves ever added.
    fn num_leaves(&self) -> u64;

    /// Current roots, tallest tree first.
    fn roots(&self) -> Vec<Hash256>;

    /// Roots and leaf count together.
    fn stump(&self) -> Stump {
        Stump {
            roots: self.roots(),
            num_leaves: self.num_leaves(),
        }
    }
}
