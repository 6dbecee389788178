//! Accumulator engine errors.
use thiserror::Error;

use thicket_core::types::Hash256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorError {
    #[error("leaf not in accumulator: {0}")] LeafNotFound(Hash256),
    #[error("leaf already in accumulator: {0}")] DuplicateLeaf(Hash256),
    #[error("zero hash cannot be a leaf")] EmptyLeaf,
    #[error("duplicate target position {0}")] DuplicateTarget(u64),
    #[error("target {target} out of range for {num_leaves} leaves")] TargetOutOfRange { target: u64, num_leaves: u64 },
    #[error("invalid proof: {0}")] InvalidProof(String),
    #[error("proof does not lead to root at position {0}")] ProofMismatch(u64),
    #[error("roots do not match expected state")] RootMismatch,
    #[error("invalid undo: {0}")] InvalidUndo(String),
}
