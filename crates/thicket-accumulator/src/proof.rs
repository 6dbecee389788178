//! Accumulator inclusion proofs.

use serde::{Deserialize, Serialize};

use thicket_core::types::Hash256;

/// Proof that a set of leaves is committed to by a set of roots.
///
/// `targets[i]` is the position of the i-th proven leaf. `hashes` holds the
/// hashes of [`proof_positions`](crate::util::proof_positions) for the
/// targets, in ascending position order. A proof with only targets is what an
/// undo needs.
#[derive(
    Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Proof {
    /// Leaf positions being proven.
    pub targets: Vec<u64>,
    /// Sibling hashes needed to climb from the targets to the roots.
    pub hashes: Vec<Hash256>,
}

impl Proof {
    pub fn new(targets: Vec<u64>, hashes: Vec<Hash256>) -> Self {
        Self { targets, hashes }
    }

    /// A proof carrying only target positions.
    pub fn with_targets(targets: Vec<u64>) -> Self {
        Self {
            targets,
            hashes: Vec::new(),
        }
    }

    /// Whether this proof proves nothing.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
