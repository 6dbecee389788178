//! Proof data served by the index.

use serde::{Deserialize, Serialize};

use thicket_accumulator::Proof;
use thicket_core::leaf::{LeafData, leaf_hashes};
use thicket_core::types::Hash256;

/// Accumulator proof for the outputs a block spends, with their leaf data.
#[derive(
    Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UData {
    /// One entry per spent output, in proof target order.
    pub leaf_datas: Vec<LeafData>,
    /// Proof of the leaves in `leaf_datas`.
    pub acc_proof: Proof,
}

impl UData {
    /// Leaf hashes of the proven outputs.
    pub fn leaf_hashes(&self) -> Vec<Hash256> {
        leaf_hashes(&self.leaf_datas)
    }
}

/// Proof of a set of outputs against the chain tip.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChainTipProof {
    /// Tip the proof was generated at.
    pub proved_at_hash: Hash256,
    pub acc_proof: Proof,
    /// Leaf hashes the proof covers, in target order.
    pub hashes_proven: Vec<Hash256>,
}
