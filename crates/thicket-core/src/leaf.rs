//! Leaf data: the per-output record committed to the UTXO accumulator.
//!
//! Each leaf commits to the block that created the output as well as the
//! output itself, so a leaf hash cannot be replayed across blocks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

use crate::types::{Hash256, OutPoint, SpentTxOut, TxOutput};

/// Data hashed into a single accumulator leaf.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct LeafData {
    /// Hash of the block that created the output.
    pub block_hash: Hash256,
    /// The output's outpoint.
    pub outpoint: OutPoint,
    /// Amount in base units.
    pub amount: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
    /// Height of the creating block.
    pub height: u64,
    /// Whether the creating transaction is a coinbase.
    pub is_coinbase: bool,
}

impl LeafData {
    /// Leaf for an output created in the block `block_hash` at `height`.
    pub fn from_output(
        block_hash: Hash256,
        outpoint: OutPoint,
        output: &TxOutput,
        height: u64,
        is_coinbase: bool,
    ) -> Self {
        Self {
            block_hash,
            outpoint,
            amount: output.value,
            script_pubkey: output.script_pubkey.clone(),
            height,
            is_coinbase,
        }
    }

    /// Leaf for a spent output, given the hash of the block that created it.
    pub fn from_spent(block_hash: Hash256, outpoint: OutPoint, stxo: &SpentTxOut) -> Self {
        Self {
            block_hash,
            outpoint,
            amount: stxo.amount,
            script_pubkey: stxo.script_pubkey.clone(),
            height: stxo.height,
            is_coinbase: stxo.is_coinbase,
        }
    }

    /// Height and coinbase flag packed as `height << 1 | coinbase`.
    pub fn header_code(&self) -> u64 {
        (self.height << 1) | u64::from(self.is_coinbase)
    }

    /// Canonical byte layout hashed into the leaf:
    /// block_hash || txid || index || header_code || amount || script_len || script,
    /// integers little-endian.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + 32 + 4 * 8 + self.script_pubkey.len());
        data.extend_from_slice(self.block_hash.as_bytes());
        data.extend_from_slice(self.outpoint.txid.as_bytes());
        data.extend_from_slice(&self.outpoint.index.to_le_bytes());
        data.extend_from_slice(&self.header_code().to_le_bytes());
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.extend_from_slice(&(self.script_pubkey.len() as u64).to_le_bytes());
        data.extend_from_slice(&self.script_pubkey);
        data
    }

    /// SHA-512/256 of the canonical layout.
    pub fn leaf_hash(&self) -> Hash256 {
        Hash256(Sha512_256::digest(self.canonical_bytes()).into())
    }
}

/// Leaf hashes for a slice of leaf data, in order.
pub fn leaf_hashes(leaves: &[LeafData]) -> Vec<Hash256> {
    leaves.iter().map(LeafData::leaf_hash).collect()
}
