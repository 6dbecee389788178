//! Core chain types: hashes, transactions, blocks, UTXO records.
//!
//! Amounts are in base units. Heights and output indices use u64.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;

/// Script opcode marking an output as provably unspendable.
pub const OP_RETURN: u8 = 0x6a;

/// Locking scripts longer than this can never be satisfied.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), block header hashes (double SHA-256),
/// leaf hashes and accumulator roots.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Marks empty accumulator positions and coinbase outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Build a hash from a byte slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHashLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Unlocking script. Arbitrary extra data for coinbase inputs.
    pub script_sig: Vec<u8>,
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Amount in base units.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    /// Whether this output can never be spent and so never enters the UTXO set.
    pub fn is_unspendable(&self) -> bool {
        self.script_pubkey.first() == Some(&OP_RETURN)
            || self.script_pubkey.len() > MAX_SCRIPT_SIZE
    }
}

/// A transaction transferring value between scripts.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height or timestamp before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, CoreError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }
}

/// Block header.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Hash of the previous block header.
    pub prev_hash: Hash256,
    /// Merkle root of the block's transactions.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Compact difficulty target.
    pub difficulty_target: u64,
    /// Proof-of-work nonce.
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing (4 u64 fields + 2 * 32-byte hashes).
    const HASH_SIZE: usize = 4 * 8 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Fixed byte layout: version || prev_hash || merkle_root ||
    /// timestamp || difficulty_target || nonce, all little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.difficulty_target.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header plus transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Ordered list of transactions. First transaction must be coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the block header.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Get the coinbase transaction, if the block is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }
}

/// An entry in the unspent transaction output set, as the chain reports it.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UtxoEntry {
    /// The output.
    pub output: TxOutput,
    /// Height of the block containing this UTXO.
    pub block_height: u64,
    /// Whether this output is from a coinbase transaction.
    pub is_coinbase: bool,
    /// Set once the output has been consumed.
    pub spent: bool,
}

impl UtxoEntry {
    pub fn is_spent(&self) -> bool {
        self.spent
    }
}

/// A spent output as resolved by the chain while connecting or disconnecting
/// a block. One record per non-coinbase input, in block order.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct SpentTxOut {
    /// Amount of the spent output.
    pub amount: u64,
    /// Locking script of the spent output.
    pub script_pubkey: Vec<u8>,
    /// Height of the block that created the output.
    pub height: u64,
    /// Whether the output came from a coinbase transaction.
    pub is_coinbase: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([0x11; 32]),
                    index: 0,
                },
                script_sig: vec![0u8; 72],
            }],
            outputs: vec![TxOutput {
                value: 5_000,
                script_pubkey: vec![0x76, 0xa9, 0x14],
            }],
            lock_time: 0,
        }
    }

    fn sample_coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                script_sig: vec![],
            }],
            outputs: vec![TxOutput {
                value: 5_000_000_000,
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: 1_700_000_000,
            difficulty_target: u64::MAX,
            nonce: 0,
        }
    }

    #[test]
    fn hash256_zero_is_zero() {
        let h = Hash256::ZERO;
        assert!(h.is_zero());
        assert_eq!(h, Hash256::default());
    }

    #[test]
    fn hash256_hex_round_trip() {
        let h = Hash256([0xAB; 32]);
        let s = h.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(&s[0..2], "ab");
        assert_eq!(Hash256::from_hex(&s).unwrap(), h);
    }

    #[test]
    fn hash256_from_slice_rejects_wrong_length() {
        assert_eq!(
            Hash256::from_slice(&[0u8; 31]),
            Err(CoreError::InvalidHashLength(31))
        );
        assert!(matches!(Hash256::from_hex("zz"), Err(CoreError::InvalidHex(_))));
    }

    #[test]
    fn outpoint_null_detection() {
        assert!(OutPoint::null().is_null());
        let op = OutPoint { txid: Hash256([1; 32]), index: 0 };
        assert!(!op.is_null());
        assert!(op.to_string().ends_with(":0"));
    }

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase().is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn txid_changes_with_data() {
        let tx1 = sample_tx();
        let mut tx2 = sample_tx();
        tx2.lock_time = 1;
        assert_eq!(tx1.txid().unwrap(), tx1.txid().unwrap());
        assert_ne!(tx1.txid().unwrap(), tx2.txid().unwrap());
    }

    #[test]
    fn block_header_hash_changes_with_nonce() {
        let h1 = sample_header();
        let mut h2 = h1.clone();
        h2.nonce = 1;
        assert_ne!(h1.hash(), h2.hash());
        assert!(!h1.hash().is_zero());
    }

    #[test]
    fn block_hash_is_header_hash() {
        let block = Block {
            header: sample_header(),
            transactions: vec![sample_coinbase()],
        };
        assert_eq!(block.hash(), block.header.hash());
        assert!(block.coinbase().unwrap().is_coinbase());
    }

    #[test]
    fn op_return_outputs_are_unspendable() {
        let burn = TxOutput { value: 0, script_pubkey: vec![OP_RETURN, 0x04, 1, 2, 3, 4] };
        let huge = TxOutput { value: 1, script_pubkey: vec![0x51; MAX_SCRIPT_SIZE + 1] };
        let normal = TxOutput { value: 1, script_pubkey: vec![0x51] };
        let empty = TxOutput { value: 1, script_pubkey: vec![] };
        assert!(burn.is_unspendable());
        assert!(huge.is_unspendable());
        assert!(!normal.is_unspendable());
        assert!(!empty.is_unspendable());
    }

    #[test]
    fn utxo_entry_spent_flag() {
        let mut entry = UtxoEntry {
            output: TxOutput { value: 10, script_pubkey: vec![0x51] },
            block_height: 3,
            is_coinbase: false,
            spent: false,
        };
        assert!(!entry.is_spent());
        entry.spent = true;
        assert!(entry.is_spent());
    }
}
