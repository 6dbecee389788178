//! Proof index errors.
use thiserror::Error;

use thicket_accumulator::AccumulatorError;
use thicket_core::error::CoreError;
use thicket_core::types::Hash256;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("utxo {index} is missing")] UtxoMissing { index: usize },
    #[error("utxo {index} is already spent")] UtxoSpent { index: usize },
    #[error("no main-chain block at height {0}")] UnknownHeight(u64),
    #[error("expected {expected} spent outputs, got {got}")] StxoCountMismatch { expected: usize, got: usize },
    #[error("length mismatch: {0} vs {1}")] LengthMismatch(usize, usize),
    #[error("leaf not in accumulator: {0}")] LeafNotFound(Hash256),
    #[error("accumulator: {0}")] Accumulator(#[from] AccumulatorError),
    #[error(transparent)] Core(#[from] CoreError),
    #[error("storage: {0}")] Storage(String),
    #[error("missing bucket {0}")] MissingBucket(&'static str),
    #[error("no {record} record for block {block}")] NotFound { record: &'static str, block: Hash256 },
    #[error("codec: {0}")] Codec(String),
    #[error("inconsistent state at block {block}: {reason}")] Consistency { block: Hash256, reason: String },
}

impl From<rocksdb::Error> for IndexError {
    fn from(e: rocksdb::Error) -> Self {
        IndexError::Storage(e.to_string())
    }
}
