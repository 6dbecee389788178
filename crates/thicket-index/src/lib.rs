//! # thicket-index — Accumulator-backed UTXO proof index.
//!
//! Keeps an accumulator over the unspent-output set in lock-step with the
//! best chain, and persists enough per block to serve proofs and to reverse
//! any block exactly:
//! - [`index::ProofIndex`] — block connect/disconnect and the proof-serving API
//! - [`store::IndexDb`] — RocksDB column families with buffered transactions
//! - [`codec`] — byte layouts of the proof, state, and undo records
//! - [`leaves`] — accumulator leaves created and spent by a block
//! - [`config::IndexConfig`] — index configuration and logging setup

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod leaves;
pub mod store;
pub mod udata;

pub use config::IndexConfig;
pub use error::IndexError;
pub use index::{Indexer, ProofIndex};
pub use store::{Bucket, DbTx, IndexDb};
pub use udata::{ChainTipProof, UData};
