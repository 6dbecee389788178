//! # thicket-accumulator
//! The accumulator engine contract consumed by the proof index, plus an
//! in-memory reference forest.
//!
//! - [`Accumulator`] — add/delete leaves, prove, verify, undo
//! - [`Proof`] — target positions plus the sibling hashes needed to reach the roots
//! - [`Stump`] — roots and leaf count; enough to verify proofs
//! - [`MemForest`] — keeps every node in memory so it can prove any leaf

pub mod error;
pub mod forest;
pub mod proof;
pub mod stump;
pub mod traits;
pub mod util;

pub use error::AccumulatorError;
pub use forest::MemForest;
pub use proof::Proof;
pub use stump::Stump;
pub use traits::Accumulator;
