//! # thicket-core
//! Foundation types and collaborator traits shared by the accumulator and the
//! proof index.

pub mod error;
pub mod leaf;
pub mod traits;
pub mod types;
