//! Error types for core chain data.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid hash length: {0}")] InvalidHashLength(usize),
}
