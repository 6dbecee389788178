//! Byte layouts of the records stored per block.
//!
//! - proof: [`UData`] in bincode standard config (varint integers)
//! - state: `num_leaves` as u64 little-endian, then each 32-byte root
//! - undo: [`UndoRecord`] in bincode standard config
//!
//! Decoders reject trailing bytes and records that break their own
//! invariants, so a corrupted record surfaces as [`IndexError::Codec`] rather
//! than as a bad accumulator operation. Bincode records are capped at
//! [`MAX_RECORD_SIZE`] encoded bytes on both sides.

use thicket_accumulator::Stump;
use thicket_core::types::Hash256;

use crate::error::IndexError;
use crate::udata::UData;

/// What connecting one block did to the accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct UndoRecord {
    /// Leaves appended by the block.
    pub num_adds: u64,
    /// Positions of the leaves the block deleted.
    pub targets: Vec<u64>,
    /// Hashes of the deleted leaves, aligned with `targets`.
    pub del_hashes: Vec<Hash256>,
}

/// Largest encoded proof or undo record.
pub const MAX_RECORD_SIZE: usize = 32 * 1024 * 1024;

/// Decoder allowance for a record of at most [`MAX_RECORD_SIZE`] bytes.
///
/// Bincode charges containers at their in-memory size, so a varint `u64`
/// costs up to eight times its encoded length.
const DECODE_LIMIT: usize = 16 * MAX_RECORD_SIZE;

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, IndexError> {
    let bytes = bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| IndexError::Codec(e.to_string()))?;
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(IndexError::Codec(format!(
            "record of {} bytes exceeds {MAX_RECORD_SIZE}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, IndexError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(IndexError::Codec(format!(
            "record of {} bytes exceeds {MAX_RECORD_SIZE}",
            bytes.len()
        )));
    }
    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let (value, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| IndexError::Codec(e.to_string()))?;
    if read != bytes.len() {
        return Err(IndexError::Codec(format!(
            "{} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(value)
}

pub fn encode_udata(udata: &UData) -> Result<Vec<u8>, IndexError> {
    encode(udata)
}

pub fn decode_udata(bytes: &[u8]) -> Result<UData, IndexError> {
    let udata: UData = decode(bytes)?;
    if udata.leaf_datas.len() != udata.acc_proof.targets.len() {
        return Err(IndexError::Codec(format!(
            "proof record has {} leaves for {} targets",
            udata.leaf_datas.len(),
            udata.acc_proof.targets.len()
        )));
    }
    Ok(udata)
}

pub fn encode_state(stump: &Stump) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 32 * stump.roots.len());
    out.extend_from_slice(&stump.num_leaves.to_le_bytes());
    for root in &stump.roots {
        out.extend_from_slice(root.as_bytes());
    }
    out
}

pub fn decode_state(bytes: &[u8]) -> Result<Stump, IndexError> {
    let (count, roots) = bytes
        .split_first_chunk::<8>()
        .ok_or_else(|| IndexError::Codec(format!("state record of {} bytes", bytes.len())))?;
    if roots.len() % 32 != 0 {
        return Err(IndexError::Codec(format!(
            "state roots are {} bytes, not a multiple of 32",
            roots.len()
        )));
    }

    let stump = Stump {
        num_leaves: u64::from_le_bytes(*count),
        roots: roots
            .chunks_exact(32)
            .map(Hash256::from_slice)
            .collect::<Result<_, _>>()?,
    };
    if !stump.is_well_formed() {
        return Err(IndexError::Codec(format!(
            "{} roots for {} leaves",
            stump.roots.len(),
            stump.num_leaves
        )));
    }
    Ok(stump)
}

pub fn encode_undo(undo: &UndoRecord) -> Result<Vec<u8>, IndexError> {
    encode(undo)
}

pub fn decode_undo(bytes: &[u8]) -> Result<UndoRecord, IndexError> {
    let undo: UndoRecord = decode(bytes)?;
    if undo.targets.len() != undo.del_hashes.len() {
        return Err(IndexError::Codec(format!(
            "undo record has {} targets for {} hashes",
            undo.targets.len(),
            undo.del_hashes.len()
        )));
    }
    Ok(undo)
}
