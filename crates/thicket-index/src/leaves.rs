//! Accumulator leaves created and spent by a block.
//!
//! Inputs are numbered across all non-coinbase inputs of the block, in order.
//! Outputs are numbered across all outputs of all transactions, in order. An
//! output spent later in the same block never enters the accumulator, so both
//! the spend and the output are skipped.

use std::collections::{HashMap, HashSet};

use thicket_core::leaf::LeafData;
use thicket_core::traits::ChainView;
use thicket_core::types::{Block, Hash256, OutPoint, SpentTxOut};

use crate::error::IndexError;

/// Same-block spends of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockDedupe {
    /// Input numbers that spend an output created in the same block, ascending.
    pub in_skip: Vec<usize>,
    /// Output numbers spent in the same block, ascending.
    pub out_skip: Vec<usize>,
    /// Total number of outputs in the block.
    pub out_count: usize,
}

/// Find the inputs and outputs that cancel out within `block`.
pub fn dedupe_block(block: &Block) -> Result<BlockDedupe, IndexError> {
    let mut created: HashMap<OutPoint, usize> = HashMap::new();
    let mut dedupe = BlockDedupe::default();
    let mut in_count = 0usize;

    for tx in &block.transactions {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                if let Some(out_idx) = created.remove(&input.previous_output) {
                    dedupe.in_skip.push(in_count);
                    dedupe.out_skip.push(out_idx);
                }
                in_count += 1;
            }
        }

        let txid = tx.txid()?;
        for index in 0..tx.outputs.len() {
            created.insert(OutPoint { txid, index: index as u64 }, dedupe.out_count);
            dedupe.out_count += 1;
        }
    }

    dedupe.out_skip.sort_unstable();
    Ok(dedupe)
}

/// Leaves deleted by `block`.
///
/// `stxos` holds one spent output per non-coinbase input, in input order.
/// Inputs listed in `in_skip` are left out.
pub fn block_to_del_leaves(
    stxos: &[SpentTxOut],
    chain: &dyn ChainView,
    block: &Block,
    in_skip: &[usize],
) -> Result<Vec<LeafData>, IndexError> {
    let inputs: Vec<&OutPoint> = block
        .transactions
        .iter()
        .filter(|tx| !tx.is_coinbase())
        .flat_map(|tx| tx.inputs.iter().map(|input| &input.previous_output))
        .collect();
    if inputs.len() != stxos.len() {
        return Err(IndexError::StxoCountMismatch {
            expected: inputs.len(),
            got: stxos.len(),
        });
    }

    let skip: HashSet<usize> = in_skip.iter().copied().collect();
    let mut leaves = Vec::with_capacity(inputs.len() - skip.len().min(inputs.len()));
    for (i, (outpoint, stxo)) in inputs.into_iter().zip(stxos).enumerate() {
        if skip.contains(&i) {
            continue;
        }
        let block_hash = chain
            .block_hash_by_height(stxo.height)
            .ok_or(IndexError::UnknownHeight(stxo.height))?;
        leaves.push(LeafData::from_spent(block_hash, outpoint.clone(), stxo));
    }
    Ok(leaves)
}

/// Leaves created by `block` at `height`.
///
/// Outputs listed in `out_skip` and provably unspendable outputs are left out.
pub fn block_to_add_leaves(
    block: &Block,
    block_hash: Hash256,
    height: u64,
    out_skip: &[usize],
) -> Result<Vec<LeafData>, IndexError> {
    let skip: HashSet<usize> = out_skip.iter().copied().collect();
    let mut leaves = Vec::new();
    let mut out_count = 0usize;

    for tx in &block.transactions {
        let txid = tx.txid()?;
        let is_coinbase = tx.is_coinbase();
        for (index, output) in tx.outputs.iter().enumerate() {
            let skipped = skip.contains(&out_count);
            out_count += 1;
            if skipped || output.is_unspendable() {
                continue;
            }
            let outpoint = OutPoint { txid, index: index as u64 };
            leaves.push(LeafData::from_output(block_hash, outpoint, output, height, is_coinbase));
        }
    }
    Ok(leaves)
}
