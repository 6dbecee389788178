//! Shared fixtures for proof index integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::RwLock;

use thicket_accumulator::MemForest;
use thicket_core::leaf::LeafData;
use thicket_core::traits::{BestState, ChainView};
use thicket_core::types::{
    Block, BlockHeader, Hash256, OutPoint, SpentTxOut, Transaction, TxInput, TxOutput, UtxoEntry,
};
use thicket_index::{IndexConfig, IndexDb, Indexer, IndexError, ProofIndex};

/// Best chain kept as a list of block hashes by height.
pub struct MockChain {
    hashes: RwLock<Vec<Hash256>>,
}

impl MockChain {
    pub fn new(genesis: Hash256) -> Self {
        Self {
            hashes: RwLock::new(vec![genesis]),
        }
    }

    pub fn push(&self, hash: Hash256) {
        self.hashes.write().push(hash);
    }

    pub fn pop(&self) {
        self.hashes.write().pop();
    }

    pub fn tip(&self) -> BestState {
        let hashes = self.hashes.read();
        BestState {
            height: hashes.len() as u64 - 1,
            hash: hashes[hashes.len() - 1],
        }
    }
}

impl ChainView for MockChain {
    fn block_hash_by_height(&self, height: u64) -> Option<Hash256> {
        self.hashes.read().get(height as usize).copied()
    }

    fn best_snapshot(&self) -> BestState {
        self.tip()
    }
}

/// A proof index over a temporary database, with the chain it follows.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub chain: Arc<MockChain>,
    pub index: ProofIndex<MemForest>,
    pub blocks: Vec<Block>,
}

impl Harness {
    pub fn new(pruned: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = IndexConfig {
            data_dir: dir.path().to_path_buf(),
            pruned,
            ..IndexConfig::default()
        };
        let genesis = make_block(Hash256::ZERO, 0, vec![coinbase(0, &[50])]);
        let chain = Arc::new(MockChain::new(genesis.hash()));
        let index = ProofIndex::open(&config, chain.clone(), MemForest::new()).unwrap();
        Self {
            dir,
            chain,
            index,
            blocks: vec![genesis],
        }
    }

    pub fn db(&self) -> &IndexDb {
        self.index.db()
    }

    pub fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn tip_hash(&self) -> Hash256 {
        self.blocks[self.blocks.len() - 1].hash()
    }

    /// Build the next block on the tip from `txs` (coinbase added).
    pub fn next_block(&self, coinbase_values: &[u64], txs: Vec<Transaction>) -> Block {
        let height = self.height() + 1;
        let mut all = vec![coinbase(height, coinbase_values)];
        all.extend(txs);
        make_block(self.tip_hash(), height, all)
    }

    /// Connect `block` at the next height and commit.
    pub fn connect(&mut self, block: Block, stxos: &[SpentTxOut]) -> Result<(), IndexError> {
        let height = self.height() + 1;
        self.index
            .db()
            .update(|tx| self.index.connect_block(tx, &block, height, stxos))?;
        self.chain.push(block.hash());
        self.blocks.push(block);
        Ok(())
    }

    /// Disconnect the tip block and commit.
    pub fn disconnect(&mut self) -> Result<Block, IndexError> {
        let height = self.height();
        let block = self.blocks[height as usize].clone();
        self.index
            .db()
            .update(|tx| self.index.disconnect_block(tx, &block, height, &[]))?;
        self.chain.pop();
        self.blocks.pop();
        Ok(block)
    }

    /// Outpoint of output `out` of transaction `tx` in the block at `height`.
    pub fn outpoint(&self, height: u64, tx: usize, out: usize) -> OutPoint {
        let txn = &self.blocks[height as usize].transactions[tx];
        OutPoint {
            txid: txn.txid().unwrap(),
            index: out as u64,
        }
    }

    /// Spent-output record for output `out` of transaction `tx` at `height`.
    pub fn stxo(&self, height: u64, tx: usize, out: usize) -> SpentTxOut {
        let txn = &self.blocks[height as usize].transactions[tx];
        let output = &txn.outputs[out];
        SpentTxOut {
            amount: output.value,
            script_pubkey: output.script_pubkey.clone(),
            height,
            is_coinbase: tx == 0,
        }
    }

    /// Unspent entry for output `out` of transaction `tx` at `height`.
    pub fn utxo(&self, height: u64, tx: usize, out: usize) -> UtxoEntry {
        let txn = &self.blocks[height as usize].transactions[tx];
        UtxoEntry {
            output: txn.outputs[out].clone(),
            block_height: height,
            is_coinbase: tx == 0,
            spent: false,
        }
    }

    /// Leaf committed for output `out` of transaction `tx` at `height`.
    pub fn leaf(&self, height: u64, tx: usize, out: usize) -> LeafData {
        let block = &self.blocks[height as usize];
        LeafData::from_output(
            block.hash(),
            self.outpoint(height, tx, out),
            &block.transactions[tx].outputs[out],
            height,
            tx == 0,
        )
    }
}

pub fn output(value: u64) -> TxOutput {
    TxOutput {
        value,
        script_pubkey: vec![0x51, (value & 0xff) as u8, (value >> 8) as u8],
    }
}

pub fn coinbase(height: u64, values: &[u64]) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            script_sig: height.to_le_bytes().to_vec(),
        }],
        outputs: values.iter().copied().map(output).collect(),
        lock_time: height,
    }
}

pub fn spend(prev: &[OutPoint], values: &[u64]) -> Transaction {
    Transaction {
        version: 1,
        inputs: prev
            .iter()
            .map(|op| TxInput {
                previous_output: op.clone(),
                script_sig: vec![0; 8],
            })
            .collect(),
        outputs: values.iter().copied().map(output).collect(),
        lock_time: 0,
    }
}

pub fn make_block(prev_hash: Hash256, height: u64, txs: Vec<Transaction>) -> Block {
    Block {
        header: BlockHeader {
            version: 1,
            prev_hash,
            merkle_root: Hash256::ZERO,
            timestamp: 1_000_000 + height * 60,
            difficulty_target: u64::MAX,
            nonce: height,
        },
        transactions: txs,
    }
}
