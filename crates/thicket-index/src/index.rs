//! The accumulator-backed UTXO proof index.
//!
//! [`ProofIndex`] keeps an accumulator over the unspent-output set in step
//! with the best chain. For every connected block it stores, keyed by block
//! hash:
//! - the proof of the outputs the block spent (skipped when pruned)
//! - the accumulator state after the block
//! - an undo record, so the block can be disconnected exactly
//!
//! All records of a block are written through the caller's [`DbTx`], so they
//! commit together or not at all. The accumulator change is registered as a
//! rollback hook on the same transaction and is reversed if it never commits.
//!
//! Connect and disconnect are driven sequentially by the chain-tip manager.
//! Proof-serving reads may run concurrently with them; the accumulator sits
//! behind a [`RwLock`] and every read holds the shared mode for the whole
//! engine interaction.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, error, info, trace, warn};

use thicket_accumulator::{Accumulator, AccumulatorError, Proof, Stump};
use thicket_core::leaf::{LeafData, leaf_hashes};
use thicket_core::traits::ChainView;
use thicket_core::types::{Block, Hash256, OutPoint, SpentTxOut, UtxoEntry};

use crate::codec::{self, UndoRecord};
use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::leaves::{block_to_add_leaves, block_to_del_leaves, dedupe_block};
use crate::store::{Bucket, DbTx, IndexDb, INDEX_NAMESPACE};
use crate::udata::{ChainTipProof, UData};

/// Human-readable index name.
pub const INDEX_NAME: &str = "utreexo proof index";

/// A block index maintained alongside the best chain.
///
/// The chain-tip manager calls [`connect_block`](Indexer::connect_block) and
/// [`disconnect_block`](Indexer::disconnect_block) in chain order, each inside
/// a storage transaction it commits afterwards. An error means the caller
/// must drop the transaction, which also reverts any in-memory state the
/// index changed.
pub trait Indexer {
    fn name(&self) -> &'static str;

    /// Key of the index's parent namespace in the database.
    fn key(&self) -> &'static [u8];

    /// Whether connect and disconnect need the spent outputs of the block.
    fn needs_inputs(&self) -> bool;

    /// Allocate the index's storage. Called once, on first use.
    fn create(&self) -> Result<(), IndexError>;

    /// Called on every startup after [`create`](Indexer::create).
    fn init(&self) -> Result<(), IndexError>;

    fn connect_block(
        &self,
        tx: &mut DbTx<'_>,
        block: &Block,
        height: u64,
        stxos: &[SpentTxOut],
    ) -> Result<(), IndexError>;

    fn disconnect_block(
        &self,
        tx: &mut DbTx<'_>,
        block: &Block,
        height: u64,
        stxos: &[SpentTxOut],
    ) -> Result<(), IndexError>;

    /// Called when an old block is deleted from block storage.
    fn prune_block(&self, tx: &mut DbTx<'_>, block_hash: &Hash256) -> Result<(), IndexError>;
}

/// Accumulator-backed UTXO proof index.
pub struct ProofIndex<A: Accumulator> {
    db: Arc<IndexDb>,
    chain: Arc<dyn ChainView>,
    pruned: bool,
    state: Arc<RwLock<A>>,
}

impl<A: Accumulator + 'static> ProofIndex<A> {
    /// Index over `db`, starting from `accumulator`.
    ///
    /// `accumulator` must match the state stored for the current chain tip;
    /// see [`check_tip_state`](Self::check_tip_state).
    pub fn new(db: Arc<IndexDb>, chain: Arc<dyn ChainView>, accumulator: A, pruned: bool) -> Self {
        Self {
            db,
            chain,
            pruned,
            state: Arc::new(RwLock::new(accumulator)),
        }
    }

    /// Open the index database under `config` and create the index if needed.
    pub fn open(
        config: &IndexConfig,
        chain: Arc<dyn ChainView>,
        accumulator: A,
    ) -> Result<Self, IndexError> {
        let db = Arc::new(IndexDb::open(config.db_path())?);
        let index = Self::new(db, chain, accumulator, config.pruned);
        if !is_initialized(&index.db) {
            index.create()?;
        }
        index.init()?;
        Ok(index)
    }

    /// Whether per-block proofs are being discarded.
    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    /// Shared database handle.
    pub fn db(&self) -> &Arc<IndexDb> {
        &self.db
    }

    /// Current accumulator roots and leaf count.
    pub fn current_state(&self) -> Stump {
        self.state.read().stump()
    }

    /// Stored proof of the outputs spent by `block_hash`.
    ///
    /// # Errors
    ///
    /// [`IndexError::NotFound`] if the block was never indexed or the index is
    /// pruned.
    pub fn fetch_utreexo_proof(&self, block_hash: &Hash256) -> Result<UData, IndexError> {
        let bytes = self.fetch_record(Bucket::Proof, block_hash)?;
        codec::decode_udata(&bytes)
    }

    /// Accumulator state stored for `block_hash`.
    pub fn fetch_utreexo_state(&self, block_hash: &Hash256) -> Result<Stump, IndexError> {
        let bytes = self.fetch_record(Bucket::State, block_hash)?;
        codec::decode_state(&bytes)
    }

    /// Current positions of `hashes`; `None` for hashes not in the accumulator.
    pub fn get_leaf_hash_positions(&self, hashes: &[Hash256]) -> Vec<Option<u64>> {
        self.state.read().leaf_positions(hashes)
    }

    /// Proof data for `dels` against the current accumulator. Nothing is stored.
    pub fn generate_udata(&self, dels: Vec<LeafData>) -> Result<UData, IndexError> {
        let hashes = leaf_hashes(&dels);
        let acc_proof = self.state.read().prove(&hashes)?;
        Ok(UData {
            leaf_datas: dels,
            acc_proof,
        })
    }

    /// Proof data for `dels` carrying only the node hashes at `positions`.
    ///
    /// For a caller that already holds the rest of the proof.
    pub fn generate_udata_partial(
        &self,
        dels: Vec<LeafData>,
        positions: &[u64],
    ) -> Result<UData, IndexError> {
        let del_hashes = leaf_hashes(&dels);
        let state = self.state.read();

        let hashes = positions.iter().map(|&pos| state.hash_at(pos)).collect();
        let targets = state
            .leaf_positions(&del_hashes)
            .into_iter()
            .zip(&del_hashes)
            .map(|(pos, hash)| pos.ok_or(IndexError::LeafNotFound(*hash)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UData {
            leaf_datas: dels,
            acc_proof: Proof::new(targets, hashes),
        })
    }

    /// Prove `utxos` against the accumulator at the current chain tip.
    ///
    /// `outpoints[i]` is the outpoint of `utxos[i]`. A proof is only valid for
    /// the tip it reports in [`ChainTipProof::proved_at_hash`].
    pub fn prove_utxos(
        &self,
        utxos: &[Option<UtxoEntry>],
        outpoints: &[OutPoint],
    ) -> Result<ChainTipProof, IndexError> {
        if utxos.len() != outpoints.len() {
            return Err(IndexError::LengthMismatch(utxos.len(), outpoints.len()));
        }

        let mut leaves = Vec::with_capacity(utxos.len());
        for (index, (utxo, outpoint)) in utxos.iter().zip(outpoints).enumerate() {
            let utxo = utxo.as_ref().ok_or(IndexError::UtxoMissing { index })?;
            if utxo.is_spent() {
                return Err(IndexError::UtxoSpent { index });
            }
            let block_hash = self
                .chain
                .block_hash_by_height(utxo.block_height)
                .ok_or(IndexError::UnknownHeight(utxo.block_height))?;
            leaves.push(LeafData::from_output(
                block_hash,
                outpoint.clone(),
                &utxo.output,
                utxo.block_height,
                utxo.is_coinbase,
            ));
        }
        let hashes = leaf_hashes(&leaves);

        // Holding the read lock keeps the tip and the accumulator in step.
        let state = self.state.read();
        let acc_proof = state.prove(&hashes)?;
        let proved_at_hash = self.chain.best_snapshot().hash;

        Ok(ChainTipProof {
            proved_at_hash,
            acc_proof,
            hashes_proven: hashes,
        })
    }

    /// Verify `proof` for `hashes` against the current accumulator.
    pub fn verify_acc_proof(&self, hashes: &[Hash256], proof: &Proof) -> Result<(), IndexError> {
        Ok(self.state.read().verify(hashes, proof)?)
    }

    /// Check the accumulator against the state stored for the chain tip.
    ///
    /// Run after startup: a crash between an accumulator update and the
    /// commit of its records leaves the two out of step.
    pub fn check_tip_state(&self) -> Result<(), IndexError> {
        let best = self.chain.best_snapshot();
        let expected = if best.height == 0 {
            Stump::new()
        } else {
            self.fetch_utreexo_state(&best.hash)?
        };
        let current = self.current_state();
        if current != expected {
            warn!(
                tip = %best.hash,
                height = best.height,
                expected_leaves = expected.num_leaves,
                current_leaves = current.num_leaves,
                "accumulator does not match stored tip state"
            );
            return Err(IndexError::Consistency {
                block: best.hash,
                reason: format!(
                    "accumulator has {} leaves, tip state has {}",
                    current.num_leaves, expected.num_leaves
                ),
            });
        }
        Ok(())
    }

    fn fetch_record(&self, bucket: Bucket, block_hash: &Hash256) -> Result<Vec<u8>, IndexError> {
        self.db
            .view(|tx| tx.get(bucket, block_hash))?
            .ok_or(IndexError::NotFound {
                record: bucket.record(),
                block: *block_hash,
            })
    }
}

impl<A: Accumulator + 'static> Indexer for ProofIndex<A> {
    fn name(&self) -> &'static str {
        INDEX_NAME
    }

    fn key(&self) -> &'static [u8] {
        INDEX_NAMESPACE.as_bytes()
    }

    fn needs_inputs(&self) -> bool {
        true
    }

    fn create(&self) -> Result<(), IndexError> {
        self.db.create_buckets()?;
        info!(index = INDEX_NAME, "created index buckets");
        Ok(())
    }

    fn init(&self) -> Result<(), IndexError> {
        Ok(())
    }

    fn connect_block(
        &self,
        tx: &mut DbTx<'_>,
        block: &Block,
        height: u64,
        stxos: &[SpentTxOut],
    ) -> Result<(), IndexError> {
        if height == 0 {
            trace!(height, "skipping genesis block");
            return Ok(());
        }
        ensure_buckets(&self.db)?;

        let block_hash = block.hash();
        let dedupe = dedupe_block(block)?;
        let dels = block_to_del_leaves(stxos, self.chain.as_ref(), block, &dedupe.in_skip)?;
        let adds = block_to_add_leaves(block, block_hash, height, &dedupe.out_skip)?;
        let add_hashes = leaf_hashes(&adds);
        let del_hashes = leaf_hashes(&dels);

        // No writer may slip in between proving and modifying.
        let state = self.state.upgradable_read();
        let acc_proof = state.prove(&del_hashes)?;

        let undo = UndoRecord {
            num_adds: add_hashes.len() as u64,
            targets: acc_proof.targets.clone(),
            del_hashes,
        };
        let udata = UData {
            leaf_datas: dels,
            acc_proof,
        };

        if !self.pruned {
            tx.put(Bucket::Proof, block_hash, codec::encode_udata(&udata)?)?;
        }
        tx.put(Bucket::Undo, block_hash, codec::encode_undo(&undo)?)?;

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.modify(&add_hashes, &undo.del_hashes, &udata.acc_proof)?;
        let after = state.stump();
        drop(state);

        let lock = Arc::clone(&self.state);
        let (rollback, roots) = (undo.clone(), after.roots.clone());
        tx.on_rollback(move || {
            let targets = Proof::with_targets(rollback.targets);
            let mut state = lock.write();
            match state.undo(rollback.num_adds, &targets, &rollback.del_hashes, &roots) {
                Ok(()) => debug!(height, block = %block_hash, "rolled back connect"),
                Err(e) => error!(height, block = %block_hash, error = %e, "failed to roll back connect"),
            }
        });

        tx.put(Bucket::State, block_hash, codec::encode_state(&after))?;

        debug!(
            height,
            block = %block_hash,
            adds = add_hashes.len(),
            dels = undo.del_hashes.len(),
            num_leaves = after.num_leaves,
            "connected block"
        );
        Ok(())
    }

    fn disconnect_block(
        &self,
        tx: &mut DbTx<'_>,
        block: &Block,
        height: u64,
        _stxos: &[SpentTxOut],
    ) -> Result<(), IndexError> {
        if height == 0 {
            trace!(height, "skipping genesis block");
            return Ok(());
        }

        let block_hash = block.hash();
        let snapshot = match tx.get(Bucket::State, &block_hash)? {
            Some(bytes) => codec::decode_state(&bytes)?,
            None => return Err(IndexError::NotFound { record: "state", block: block_hash }),
        };
        let undo = match tx.get(Bucket::Undo, &block_hash)? {
            Some(bytes) => codec::decode_undo(&bytes)?,
            None => return Err(IndexError::NotFound { record: "undo", block: block_hash }),
        };

        {
            let mut state = self.state.write();
            if state.num_leaves() != snapshot.num_leaves {
                warn!(height, block = %block_hash, "leaf count does not match stored state");
                return Err(IndexError::Consistency {
                    block: block_hash,
                    reason: format!(
                        "accumulator has {} leaves, stored state has {}",
                        state.num_leaves(),
                        snapshot.num_leaves
                    ),
                });
            }
            let first_add = state.num_leaves().saturating_sub(undo.num_adds);
            let added: Vec<Hash256> =
                (first_add..state.num_leaves()).map(|pos| state.hash_at(pos)).collect();
            let targets = Proof::with_targets(undo.targets.clone());
            match state.undo(undo.num_adds, &targets, &undo.del_hashes, &snapshot.roots) {
                Ok(()) => {
                    let lock = Arc::clone(&self.state);
                    let del_hashes = undo.del_hashes.clone();
                    tx.on_rollback(move || {
                        let mut state = lock.write();
                        let redone = state
                            .prove(&del_hashes)
                            .and_then(|proof| state.modify(&added, &del_hashes, &proof));
                        match redone {
                            Ok(()) => debug!(height, block = %block_hash, "rolled back disconnect"),
                            Err(e) => error!(
                                height,
                                block = %block_hash,
                                error = %e,
                                "failed to roll back disconnect"
                            ),
                        }
                    });
                }
                Err(AccumulatorError::RootMismatch) => {
                    warn!(height, block = %block_hash, "roots do not match stored state");
                    return Err(IndexError::Consistency {
                        block: block_hash,
                        reason: "accumulator roots differ from stored state".into(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.delete(Bucket::Proof, block_hash)?;
        tx.delete(Bucket::State, block_hash)?;
        tx.delete(Bucket::Undo, block_hash)?;

        debug!(
            height,
            block = %block_hash,
            removed = undo.num_adds,
            restored = undo.del_hashes.len(),
            "disconnected block"
        );
        Ok(())
    }

    fn prune_block(&self, _tx: &mut DbTx<'_>, block_hash: &Hash256) -> Result<(), IndexError> {
        // Proofs are kept until a retention depth for reorgs is settled.
        trace!(block = %block_hash, "prune request ignored");
        Ok(())
    }
}

/// Whether every proof index bucket exists in `db`.
pub fn is_initialized(db: &IndexDb) -> bool {
    Bucket::ALL.iter().all(|bucket| db.has_bucket(*bucket))
}

/// Remove the proof index and all of its records from `db`.
pub fn drop_index(db: &IndexDb) -> Result<(), IndexError> {
    db.drop_buckets()?;
    info!(index = INDEX_NAME, "dropped index");
    Ok(())
}

fn ensure_buckets(db: &IndexDb) -> Result<(), IndexError> {
    match Bucket::ALL.into_iter().find(|bucket| !db.has_bucket(*bucket)) {
        Some(missing) => Err(IndexError::MissingBucket(missing.name())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket_accumulator::MemForest;
    use thicket_core::traits::BestState;

    struct Tip;

    impl ChainView for Tip {
        fn block_hash_by_height(&self, _height: u64) -> Option<Hash256> {
            None
        }

        fn best_snapshot(&self) -> BestState {
            BestState { height: 0, hash: Hash256::ZERO }
        }
    }

    fn index(dir: &tempfile::TempDir) -> ProofIndex<MemForest> {
        let config = IndexConfig {
            data_dir: dir.path().to_path_buf(),
            ..IndexConfig::default()
        };
        ProofIndex::open(&config, Arc::new(Tip), MemForest::new()).unwrap()
    }

    #[test]
    fn lifecycle_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let idx = index(&dir);
        assert_eq!(idx.name(), INDEX_NAME);
        assert_eq!(idx.key(), b"utreexoproofindex");
        assert!(idx.needs_inputs());
        assert!(!idx.is_pruned());
    }

    #[test]
    fn open_creates_buckets_and_drop_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        let idx = index(&dir);
        assert!(is_initialized(idx.db()));
        drop_index(idx.db()).unwrap();
        assert!(!is_initialized(idx.db()));
    }

    #[test]
    fn empty_index_matches_genesis_tip() {
        let dir = tempfile::tempdir().unwrap();
        let idx = index(&dir);
        idx.check_tip_state().unwrap();
        assert_eq!(idx.current_state(), Stump::new());
    }

    #[test]
    fn unknown_leaf_has_no_position() {
        let dir = tempfile::tempdir().unwrap();
        let idx = index(&dir);
        assert_eq!(idx.get_leaf_hash_positions(&[Hash256([1; 32])]), vec![None]);
        assert!(matches!(
            idx.fetch_utreexo_proof(&Hash256([1; 32])),
            Err(IndexError::NotFound { record: "proof", .. })
        ));
    }

    #[test]
    fn prune_block_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let idx = index(&dir);
        let mut tx = idx.db().begin();
        idx.prune_block(&mut tx, &Hash256([1; 32])).unwrap();
        assert_eq!(tx.pending_writes(), 0);
    }
}
