//! RocksDB-backed storage for the proof index records.
//!
//! Each record kind lives in its own column family under the
//! `utreexoproofindex` namespace, keyed by the 32-byte block hash. Writes are
//! buffered in a [`DbTx`] and land as one atomic [`WriteBatch`] on
//! [`commit`](DbTx::commit). Dropping a transaction discards its writes and
//! runs its rollback hooks, newest first.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rocksdb::{BoundColumnFamily, DBWithThreadMode, MultiThreaded, Options, WriteBatch};

use thicket_core::types::Hash256;

use crate::error::IndexError;

type Db = DBWithThreadMode<MultiThreaded>;

/// Parent namespace of the proof index column families.
pub const INDEX_NAMESPACE: &str = "utreexoproofindex";

/// A record kind of the proof index, one column family each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    /// Per-block proof data ([`UData`](crate::udata::UData)).
    Proof,
    /// Accumulator state after the block was connected.
    State,
    /// What the block added and deleted, for disconnect.
    Undo,
}

impl Bucket {
    /// All proof index buckets.
    pub const ALL: [Bucket; 3] = [Bucket::Proof, Bucket::State, Bucket::Undo];

    /// Column family name.
    pub fn name(self) -> &'static str {
        match self {
            Bucket::Proof => "utreexoproofindex/proof",
            Bucket::State => "utreexoproofindex/state",
            Bucket::Undo => "utreexoproofindex/undo",
        }
    }

    /// Record name used in errors and logs.
    pub fn record(self) -> &'static str {
        match self {
            Bucket::Proof => "proof",
            Bucket::State => "state",
            Bucket::Undo => "undo",
        }
    }
}

/// Index database handle.
///
/// Column families are created and dropped at runtime, so the handle is
/// shared (`&self`) for every operation.
pub struct IndexDb {
    db: Db,
}

impl IndexDb {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Opens every column family already present; the proof index buckets
    /// are only created by [`create_buckets`](Self::create_buckets).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);

        // A fresh database has only the default family; anything else must list.
        let existing = if path.as_ref().join("CURRENT").exists() {
            Db::list_cf(&db_opts, path.as_ref())?
        } else {
            vec![rocksdb::DEFAULT_COLUMN_FAMILY_NAME.to_string()]
        };

        let db = Db::open_cf(&db_opts, path.as_ref(), existing)?;
        Ok(Self { db })
    }

    /// Whether the column family for `bucket` exists.
    pub fn has_bucket(&self, bucket: Bucket) -> bool {
        self.db.cf_handle(bucket.name()).is_some()
    }

    /// Create any missing proof index column families.
    pub fn create_buckets(&self) -> Result<(), IndexError> {
        for bucket in Bucket::ALL {
            if !self.has_bucket(bucket) {
                self.db.create_cf(bucket.name(), &Options::default())?;
            }
        }
        Ok(())
    }

    /// Drop every proof index column family that exists.
    pub fn drop_buckets(&self) -> Result<(), IndexError> {
        for bucket in Bucket::ALL {
            if self.has_bucket(bucket) {
                self.db.drop_cf(bucket.name())?;
            }
        }
        Ok(())
    }

    /// Start a buffered transaction.
    pub fn begin(&self) -> DbTx<'_> {
        DbTx {
            db: self,
            pending: BTreeMap::new(),
            rollbacks: Vec::new(),
        }
    }

    /// Run `f` in a transaction and commit it if `f` succeeds.
    pub fn update<'a, T>(
        &'a self,
        f: impl FnOnce(&mut DbTx<'a>) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let mut tx = self.begin();
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` against a transaction that is never committed.
    pub fn view<T>(
        &self,
        f: impl FnOnce(&DbTx<'_>) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        f(&self.begin())
    }

    fn cf_handle(&self, bucket: Bucket) -> Result<Arc<BoundColumnFamily<'_>>, IndexError> {
        self.db
            .cf_handle(bucket.name())
            .ok_or(IndexError::MissingBucket(bucket.name()))
    }

    fn get_committed(&self, bucket: Bucket, key: &Hash256) -> Result<Option<Vec<u8>>, IndexError> {
        let cf = self.cf_handle(bucket)?;
        Ok(self.db.get_cf(&cf, key.as_bytes())?)
    }
}

/// Buffered read-write transaction over the proof index buckets.
///
/// Reads see this transaction's own pending writes. State kept outside the
/// database registers an [`on_rollback`](DbTx::on_rollback) hook to stay in
/// step with it.
pub struct DbTx<'a> {
    db: &'a IndexDb,
    pending: BTreeMap<(Bucket, Hash256), Option<Vec<u8>>>,
    rollbacks: Vec<Box<dyn FnOnce() + 'a>>,
}

impl DbTx<'_> {
    /// Value stored under `key`, if any.
    pub fn get(&self, bucket: Bucket, key: &Hash256) -> Result<Option<Vec<u8>>, IndexError> {
        match self.pending.get(&(bucket, *key)) {
            Some(value) => Ok(value.clone()),
            None => self.db.get_committed(bucket, key),
        }
    }

    /// Store `value` under `key`.
    pub fn put(&mut self, bucket: Bucket, key: Hash256, value: Vec<u8>) -> Result<(), IndexError> {
        self.db.cf_handle(bucket)?;
        self.pending.insert((bucket, key), Some(value));
        Ok(())
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn delete(&mut self, bucket: Bucket, key: Hash256) -> Result<(), IndexError> {
        self.db.cf_handle(bucket)?;
        self.pending.insert((bucket, key), None);
        Ok(())
    }

    /// Number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Run `f` if this transaction is dropped or fails to commit.
    pub fn on_rollback(&mut self, f: impl FnOnce() + 'a) {
        self.rollbacks.push(Box::new(f));
    }

    /// Write every buffered change atomically.
    ///
    /// Rollback hooks are discarded once the batch is written; on error they
    /// run as the transaction drops.
    pub fn commit(mut self) -> Result<(), IndexError> {
        let mut batch = WriteBatch::default();
        for ((bucket, key), value) in &self.pending {
            let cf = self.db.cf_handle(*bucket)?;
            match value {
                Some(bytes) => batch.put_cf(&cf, key.as_bytes(), bytes),
                None => batch.delete_cf(&cf, key.as_bytes()),
            }
        }
        self.db.db.write(batch)?;
        self.rollbacks.clear();
        Ok(())
    }
}

impl Drop for DbTx<'_> {
    fn drop(&mut self) {
        while let Some(rollback) = self.rollbacks.pop() {
            rollback();
        }
    }
}
