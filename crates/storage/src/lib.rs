//! Embedded key-value stores backing loupe's persistent index
//!
//! Each shard owns two stores: `info` (doc id → full document record, the
//! recovery source of truth) and `index` (doc id ‖ token presence markers,
//! a denormalization used for removal scans and suggestions). Both are
//! single-table redb databases over opaque byte keys and values.
//!
//! The [`KvStore`] surface is deliberately small (`get`/`set`/`delete`/
//! `for_each`) so the engine never depends on redb directly and the store
//! can be swapped without touching the pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;

use loupe_core::EngineError;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use thiserror::Error;

const KV: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

/// Result alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures from the underlying embedded store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file could not be opened or created.
    #[error("failed to open store: {0}")]
    Open(#[from] redb::DatabaseError),

    /// A transaction could not begin.
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// A table could not be opened.
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    /// A read or write hit a storage-level failure.
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// A commit failed.
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::storage(err)
    }
}

/// A single-table embedded byte store.
///
/// Safe for concurrent use: redb serializes writers and lets readers run
/// against a consistent snapshot, which is exactly what the persistence
/// worker (writes) and suggestion scans (reads) need.
pub struct KvStore {
    db: Database,
    path: PathBuf,
}

impl KvStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let db = Database::create(path)?;

        // Ensure the table exists so later readers never race its creation.
        let txn = db.begin_write()?;
        txn.open_table(KV)?;
        txn.commit()?;

        Ok(KvStore {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(KV)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Fetch the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(KV)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// Delete `key`, returning whether it was present.
    pub fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(KV)?;
            let existed = table.remove(key)?.is_some();
            existed
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Delete every key in `keys` in one transaction.
    pub fn delete_batch(&self, keys: &[Vec<u8>]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(KV)?;
            for key in keys {
                table.remove(key.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Visit every entry in key order. The visitor returns `false` to stop
    /// early.
    pub fn for_each(
        &self,
        mut visit: impl FnMut(&[u8], &[u8]) -> bool,
    ) -> StorageResult<()> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(KV)?;
        for entry in table.iter()? {
            let (key, value) = entry?;
            if !visit(key.value(), value.value()) {
                break;
            }
        }
        Ok(())
    }

    /// Path this store was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore").field("path", &self.path).finish()
    }
}
