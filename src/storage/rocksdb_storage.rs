//! RocksDB-backed key-value store.
//!
//! Each [`Column`] maps to a column family of the same name. The database
//! lives in `<location>/db`. Writer opens hold an exclusive lock on
//! `<location>/.lock` for the lifetime of the store. Read-only opens take no
//! lock and reject writes with [`StorageError::ReadOnly`].

use crate::info;
use crate::storage::kv_store::{Column, KvIter, KvStore, WriteOp, WriteSet};
use crate::storage::storage_trait::StorageError;
use fs2::FileExt;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, DBCompressionType, Direction, IteratorMode, Options,
    WriteBatch,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Name of the database directory inside the data directory.
pub const DB_DIR: &str = "db";
/// Name of the writer lock file inside the data directory.
pub const LOCK_FILE: &str = ".lock";

/// [`KvStore`] over a RocksDB database with one column family per [`Column`].
pub struct RocksDbStore {
    db: DB,
    path: PathBuf,
    read_only: bool,
    /// Held open to keep the exclusive lock; released on drop.
    _lock: Option<File>,
}

fn backend(e: rocksdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn cf_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(DBCompressionType::Lz4);
    opts
}

fn cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    Column::ALL
        .iter()
        .map(|c| ColumnFamilyDescriptor::new(c.name(), cf_options()))
        .collect()
}

impl RocksDbStore {
    /// Opens (creating if needed) the writable database under `location`.
    ///
    /// Fails with [`StorageError::Locked`] if another process holds the data
    /// directory.
    pub fn open(location: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(location).map_err(|e| StorageError::Backend(e.to_string()))?;

        let lock_path = location.join(LOCK_FILE);
        let lock = File::create(&lock_path).map_err(|e| StorageError::Backend(e.to_string()))?;
        lock.try_lock_exclusive()
            .map_err(|_| StorageError::Locked(lock_path.display().to_string()))?;

        let path = location.join(DB_DIR);
        info!("Creating database in {}", path.display());

        let mut opts = cf_options();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors()).map_err(backend)?;

        Ok(Self {
            db,
            path,
            read_only: false,
            _lock: Some(lock),
        })
    }

    /// Opens an existing database under `location` for reading only.
    pub fn open_read_only(location: &Path) -> Result<Self, StorageError> {
        let path = location.join(DB_DIR);
        info!("Opening database in {} (read-only)", path.display());

        let opts = Options::default();
        let names = Column::ALL.map(Column::name);
        let db = DB::open_cf_for_read_only(&opts, &path, names, false).map_err(backend)?;

        Ok(Self {
            db,
            path,
            read_only: true,
            _lock: None,
        })
    }

    /// Directory of the database itself (`<location>/db`).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn cf(&self, column: Column) -> Result<&ColumnFamily, StorageError> {
        self.db.cf_handle(column.name()).ok_or_else(|| {
            StorageError::Backend(format!("missing column family {}", column.name()))
        })
    }
}

impl KvStore for RocksDbStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(column)?;
        self.db.get_cf(cf, key).map_err(backend)
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> KvIter<'_> {
        let cf = match self.cf(column) {
            Ok(cf) => cf,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        let owned_prefix = prefix.to_vec();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(&owned_prefix),
                Err(_) => true,
            })
            .map(|item| {
                item.map(|(key, value)| (key.into_vec(), value.into_vec()))
                    .map_err(backend)
            });
        Box::new(iter)
    }

    fn write(&self, batch: WriteSet) -> Result<(), StorageError> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }

        let mut wb = WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { column, key, value } => wb.put_cf(self.cf(column)?, key, value),
                WriteOp::Delete { column, key } => wb.delete_cf(self.cf(column)?, key),
            }
        }
        self.db.write(wb).map_err(backend)
    }
}
