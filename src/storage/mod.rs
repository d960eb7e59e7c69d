//! Child-chain storage engine.
//!
//! - [`storage_trait`]: the [`Ledger`](storage_trait::Ledger) trait and
//!   [`StorageError`](storage_trait::StorageError)
//! - [`ledger`]: [`ChainLedger`](ledger::ChainLedger), the ledger over any
//!   [`KvStore`](kv_store::KvStore)
//! - [`kv_store`]: the ordered key-value abstraction and atomic write sets
//! - [`keys`]: key layout of every column
//! - [`rocksdb_storage`]: RocksDB backend
//! - [`memory_storage`]: in-memory backend

pub mod keys;
pub mod kv_store;
pub mod ledger;
pub mod memory_storage;
pub mod rocksdb_storage;
pub mod storage_trait;
