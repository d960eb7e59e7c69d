//! Storage and indexing engine for a Plasma child-chain node.
//!
//! Provides the UTXO transaction model, a ledger over RocksDB that indexes
//! transactions by position and by owner, and a reconciler that mirrors
//! confirmed root-chain deposits into the ledger.

pub mod config;
pub mod core;
pub mod crypto;
pub mod reconcile;
pub mod storage;
pub mod types;
pub mod utils;
