//! In-memory key-value store.
//!
//! Backs tests and tools that do not need persistence. Scans copy the matching
//! range under a short read lock, so an iterator never observes later writes.

use crate::storage::kv_store::{Column, KvIter, KvStore, WriteOp, WriteSet};
use crate::storage::storage_trait::StorageError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Default)]
pub struct MemoryStore {
    columns: RwLock<HashMap<Column, Table>>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Column, Table>> {
        self.columns.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<Column, Table>> {
        self.columns.write().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Backend("injected write failure".into()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_writable(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Makes every subsequent write fail with a backend error.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl KvStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .read()
            .get(&column)
            .and_then(|table| table.get(key))
            .cloned())
    }

    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> KvIter<'_> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = match self.read().get(&column) {
            Some(table) => table
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        };
        Box::new(entries.into_iter().map(Ok))
    }

    fn write(&self, batch: WriteSet) -> Result<(), StorageError> {
        self.check_writable()?;

        let mut columns = self.write_guard();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { column, key, value } => {
                    columns.entry(column).or_default().insert(key, value);
                }
                WriteOp::Delete { column, key } => {
                    if let Some(table) = columns.get_mut(&column) {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(store: &MemoryStore, column: Column, key: &[u8], value: &[u8]) {
        let mut batch = WriteSet::new();
        batch.put(column, key.to_vec(), value.to_vec());
        store.write(batch).unwrap();
    }

    #[test]
    fn get_missing_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get(Column::Meta, b"nope").unwrap(), None);
    }

    #[test]
    fn columns_are_isolated() {
        let store = MemoryStore::new();
        put(&store, Column::Meta, b"k", b"meta");
        put(&store, Column::Utxos, b"k", b"utxo");
        assert_eq!(store.get(Column::Meta, b"k").unwrap(), Some(b"meta".to_vec()));
        assert_eq!(store.get(Column::Utxos, b"k").unwrap(), Some(b"utxo".to_vec()));
        assert_eq!(store.get(Column::Owners, b"k").unwrap(), None);
    }

    #[test]
    fn scan_prefix_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        put(&store, Column::Transactions, &[1, 2], b"b");
        put(&store, Column::Transactions, &[1, 1], b"a");
        put(&store, Column::Transactions, &[2, 0], b"c");
        put(&store, Column::Transactions, &[0, 9], b"z");

        let keys: Vec<Vec<u8>> = store
            .scan_prefix(Column::Transactions, &[1])
            .map(|e| e.unwrap().0)
            .collect();
        assert_eq!(keys, vec![vec![1, 1], vec![1, 2]]);
    }

    #[test]
    fn scan_does_not_observe_later_writes() {
        let store = MemoryStore::new();
        put(&store, Column::Owners, &[7, 1], b"x");
        let iter = store.scan_prefix(Column::Owners, &[7]);
        put(&store, Column::Owners, &[7, 2], b"y");
        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn batch_applies_puts_and_deletes() {
        let store = MemoryStore::new();
        put(&store, Column::Meta, b"old", b"1");

        let mut batch = WriteSet::new();
        batch.delete(Column::Meta, b"old".to_vec());
        batch.put(Column::Meta, b"new".to_vec(), b"2".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.get(Column::Meta, b"old").unwrap(), None);
        assert_eq!(store.get(Column::Meta, b"new").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn failed_write_changes_nothing() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let mut batch = WriteSet::new();
        batch.put(Column::Meta, b"k".to_vec(), b"v".to_vec());
        assert!(matches!(store.write(batch), Err(StorageError::Backend(_))));
        assert_eq!(store.get(Column::Meta, b"k").unwrap(), None);
    }
}
