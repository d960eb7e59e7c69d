//! Ordered key-value store abstraction the ledger is built on.

use crate::storage::storage_trait::StorageError;

/// Column families of the persisted layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// `(blk_num, tx_idx)` → transaction
    Transactions,
    /// `(blk_num, tx_idx, out_idx)` → `UtxoRecord`
    Utxos,
    /// `(owner, blk_num, tx_idx, out_idx)` → amount, unspent outputs only
    Owners,
    /// `root_tx_id` → `UtxoRef` of the indexed deposit
    Deposits,
    /// Well-known scalar keys
    Meta,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Transactions,
        Column::Utxos,
        Column::Owners,
        Column::Deposits,
        Column::Meta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Transactions => "transactions",
            Column::Utxos => "utxos",
            Column::Owners => "owners",
            Column::Deposits => "deposits",
            Column::Meta => "meta",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        column: Column,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        column: Column,
        key: Vec<u8>,
    },
}

/// Operations applied together by [`KvStore::write`]: all of them or none.
#[derive(Clone, Debug, Default)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { column, key, value });
    }

    pub fn delete(&mut self, column: Column, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { column, key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Iterator over `(key, value)` pairs in ascending key order.
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StorageError>> + 'a>;

/// Backend for the ledger.
///
/// Implementations must be thread-safe. Scans observe a consistent view
/// taken when the scan starts and need not see later writes.
pub trait KvStore: Send + Sync {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Entries of `column` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, column: Column, prefix: &[u8]) -> KvIter<'_>;

    /// Applies every operation of `batch` atomically.
    fn write(&self, batch: WriteSet) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_are_distinct() {
        let mut names: Vec<_> = Column::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Column::ALL.len());
    }

    #[test]
    fn write_set_keeps_operation_order() {
        let mut batch = WriteSet::new();
        assert!(batch.is_empty());
        batch.put(Column::Meta, b"a".to_vec(), b"1".to_vec());
        batch.delete(Column::Meta, b"a".to_vec());
        assert_eq!(batch.len(), 2);

        let ops = batch.into_ops();
        assert!(matches!(ops[0], WriteOp::Put { .. }));
        assert!(matches!(ops[1], WriteOp::Delete { .. }));
    }
}
