//! The child-chain ledger on top of a [`KvStore`].
//!
//! Every mutation is computed against the current state and applied as one
//! [`WriteSet`]. A single writer mutex is held from the first spent-check to
//! the batch write, so two writers can never both observe an output as
//! unspent. Readers go straight to the store.

use crate::core::block::{deposit_block, is_child_block};
use crate::core::transaction::{Transaction, TransactionError};
use crate::core::utxo::{Utxo, UtxoRecord, UtxoRef};
use crate::storage::keys::{
    block_prefix, deposit_key, meta_keys, owner_key, owner_prefix, parse_owner_key, tx_key,
    utxo_key,
};
use crate::storage::kv_store::{Column, KvStore, WriteSet};
use crate::storage::storage_trait::{DepositOutcome, Ledger, StorageError, UtxoIter};
use crate::types::address::Address;
use crate::types::encoding::{Decode, Encode};
use crate::types::hash::Hash;
use crate::{debug, info, warn};
use primitive_types::U256;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// [`Ledger`] over any [`KvStore`].
///
/// Writers are serialized by an internal mutex; reads never take it.
pub struct ChainLedger<K: KvStore> {
    store: K,
    writer: Mutex<()>,
}

fn decode<T: Decode>(column: Column, bytes: &[u8]) -> Result<T, StorageError> {
    T::from_bytes(bytes).map_err(|source| StorageError::Corrupt {
        column: column.name(),
        source,
    })
}

impl<K: KvStore> ChainLedger<K> {
    /// Wraps `store`. Existing data is used as is.
    pub fn new(store: K) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    /// The underlying key-value store.
    pub fn store(&self) -> &K {
        &self.store
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn meta_u64(&self, key: &[u8]) -> Result<Option<u64>, StorageError> {
        self.store
            .get(Column::Meta, key)?
            .map(|bytes| decode(Column::Meta, &bytes))
            .transpose()
    }

    fn block_exists(&self, blk_num: u64) -> Result<bool, StorageError> {
        Ok(self
            .store
            .scan_prefix(Column::Transactions, &block_prefix(blk_num))
            .next()
            .transpose()?
            .is_some())
    }

    /// Adds the writes that create an unspent output.
    fn create_output(batch: &mut WriteSet, reference: UtxoRef, owner: Address, amount: U256) {
        let record = UtxoRecord {
            owner,
            amount,
            spent: false,
        };
        batch.put(Column::Utxos, utxo_key(&reference), record.to_bytes());
        batch.put(
            Column::Owners,
            owner_key(&owner, &reference),
            amount.to_bytes(),
        );
    }
}

impl<K: KvStore> Ledger for ChainLedger<K> {
    fn put_block_transactions(
        &self,
        blk_num: u64,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, StorageError> {
        if txs.is_empty() {
            return Ok(Vec::new());
        }
        if !is_child_block(blk_num) {
            return Err(StorageError::InvalidBlockNumber(blk_num));
        }
        if u32::try_from(txs.len()).is_err() {
            return Err(StorageError::TooManyTransactions(txs.len()));
        }
        for tx in &txs {
            if tx.is_deposit() {
                return Err(TransactionError::UnexpectedDeposit.into());
            }
            tx.well_formed()?;
        }

        let _guard = self.lock_writer();

        if self.block_exists(blk_num)? {
            return Err(StorageError::BlockExists(blk_num));
        }

        let mut batch = WriteSet::new();
        let mut spent_in_block = HashSet::new();
        let mut committed = Vec::with_capacity(txs.len());

        for (tx_idx, mut tx) in (0u32..).zip(txs) {
            for (_, input) in tx.used_inputs() {
                let reference = input.utxo_ref();
                if !spent_in_block.insert(reference) {
                    return Err(StorageError::AlreadySpent(reference));
                }

                let record = self
                    .utxo_record(reference)?
                    .ok_or(StorageError::UnknownUtxo(reference))?;
                if record.spent {
                    return Err(StorageError::AlreadySpent(reference));
                }

                let spent = UtxoRecord {
                    spent: true,
                    ..record
                };
                batch.put(Column::Utxos, utxo_key(&reference), spent.to_bytes());
                batch.delete(Column::Owners, owner_key(&record.owner, &reference));
            }

            tx.blk_num = blk_num;
            tx.tx_idx = tx_idx;
            batch.put(Column::Transactions, tx_key(blk_num, tx_idx), tx.to_bytes());

            for (out_idx, output) in (0u8..).zip(tx.outputs()) {
                if output.is_zero() {
                    continue;
                }
                let reference = UtxoRef::new(blk_num, tx_idx, out_idx);
                Self::create_output(&mut batch, reference, output.new_owner, output.amount);
            }

            committed.push(tx);
        }

        debug!("Block {blk_num}: writing {} operations", batch.len());
        self.store.write(batch)?;
        info!(
            "Committed block {blk_num} with {} transactions",
            committed.len()
        );

        Ok(committed)
    }

    fn put_deposit(
        &self,
        root_tx_id: Hash,
        mut tx: Transaction,
    ) -> Result<DepositOutcome, StorageError> {
        if !tx.is_deposit() {
            return Err(TransactionError::NotADeposit.into());
        }
        tx.well_formed()?;
        if tx.output0.amount.is_zero() {
            return Err(TransactionError::EmptyDeposit.into());
        }

        let _guard = self.lock_writer();

        if let Some(existing) = self.deposit_utxo(root_tx_id)? {
            debug!("Deposit {root_tx_id} already indexed at {existing}");
            return Ok(DepositOutcome::AlreadyIndexed(existing));
        }

        let last = self.meta_u64(meta_keys::DEPOSIT_SEQ)?.unwrap_or(0);
        let (seq, blk_num) = last
            .checked_add(1)
            .and_then(|seq| Some((seq, deposit_block(seq)?)))
            .ok_or(StorageError::DepositRangeExhausted(last))?;
        let reference = UtxoRef::new(blk_num, 0, 0);

        tx.blk_num = blk_num;
        tx.tx_idx = 0;

        let mut batch = WriteSet::new();
        batch.put(Column::Transactions, tx_key(blk_num, 0), tx.to_bytes());
        Self::create_output(&mut batch, reference, tx.output0.new_owner, tx.output0.amount);
        batch.put(Column::Deposits, deposit_key(&root_tx_id), reference.to_bytes());
        batch.put(Column::Meta, meta_keys::DEPOSIT_SEQ.to_vec(), seq.to_bytes());
        self.store.write(batch)?;

        info!(
            "Indexed deposit {root_tx_id}: {} to {} at {reference}",
            tx.output0.amount, tx.output0.new_owner
        );
        Ok(DepositOutcome::Indexed(reference))
    }

    fn get_transaction(
        &self,
        blk_num: u64,
        tx_idx: u32,
    ) -> Result<Option<Transaction>, StorageError> {
        self.store
            .get(Column::Transactions, &tx_key(blk_num, tx_idx))?
            .map(|bytes| decode(Column::Transactions, &bytes))
            .transpose()
    }

    fn block_transactions(&self, blk_num: u64) -> Result<Vec<Transaction>, StorageError> {
        self.store
            .scan_prefix(Column::Transactions, &block_prefix(blk_num))
            .map(|entry| decode(Column::Transactions, &entry?.1))
            .collect()
    }

    fn utxos_for_owner(&self, owner: Address) -> UtxoIter<'_> {
        let iter = self
            .store
            .scan_prefix(Column::Owners, &owner_prefix(&owner))
            .map(|entry| -> Result<Utxo, StorageError> {
                let (key, value) = entry?;
                let (owner, reference) =
                    parse_owner_key(&key).map_err(|source| StorageError::Corrupt {
                        column: Column::Owners.name(),
                        source,
                    })?;
                Ok(Utxo {
                    reference,
                    owner,
                    amount: decode(Column::Owners, &value)?,
                })
            });
        Box::new(iter)
    }

    fn utxo_record(&self, reference: UtxoRef) -> Result<Option<UtxoRecord>, StorageError> {
        self.store
            .get(Column::Utxos, &utxo_key(&reference))?
            .map(|bytes| decode(Column::Utxos, &bytes))
            .transpose()
    }

    fn deposit_utxo(&self, root_tx_id: Hash) -> Result<Option<UtxoRef>, StorageError> {
        self.store
            .get(Column::Deposits, &deposit_key(&root_tx_id))?
            .map(|bytes| decode(Column::Deposits, &bytes))
            .transpose()
    }

    fn reconciled_height(&self) -> Result<u64, StorageError> {
        Ok(self.meta_u64(meta_keys::RECONCILED_HEIGHT)?.unwrap_or(0))
    }

    fn store_reconciled_height(&self, height: u64) -> Result<(), StorageError> {
        let _guard = self.lock_writer();

        let current = self.meta_u64(meta_keys::RECONCILED_HEIGHT)?.unwrap_or(0);
        if height < current {
            warn!("Refusing to lower reconciled height from {current} to {height}");
            return Ok(());
        }

        let mut batch = WriteSet::new();
        batch.put(
            Column::Meta,
            meta_keys::RECONCILED_HEIGHT.to_vec(),
            height.to_bytes(),
        );
        self.store.write(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::DEPOSIT_BLOCK_OFFSET;
    use crate::core::transaction::{Input, Output, TxSignature};
    use crate::crypto::key_pair::PrivateKey;
    use crate::storage::memory_storage::MemoryStore;
    use crate::storage::rocksdb_storage::RocksDbStore;
    use crate::storage::storage_trait::ErrorKind;
    use crate::utils::test_utils::utils::{address, key, root_tx};
    use std::sync::{Arc, Barrier};
    use std::thread;

    const WRITERS: usize = 8;

    const DEPOSIT: u64 = 1_000_000_000;

    fn memory_ledger() -> ChainLedger<MemoryStore> {
        ChainLedger::new(MemoryStore::new())
    }

    fn deposit_of(ledger: &impl Ledger, n: u8, owner: Address, amount: u64) -> UtxoRef {
        let tx = Transaction::deposit(Output::new(owner, amount));
        match ledger.put_deposit(root_tx(n), tx).unwrap() {
            DepositOutcome::Indexed(r) => r,
            other => panic!("expected a fresh deposit, got {other:?}"),
        }
    }

    fn spend(key: &PrivateKey, from: UtxoRef, outputs: [Output; 2]) -> Transaction {
        let mut tx = Transaction::new(
            Input::from(from),
            Input::ZERO,
            outputs[0],
            outputs[1],
            U256::zero(),
        );
        tx.sign(0, key).unwrap();
        tx
    }

    fn balances(ledger: &impl Ledger, owner: Address) -> Vec<(UtxoRef, U256)> {
        ledger
            .utxos_for_owner(owner)
            .map(|u| u.map(|u| (u.reference, u.amount)))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    /// Deposit 1,000,000,000 to A, then split it 400,000,000 to B and
    /// 600,000,000 back to A in child block 1.
    fn deposit_then_split(ledger: &impl Ledger) {
        let alice = key(0xAB);
        let a = alice.address();
        let b = address(0xDE);

        let d = deposit_of(ledger, 1, a, DEPOSIT);
        assert_eq!(d, UtxoRef::new(DEPOSIT_BLOCK_OFFSET + 1, 0, 0));
        assert!(ledger.is_spendable(d).unwrap());
        assert_eq!(balances(ledger, a), vec![(d, U256::from(DEPOSIT))]);

        let tx = spend(
            &alice,
            d,
            [Output::new(b, 400_000_000u64), Output::new(a, 600_000_000u64)],
        );
        ledger.validate_spend(&tx).unwrap();
        let committed = ledger.put_block_transactions(1, vec![tx]).unwrap();
        assert_eq!(committed[0].blk_num, 1);
        assert_eq!(committed[0].tx_idx, 0);

        assert!(!ledger.is_spendable(d).unwrap());
        assert!(ledger.utxo_record(d).unwrap().unwrap().spent);
        assert_eq!(
            balances(ledger, b),
            vec![(UtxoRef::new(1, 0, 0), U256::from(400_000_000u64))]
        );
        assert_eq!(
            balances(ledger, a),
            vec![(UtxoRef::new(1, 0, 1), U256::from(600_000_000u64))]
        );
        assert_eq!(
            ledger.get_transaction(1, 0).unwrap(),
            Some(committed[0].clone())
        );
    }

    #[test]
    fn deposit_and_split_in_memory() {
        deposit_then_split(&memory_ledger());
    }

    #[test]
    fn deposit_and_split_on_rocksdb() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let ledger = ChainLedger::new(RocksDbStore::open(dir.path()).unwrap());
        deposit_then_split(&ledger);
    }

    #[test]
    fn double_spend_across_blocks_is_rejected() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d = deposit_of(&ledger, 1, alice.address(), 10);

        let first = spend(&alice, d, [Output::new(address(2), 10u64), Output::ZERO]);
        ledger.put_block_transactions(1, vec![first]).unwrap();

        let second = spend(&alice, d, [Output::new(address(3), 10u64), Output::ZERO]);
        let err = ledger.put_block_transactions(2, vec![second]).unwrap_err();
        assert!(matches!(err, StorageError::AlreadySpent(r) if r == d));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(ledger.block_transactions(2).unwrap().is_empty());
    }

    #[test]
    fn double_spend_within_block_rejects_whole_batch() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d = deposit_of(&ledger, 1, alice.address(), 10);
        let other = deposit_of(&ledger, 2, alice.address(), 5);

        let ok = spend(&alice, other, [Output::new(address(4), 5u64), Output::ZERO]);
        let t1 = spend(&alice, d, [Output::new(address(2), 10u64), Output::ZERO]);
        let t2 = spend(&alice, d, [Output::new(address(3), 10u64), Output::ZERO]);

        let err = ledger.put_block_transactions(1, vec![ok, t1, t2]).unwrap_err();
        assert!(matches!(err, StorageError::AlreadySpent(r) if r == d));

        // Nothing from the block is visible, including the valid first spend.
        assert!(ledger.get_transaction(1, 0).unwrap().is_none());
        assert!(ledger.is_spendable(d).unwrap());
        assert!(ledger.is_spendable(other).unwrap());
        assert!(balances(&ledger, address(4)).is_empty());
        assert_eq!(balances(&ledger, alice.address()).len(), 2);
    }

    #[test]
    fn unknown_input_is_rejected() {
        let ledger = memory_ledger();
        let missing = UtxoRef::new(7, 0, 0);
        let tx = spend(&key(1), missing, [Output::new(address(2), 1u64), Output::ZERO]);
        let err = ledger.put_block_transactions(8, vec![tx]).unwrap_err();
        assert!(matches!(err, StorageError::UnknownUtxo(r) if r == missing));
    }

    #[test]
    fn spending_output_of_same_block_is_unknown() {
        let ledger = memory_ledger();
        let alice = key(1);
        let bob = key(2);
        let d = deposit_of(&ledger, 1, alice.address(), 10);

        let t0 = spend(&alice, d, [Output::new(bob.address(), 10u64), Output::ZERO]);
        let t1 = spend(
            &bob,
            UtxoRef::new(1, 0, 0),
            [Output::new(address(3), 10u64), Output::ZERO],
        );
        let err = ledger.put_block_transactions(1, vec![t0, t1]).unwrap_err();
        assert!(matches!(err, StorageError::UnknownUtxo(_)));
        assert!(ledger.is_spendable(d).unwrap());
    }

    #[test]
    fn malformed_transaction_is_rejected_before_writing() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d = deposit_of(&ledger, 1, alice.address(), 10);

        let mut tx = spend(&alice, d, [Output::new(address(2), 10u64), Output::ZERO]);
        tx.sig0 = TxSignature::EMPTY;
        let err = ledger.put_block_transactions(1, vec![tx]).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Malformed(TransactionError::MissingSignature { slot: 0 })
        ));
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(ledger.is_spendable(d).unwrap());
    }

    #[test]
    fn deposit_in_child_block_is_rejected() {
        let ledger = memory_ledger();
        let tx = Transaction::deposit(Output::new(address(1), 5u64));
        assert!(matches!(
            ledger.put_block_transactions(1, vec![tx]),
            Err(StorageError::Malformed(TransactionError::UnexpectedDeposit))
        ));
    }

    #[test]
    fn block_numbers_outside_child_range_are_rejected() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d = deposit_of(&ledger, 1, alice.address(), 10);
        let tx = spend(&alice, d, [Output::new(address(2), 10u64), Output::ZERO]);

        for blk in [0, DEPOSIT_BLOCK_OFFSET, DEPOSIT_BLOCK_OFFSET + 5] {
            let err = ledger
                .put_block_transactions(blk, vec![tx.clone()])
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidBlockNumber(n) if n == blk));
            assert_eq!(err.kind(), ErrorKind::Structural);
        }
    }

    #[test]
    fn existing_block_is_not_overwritten() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d1 = deposit_of(&ledger, 1, alice.address(), 10);
        let d2 = deposit_of(&ledger, 2, alice.address(), 10);

        let t1 = spend(&alice, d1, [Output::new(address(2), 10u64), Output::ZERO]);
        ledger.put_block_transactions(3, vec![t1]).unwrap();

        let t2 = spend(&alice, d2, [Output::new(address(2), 10u64), Output::ZERO]);
        assert!(matches!(
            ledger.put_block_transactions(3, vec![t2]),
            Err(StorageError::BlockExists(3))
        ));
        assert!(ledger.is_spendable(d2).unwrap());
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let ledger = memory_ledger();
        assert!(ledger.put_block_transactions(0, Vec::new()).unwrap().is_empty());
        assert!(ledger.block_transactions(0).unwrap().is_empty());
    }

    #[test]
    fn empty_outputs_create_no_utxo() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d = deposit_of(&ledger, 1, alice.address(), 10);
        let tx = spend(&alice, d, [Output::new(address(2), 10u64), Output::ZERO]);
        ledger.put_block_transactions(1, vec![tx]).unwrap();

        assert!(ledger.utxo_record(UtxoRef::new(1, 0, 0)).unwrap().is_some());
        assert!(ledger.utxo_record(UtxoRef::new(1, 0, 1)).unwrap().is_none());
    }

    #[test]
    fn deposit_is_idempotent() {
        let ledger = memory_ledger();
        let tx = Transaction::deposit(Output::new(address(1), 50u64));

        let first = ledger.put_deposit(root_tx(9), tx.clone()).unwrap();
        let second = ledger.put_deposit(root_tx(9), tx.clone()).unwrap();
        assert!(matches!(first, DepositOutcome::Indexed(_)));
        assert_eq!(second, DepositOutcome::AlreadyIndexed(first.utxo()));
        assert_eq!(balances(&ledger, address(1)).len(), 1);

        // A different root transaction gets the next deposit block.
        let third = ledger.put_deposit(root_tx(10), tx).unwrap();
        assert_eq!(third.utxo().blk_num, first.utxo().blk_num + 1);
        assert_eq!(ledger.deposit_utxo(root_tx(10)).unwrap(), Some(third.utxo()));
    }

    #[test]
    fn identical_deposits_get_distinct_ids() {
        let ledger = memory_ledger();
        let tx = Transaction::deposit(Output::new(address(1), 50u64));
        let a = ledger.put_deposit(root_tx(1), tx.clone()).unwrap().utxo();
        let b = ledger.put_deposit(root_tx(2), tx).unwrap().utxo();

        let ta = ledger.get_transaction(a.blk_num, 0).unwrap().unwrap();
        let tb = ledger.get_transaction(b.blk_num, 0).unwrap().unwrap();
        assert_ne!(ta.hash(), tb.hash());
    }

    #[test]
    fn invalid_deposits_are_rejected() {
        let ledger = memory_ledger();
        let empty = Transaction::deposit(Output::new(address(1), 0u64));
        assert!(matches!(
            ledger.put_deposit(root_tx(1), empty),
            Err(StorageError::Malformed(TransactionError::EmptyDeposit))
        ));

        let mut spend_shaped = Transaction::deposit(Output::new(address(1), 1u64));
        spend_shaped.input0 = Input::new(1, 0, 0);
        assert!(matches!(
            ledger.put_deposit(root_tx(2), spend_shaped),
            Err(StorageError::Malformed(TransactionError::NotADeposit))
        ));
        assert_eq!(ledger.deposit_utxo(root_tx(1)).unwrap(), None);
    }

    #[test]
    fn backend_failure_leaves_no_trace() {
        let ledger = memory_ledger();
        ledger.store().set_fail_writes(true);
        let tx = Transaction::deposit(Output::new(address(1), 1u64));
        let err = ledger.put_deposit(root_tx(1), tx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        ledger.store().set_fail_writes(false);
        assert_eq!(ledger.deposit_utxo(root_tx(1)).unwrap(), None);
        assert!(balances(&ledger, address(1)).is_empty());
    }

    #[test]
    fn owner_view_is_ordered_by_reference() {
        let ledger = memory_ledger();
        let owner = address(5);
        let refs: Vec<UtxoRef> = (1..=3).map(|n| deposit_of(&ledger, n, owner, n as u64)).collect();
        deposit_of(&ledger, 4, address(6), 99);

        let seen: Vec<UtxoRef> = balances(&ledger, owner).into_iter().map(|(r, _)| r).collect();
        assert_eq!(seen, refs);
    }

    #[test]
    fn get_utxo_hides_spent_outputs() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d = deposit_of(&ledger, 1, alice.address(), 10);
        assert_eq!(ledger.get_utxo(d).unwrap().map(|u| u.owner), Some(alice.address()));

        let tx = spend(&alice, d, [Output::new(address(2), 10u64), Output::ZERO]);
        ledger.put_block_transactions(1, vec![tx]).unwrap();
        assert_eq!(ledger.get_utxo(d).unwrap(), None);
    }

    #[test]
    fn block_view_and_merkle_root() {
        let ledger = memory_ledger();
        let alice = key(1);
        let d1 = deposit_of(&ledger, 1, alice.address(), 10);
        let d2 = deposit_of(&ledger, 2, alice.address(), 20);
        let txs = vec![
            spend(&alice, d1, [Output::new(address(2), 10u64), Output::ZERO]),
            spend(&alice, d2, [Output::new(address(3), 20u64), Output::ZERO]),
        ];
        let committed = ledger.put_block_transactions(4, txs).unwrap();

        let block = ledger.block_transactions(4).unwrap();
        assert_eq!(block, committed);
        assert_eq!(block[1].tx_idx, 1);
        assert_eq!(
            ledger.block_merkle_root(4).unwrap(),
            crate::types::merkle_tree::MerkleTree::from_transactions(&committed)
        );
        assert_eq!(ledger.block_merkle_root(5).unwrap(), Hash::zero());
    }

    #[test]
    fn validate_spend_checks_owner_and_value() {
        let ledger = memory_ledger();
        let alice = key(1);
        let mallory = key(2);
        let d = deposit_of(&ledger, 1, alice.address(), 10);

        let stolen = spend(&mallory, d, [Output::new(address(9), 10u64), Output::ZERO]);
        assert!(matches!(
            ledger.validate_spend(&stolen),
            Err(StorageError::Unauthorized { slot: 0, utxo }) if utxo == d
        ));

        let inflated = spend(&alice, d, [Output::new(address(9), 11u64), Output::ZERO]);
        assert!(matches!(
            ledger.validate_spend(&inflated),
            Err(StorageError::ValueMismatch { .. })
        ));

        let mut with_fee = Transaction::new(
            Input::from(d),
            Input::ZERO,
            Output::new(address(9), 8u64),
            Output::ZERO,
            U256::from(2u64),
        );
        with_fee.sign(0, &alice).unwrap();
        ledger.validate_spend(&with_fee).unwrap();
    }

    #[test]
    fn reconciled_height_is_persisted_and_monotonic() {
        let ledger = memory_ledger();
        assert_eq!(ledger.reconciled_height().unwrap(), 0);
        ledger.store_reconciled_height(12).unwrap();
        ledger.store_reconciled_height(7).unwrap();
        assert_eq!(ledger.reconciled_height().unwrap(), 12);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let alice = key(0xAB);
        let d = {
            let ledger = ChainLedger::new(RocksDbStore::open(dir.path()).unwrap());
            let d = deposit_of(&ledger, 1, alice.address(), DEPOSIT);
            ledger.store_reconciled_height(3).unwrap();
            d
        };

        let ledger = ChainLedger::new(RocksDbStore::open(dir.path()).unwrap());
        assert!(ledger.is_spendable(d).unwrap());
        assert_eq!(ledger.reconciled_height().unwrap(), 3);
        let replay = Transaction::deposit(Output::new(alice.address(), DEPOSIT));
        assert!(matches!(
            ledger.put_deposit(root_tx(1), replay),
            Ok(DepositOutcome::AlreadyIndexed(r)) if r == d
        ));
        // The deposit sequence continues where it stopped.
        assert_eq!(deposit_of(&ledger, 2, alice.address(), 1).blk_num, d.blk_num + 1);
    }

    #[test]
    fn read_only_ledger_serves_queries() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let owner = address(0xAB);
        {
            let ledger = ChainLedger::new(RocksDbStore::open(dir.path()).unwrap());
            deposit_of(&ledger, 1, owner, DEPOSIT);
        }

        let ledger = ChainLedger::new(RocksDbStore::open_read_only(dir.path()).unwrap());
        assert_eq!(balances(&ledger, owner).len(), 1);
        let err = ledger
            .put_deposit(root_tx(2), Transaction::deposit(Output::new(owner, 1u64)))
            .unwrap_err();
        assert!(matches!(err, StorageError::ReadOnly));
    }

    #[test]
    fn deposit_range_exhaustion_is_reported() {
        let ledger = memory_ledger();
        let last = DEPOSIT_BLOCK_OFFSET - 1;
        let mut batch = WriteSet::new();
        batch.put(Column::Meta, meta_keys::DEPOSIT_SEQ.to_vec(), last.to_bytes());
        ledger.store().write(batch).unwrap();

        let tx = Transaction::deposit(Output::new(address(1), 1u64));
        let err = ledger.put_deposit(root_tx(1), tx).unwrap_err();
        assert!(matches!(err, StorageError::DepositRangeExhausted(n) if n == last));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(ledger.deposit_utxo(root_tx(1)).unwrap(), None);
    }

    /// Races `WRITERS` blocks that all spend the same deposit.
    fn race_spends<K: KvStore + 'static>(ledger: Arc<ChainLedger<K>>) {
        let alice = key(1);
        let d = deposit_of(&*ledger, 1, alice.address(), 10);
        let start = Arc::new(Barrier::new(WRITERS));

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let start = Arc::clone(&start);
                let to = address(0x40 + i as u8);
                let tx = spend(&alice, d, [Output::new(to, 10u64), Output::ZERO]);
                thread::spawn(move || {
                    start.wait();
                    ledger.put_block_transactions(i as u64 + 1, vec![tx])
                })
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("writer panicked"))
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in &results {
            if let Err(err) = result {
                assert!(matches!(err, StorageError::AlreadySpent(r) if *r == d));
            }
        }
        assert!(!ledger.is_spendable(d).unwrap());

        let created: usize = (0..WRITERS)
            .map(|i| balances(&*ledger, address(0x40 + i as u8)).len())
            .sum();
        assert_eq!(created, 1);
    }

    #[test]
    fn concurrent_blocks_spend_an_output_once_in_memory() {
        race_spends(Arc::new(memory_ledger()));
    }

    #[test]
    fn concurrent_blocks_spend_an_output_once_on_rocksdb() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        race_spends(Arc::new(ChainLedger::new(
            RocksDbStore::open(dir.path()).unwrap(),
        )));
    }

    #[test]
    fn concurrent_replays_index_a_deposit_once() {
        let ledger = Arc::new(memory_ledger());
        let owner = address(7);
        let start = Arc::new(Barrier::new(WRITERS));

        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    let tx = Transaction::deposit(Output::new(owner, 25u64));
                    ledger.put_deposit(root_tx(3), tx)
                })
            })
            .collect();
        let outcomes: Vec<DepositOutcome> = handles
            .into_iter()
            .map(|h| h.join().expect("writer panicked").unwrap())
            .collect();

        let indexed: Vec<UtxoRef> = outcomes
            .iter()
            .filter_map(|o| match o {
                DepositOutcome::Indexed(r) => Some(*r),
                DepositOutcome::AlreadyIndexed(_) => None,
            })
            .collect();
        assert_eq!(indexed.len(), 1);
        assert!(outcomes.iter().all(|o| o.utxo() == indexed[0]));
        assert_eq!(balances(&*ledger, owner), vec![(indexed[0], U256::from(25u64))]);
        assert_eq!(ledger.deposit_utxo(root_tx(3)).unwrap(), Some(indexed[0]));
    }
}
