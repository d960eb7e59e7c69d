//! The ledger interface and its error type.

use crate::core::transaction::{Transaction, TransactionError};
use crate::core::utxo::{Utxo, UtxoRecord, UtxoRef};
use crate::types::address::Address;
use crate::types::encoding::DecodeError;
use crate::types::hash::Hash;
use crate::types::merkle_tree::MerkleTree;
use primitive_types::U256;
use thiserror::Error;

/// Errors that can occur while reading or writing the ledger.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Transaction failed structural validation.
    #[error("malformed transaction: {0}")]
    Malformed(#[from] TransactionError),
    /// Input references an output that was already consumed.
    #[error("utxo {0} is already spent")]
    AlreadySpent(UtxoRef),
    /// Input references an output that does not exist.
    #[error("utxo {0} does not exist")]
    UnknownUtxo(UtxoRef),
    /// Block number already holds transactions.
    #[error("block {0} already exists")]
    BlockExists(u64),
    /// Block number is 0 or lies in the deposit range.
    #[error("invalid block number {0}")]
    InvalidBlockNumber(u64),
    /// Every deposit block number has been assigned.
    #[error("deposit block range exhausted after {0} deposits")]
    DepositRangeExhausted(u64),
    #[error("block of {0} transactions exceeds the index range")]
    TooManyTransactions(usize),
    /// Signature does not recover to the owner of the spent output.
    #[error("input{slot} is not signed by the owner of {utxo}")]
    Unauthorized { slot: usize, utxo: UtxoRef },
    /// Inputs do not equal outputs plus fee.
    #[error("inputs total {inputs} but outputs plus fee total {outputs}")]
    ValueMismatch { inputs: U256, outputs: U256 },
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("corrupt record in {column}: {source}")]
    Corrupt {
        column: &'static str,
        source: DecodeError,
    },
    #[error("storage is opened read-only")]
    ReadOnly,
    #[error("data directory is locked by another process: {0}")]
    Locked(String),
}

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input can never be accepted.
    Structural,
    /// The input conflicts with the current ledger state.
    Conflict,
    /// The store failed or cannot take further writes. Fatal to the
    /// operation and returned to the caller.
    Io,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Malformed(_)
            | StorageError::InvalidBlockNumber(_)
            | StorageError::TooManyTransactions(_)
            | StorageError::Unauthorized { .. }
            | StorageError::ValueMismatch { .. } => ErrorKind::Structural,
            StorageError::AlreadySpent(_)
            | StorageError::UnknownUtxo(_)
            | StorageError::BlockExists(_) => ErrorKind::Conflict,
            StorageError::Backend(_)
            | StorageError::DepositRangeExhausted(_)
            | StorageError::Corrupt { .. }
            | StorageError::ReadOnly
            | StorageError::Locked(_) => ErrorKind::Io,
        }
    }
}

/// Result of [`Ledger::put_deposit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositOutcome {
    /// The deposit was written and its output is now spendable.
    Indexed(UtxoRef),
    /// The root transaction was indexed before; nothing was written.
    AlreadyIndexed(UtxoRef),
}

impl DepositOutcome {
    pub fn utxo(&self) -> UtxoRef {
        match self {
            DepositOutcome::Indexed(r) | DepositOutcome::AlreadyIndexed(r) => *r,
        }
    }
}

/// Lazily decoded owner view.
pub type UtxoIter<'a> = Box<dyn Iterator<Item = Result<Utxo, StorageError>> + 'a>;

/// Persistent child-chain ledger.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes are atomic:
/// a failed call leaves no trace.
pub trait Ledger: Send + Sync {
    /// Commits `txs` as block `blk_num`, assigning `tx_idx` by position.
    ///
    /// Returns the transactions with their positions set. An empty list is a
    /// no-op.
    fn put_block_transactions(
        &self,
        blk_num: u64,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, StorageError>;

    /// Indexes a deposit transaction under the next deposit block, once per
    /// `root_tx_id`.
    fn put_deposit(&self, root_tx_id: Hash, tx: Transaction)
    -> Result<DepositOutcome, StorageError>;

    fn get_transaction(&self, blk_num: u64, tx_idx: u32)
    -> Result<Option<Transaction>, StorageError>;

    /// Transactions of a block ordered by `tx_idx`.
    fn block_transactions(&self, blk_num: u64) -> Result<Vec<Transaction>, StorageError>;

    /// Unspent outputs of `owner`, ordered by reference.
    fn utxos_for_owner(&self, owner: Address) -> UtxoIter<'_>;

    /// Record of an output, spent or not.
    fn utxo_record(&self, reference: UtxoRef) -> Result<Option<UtxoRecord>, StorageError>;

    /// Reference assigned to a previously indexed deposit.
    fn deposit_utxo(&self, root_tx_id: Hash) -> Result<Option<UtxoRef>, StorageError>;

    fn reconciled_height(&self) -> Result<u64, StorageError>;

    fn store_reconciled_height(&self, height: u64) -> Result<(), StorageError>;

    fn is_spendable(&self, reference: UtxoRef) -> Result<bool, StorageError> {
        Ok(self.utxo_record(reference)?.is_some_and(|r| !r.spent))
    }

    /// Unspent output at `reference`.
    fn get_utxo(&self, reference: UtxoRef) -> Result<Option<Utxo>, StorageError> {
        Ok(self
            .utxo_record(reference)?
            .filter(|r| !r.spent)
            .map(|r| Utxo {
                reference,
                owner: r.owner,
                amount: r.amount,
            }))
    }

    fn block_merkle_root(&self, blk_num: u64) -> Result<Hash, StorageError> {
        Ok(MerkleTree::from_transactions(
            &self.block_transactions(blk_num)?,
        ))
    }

    /// Checks a candidate spend against the current state without writing.
    ///
    /// The transaction must be well formed, spend only unspent outputs, carry
    /// a signature from each spent output's owner, and balance exactly.
    fn validate_spend(&self, tx: &Transaction) -> Result<(), StorageError> {
        tx.well_formed()?;
        if tx.is_deposit() {
            return Err(TransactionError::UnexpectedDeposit.into());
        }

        let mut inputs = U256::zero();
        for (slot, input) in tx.used_inputs() {
            let reference = input.utxo_ref();
            let record = self
                .utxo_record(reference)?
                .ok_or(StorageError::UnknownUtxo(reference))?;
            if record.spent {
                return Err(StorageError::AlreadySpent(reference));
            }
            if tx.signer(slot)? != record.owner {
                return Err(StorageError::Unauthorized {
                    slot,
                    utxo: reference,
                });
            }
            inputs = inputs.saturating_add(record.amount);
        }

        let outputs = tx.total_out().unwrap_or(U256::MAX);
        if inputs != outputs {
            return Err(StorageError::ValueMismatch { inputs, outputs });
        }
        Ok(())
    }
}
