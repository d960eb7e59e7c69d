//! Root-chain deposit events.

use crate::core::transaction::{Output, Transaction};
use crate::types::address::Address;
use crate::types::hash::Hash;
use primitive_types::U256;

/// A deposit as reported by the root-chain client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositEvent {
    /// Identifier of the root-chain transaction that made the deposit.
    pub root_tx_id: Hash,
    pub owner: Address,
    pub amount: U256,
    /// Root-chain height the deposit was included at.
    pub root_block_height: u64,
}

impl DepositEvent {
    /// Zero-input transaction mirroring this deposit on the child chain.
    pub fn to_transaction(&self) -> Transaction {
        Transaction::deposit(Output::new(self.owner, self.amount))
    }
}
