//! Key layout.
//!
//! All integers are big-endian, so a prefix scan returns entries in position
//! order: `block_prefix(n)` yields block `n` ordered by `tx_idx`, and
//! `owner_prefix(a)` yields `a`'s outputs ordered by reference.

use crate::core::utxo::UtxoRef;
use crate::types::address::Address;
use crate::types::encoding::{Decode, DecodeError, Encode};
use crate::types::hash::Hash;

/// Well-known keys of the meta column.
pub mod meta_keys {
    /// Highest root-chain-confirmed child block reconciled so far.
    pub const RECONCILED_HEIGHT: &[u8] = b"reconciled_height";
    /// Sequence number of the last indexed deposit.
    pub const DEPOSIT_SEQ: &[u8] = b"deposit_seq";
}

/// Prefix shared by every transaction key of block `blk_num`.
pub fn block_prefix(blk_num: u64) -> Vec<u8> {
    blk_num.to_bytes()
}

/// Transactions column: `be(blk_num) || be(tx_idx)`.
pub fn tx_key(blk_num: u64, tx_idx: u32) -> Vec<u8> {
    (blk_num, tx_idx).to_bytes()
}

/// Utxos column: the 13-byte encoded reference.
pub fn utxo_key(reference: &UtxoRef) -> Vec<u8> {
    reference.to_bytes()
}

/// Prefix shared by every owner-index key of `owner`.
pub fn owner_prefix(owner: &Address) -> Vec<u8> {
    owner.to_bytes()
}

/// Owners column: `owner || reference`.
pub fn owner_key(owner: &Address, reference: &UtxoRef) -> Vec<u8> {
    let mut key = owner.to_bytes();
    reference.encode(&mut key);
    key
}

/// Splits an owner-index key back into its parts.
pub fn parse_owner_key(key: &[u8]) -> Result<(Address, UtxoRef), DecodeError> {
    <(Address, UtxoRef)>::from_bytes(key)
}

/// Deposits column: the root-chain transaction id.
pub fn deposit_key(root_tx_id: &Hash) -> Vec<u8> {
    root_tx_id.to_bytes()
}
