//! UTXO references and the records the storage engine keeps for them.

use crate::types::address::Address;
use plasma_derive::BinaryCodec;
use primitive_types::U256;
use std::fmt;

/// Identifies an output by the position of its transaction and its slot.
///
/// The encoded form (`be(blk_num) || be(tx_idx) || out_idx`) is also the
/// storage key of the output, so references sort by position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd, BinaryCodec)]
pub struct UtxoRef {
    pub blk_num: u64,
    pub tx_idx: u32,
    pub out_idx: u8,
}

impl UtxoRef {
    pub fn new(blk_num: u64, tx_idx: u32, out_idx: u8) -> Self {
        Self {
            blk_num,
            tx_idx,
            out_idx,
        }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.blk_num, self.tx_idx, self.out_idx)
    }
}

/// Persisted state of an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec)]
pub struct UtxoRecord {
    pub owner: Address,
    pub amount: U256,
    pub spent: bool,
}

/// An unspent output as returned by owner queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub reference: UtxoRef,
    pub owner: Address,
    pub amount: U256,
}
