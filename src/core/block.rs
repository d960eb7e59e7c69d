//! Block numbering.
//!
//! Child blocks produced by the operator are numbered `1 .. 2^63`. Deposits
//! are each given their own block numbered `2^63 + seq`, where `seq` starts at
//! 1, so the two ranges never collide. Block 0 is never a real block.

/// First number of the deposit range. Not itself a valid block.
pub const DEPOSIT_BLOCK_OFFSET: u64 = 1 << 63;

/// Whether `blk_num` is in the child block range.
pub fn is_child_block(blk_num: u64) -> bool {
    blk_num != 0 && blk_num < DEPOSIT_BLOCK_OFFSET
}

/// Whether `blk_num` is in the deposit block range.
pub fn is_deposit_block(blk_num: u64) -> bool {
    blk_num > DEPOSIT_BLOCK_OFFSET
}

/// Block number of the deposit with sequence number `seq`.
pub fn deposit_block(seq: u64) -> Option<u64> {
    if seq == 0 {
        return None;
    }
    DEPOSIT_BLOCK_OFFSET.checked_add(seq)
}
