//! Merkle roots over a block's transaction hashes.
//!
//! - An empty list of leaves yields the all-zero hash.
//! - Odd layers are padded by duplicating the last node before hashing the pair.
//! - Reduction is performed in place.

use crate::core::transaction::Transaction;
use crate::types::hash::Hash;

const EMPTY_ROOT: Hash = Hash::zero();
const MERKLE_NODE_SEPARATION: &[u8] = b"PLASMA_BLOCK_NODE";

pub struct MerkleTree;

impl MerkleTree {
    fn hash_pair(left: Hash, right: Hash) -> Hash {
        let mut h = Hash::keccak();
        h.update(MERKLE_NODE_SEPARATION);
        h.update(left.as_slice());
        h.update(right.as_slice());
        h.finalize()
    }

    /// Computes a Merkle root from the provided leaf hashes.
    pub fn from_raw(mut nodes: Vec<Hash>) -> Hash {
        if nodes.is_empty() {
            return EMPTY_ROOT;
        }

        let mut len = nodes.len();
        while len > 1 {
            let mut write = 0;
            let mut read = 0;

            while read < len {
                let left = nodes[read];
                let right = if read + 1 < len { nodes[read + 1] } else { left };
                nodes[write] = Self::hash_pair(left, right);
                write += 1;
                read += 2;
            }

            len = write;
        }

        nodes[0]
    }

    /// Computes the root of a block using each transaction's hash as a leaf.
    pub fn from_transactions(txs: &[Transaction]) -> Hash {
        Self::from_raw(txs.iter().map(Transaction::hash).collect())
    }
}
