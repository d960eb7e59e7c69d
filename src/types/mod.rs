//! Primitive types shared across the crate.
//!
//! - `Hash`: 32-byte Keccak-256 digests
//! - `Address`: 20-byte output owners
//! - `encoding`: the deterministic binary codec used for keys, records and
//!   signing payloads
//! - `MerkleTree`: block roots over transaction hashes

pub mod address;
pub mod encoding;
pub mod hash;
pub mod merkle_tree;
