//! 20-byte Ethereum-style addresses.

use plasma_derive::BinaryCodec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Owner of an output, derived from a secp256k1 public key as the last 20
/// bytes of its Keccak-256 hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd, BinaryCodec)]
pub struct Address(pub [u8; ADDRESS_LEN]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl Address {
    /// The zero address, owner of empty output slots.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Parses an address from hex text, with or without a `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Address, AddressError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        let bytes = hex::decode(digits).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let array: [u8; ADDRESS_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Address(array))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
