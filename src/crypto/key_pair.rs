//! Recoverable ECDSA signatures on secp256k1 with Ethereum address derivation.

use crate::types::address::{ADDRESS_LEN, Address};
use crate::types::hash::Hash;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use plasma_derive::BinaryCodec;
use rand_core::OsRng;
use std::fmt;
use thiserror::Error;

/// Length of a serialized recoverable signature: `r || s || v`.
pub const SIGNATURE_LEN: usize = 65;

/// Offset added to the recovery id when stored in the `v` byte.
const RECOVERY_ID_OFFSET: u8 = 27;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("malformed signature bytes")]
    Malformed,
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("public key recovery failed")]
    RecoveryFailed,
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// A 65-byte recoverable signature as stored inside a transaction.
///
/// [`TxSignature::EMPTY`] (all zero bytes) marks an unused slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BinaryCodec)]
pub struct TxSignature(pub [u8; SIGNATURE_LEN]);

impl TxSignature {
    pub const EMPTY: TxSignature = TxSignature([0u8; SIGNATURE_LEN]);

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; SIGNATURE_LEN]
    }

    /// Recovers the address that produced this signature over `prehash`.
    pub fn recover(&self, prehash: &Hash) -> Result<Address, SignatureError> {
        let signature =
            Signature::from_slice(&self.0[..64]).map_err(|_| SignatureError::Malformed)?;
        let v = self.0[64];
        let recovery_id = RecoveryId::from_byte(v.checked_sub(RECOVERY_ID_OFFSET).unwrap_or(v))
            .ok_or(SignatureError::InvalidRecoveryId(v))?;
        let key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &signature, recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;
        Ok(address_of(&key))
    }
}

impl Default for TxSignature {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature(0x{})", hex::encode(self.0))
    }
}

/// Private key used to sign transaction inputs.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

/// Public key together with its derived address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    pub key: VerifyingKey,
    pub address: Address,
}

impl PrivateKey {
    /// Generates a new random private key using OS-provided entropy.
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Creates a private key from raw bytes.
    ///
    /// Returns `None` if the bytes are not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_slice(bytes).ok().map(|key| Self { key })
    }

    pub fn public_key(&self) -> PublicKey {
        let key = *self.key.verifying_key();
        PublicKey {
            key,
            address: address_of(&key),
        }
    }

    pub fn address(&self) -> Address {
        self.public_key().address
    }

    /// Signs a 32-byte digest, producing a recoverable signature.
    pub fn sign_hash(&self, prehash: &Hash) -> Result<TxSignature, SignatureError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(prehash.as_slice())
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + RECOVERY_ID_OFFSET;
        Ok(TxSignature(out))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Address derivation: keccak256(uncompressed_pubkey[1..])[12..32]
fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = Hash::digest(&point.as_bytes()[1..]);

    let mut addr = [0u8; ADDRESS_LEN];
    addr.copy_from_slice(&digest.0[12..]);
    Address(addr)
}
