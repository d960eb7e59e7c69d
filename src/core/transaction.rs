//! Fixed-shape UTXO transaction: two input slots, two output slots, a fee and
//! the position the transaction was committed at.

use crate::core::utxo::UtxoRef;
use crate::crypto::key_pair::{PrivateKey, SignatureError};
pub use crate::crypto::key_pair::TxSignature;
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use plasma_derive::BinaryCodec;
use primitive_types::U256;
use thiserror::Error;

/// Number of input (and output) slots in a transaction.
pub const SLOTS: usize = 2;

/// Reference to an output of an earlier transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, BinaryCodec)]
pub struct Input {
    pub blk_num: u64,
    pub tx_idx: u32,
    pub out_idx: u8,
}

impl Input {
    /// Empty input slot.
    pub const ZERO: Input = Input {
        blk_num: 0,
        tx_idx: 0,
        out_idx: 0,
    };

    pub fn new(blk_num: u64, tx_idx: u32, out_idx: u8) -> Self {
        Self {
            blk_num,
            tx_idx,
            out_idx,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Input::ZERO
    }

    pub fn utxo_ref(&self) -> UtxoRef {
        UtxoRef::new(self.blk_num, self.tx_idx, self.out_idx)
    }
}

impl From<UtxoRef> for Input {
    fn from(r: UtxoRef) -> Self {
        Input::new(r.blk_num, r.tx_idx, r.out_idx)
    }
}

/// Value assigned to a new owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, BinaryCodec)]
pub struct Output {
    pub new_owner: Address,
    pub amount: U256,
}

impl Output {
    /// Empty output slot.
    pub const ZERO: Output = Output {
        new_owner: Address::ZERO,
        amount: U256([0; 4]),
    };

    pub fn new(new_owner: Address, amount: impl Into<U256>) -> Self {
        Self {
            new_owner,
            amount: amount.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Output::ZERO
    }
}

/// Reasons a transaction is structurally invalid, or cannot be signed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// A used input points at block 0, which never exists.
    #[error("input{slot} references block 0")]
    ZeroBlockInput { slot: usize },
    /// Inputs must fill slot 0 first.
    #[error("input1 is used while input0 is empty")]
    Input1WithoutInput0,
    #[error("both inputs spend {0}")]
    DuplicateInput(UtxoRef),
    /// A used input has an empty signature slot.
    #[error("input{slot} is not signed")]
    MissingSignature { slot: usize },
    /// Outputs must fill slot 0 first.
    #[error("output1 is used while output0 is empty")]
    Output1WithoutOutput0,
    /// Deposit whose output carries a zero amount.
    #[error("deposit carries no value")]
    EmptyDeposit,
    /// Zero-input transaction submitted as part of a child block.
    #[error("deposit transactions cannot be included in a child block")]
    UnexpectedDeposit,
    /// Transaction with inputs submitted as a deposit.
    #[error("expected a deposit transaction")]
    NotADeposit,
    /// Slot index other than 0 or 1.
    #[error("no input slot {0}")]
    InvalidSlot(usize),
    /// Signing was requested for an unused input.
    #[error("input{slot} is empty")]
    EmptySlot { slot: usize },
    #[error("signature: {0}")]
    Signature(#[from] SignatureError),
}

/// A child-chain transaction.
///
/// Unused slots hold [`Input::ZERO`], [`Output::ZERO`] and
/// [`TxSignature::EMPTY`]. `blk_num` and `tx_idx` are zero until the storage
/// engine commits the transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, BinaryCodec)]
pub struct Transaction {
    pub input0: Input,
    pub input1: Input,
    #[binary_codec(signature)]
    pub sig0: TxSignature,
    #[binary_codec(signature)]
    pub sig1: TxSignature,
    pub output0: Output,
    pub output1: Output,
    pub fee: U256,
    pub blk_num: u64,
    pub tx_idx: u32,
}

impl Transaction {
    /// Creates an unsigned, unconfirmed transaction.
    pub fn new(input0: Input, input1: Input, output0: Output, output1: Output, fee: U256) -> Self {
        Self {
            input0,
            input1,
            output0,
            output1,
            fee,
            ..Default::default()
        }
    }

    /// Creates a zero-input deposit transaction carrying `output` in slot 0.
    pub fn deposit(output: Output) -> Self {
        Self {
            output0: output,
            ..Default::default()
        }
    }

    /// Canonical encoding of every field except the signatures.
    pub fn encode_payload(&self) -> Vec<u8> {
        self.to_unsigned_bytes()
    }

    /// Keccak-256 of [`Transaction::encode_payload`]; the transaction id.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::keccak();
        self.encode_unsigned(&mut h);
        h.finalize()
    }

    /// Digest covered by input signatures: the payload with the position cleared.
    pub fn signing_hash(&self) -> Hash {
        Transaction {
            blk_num: 0,
            tx_idx: 0,
            ..self.clone()
        }
        .hash()
    }

    pub fn is_deposit(&self) -> bool {
        self.input0.is_zero() && self.input1.is_zero()
    }

    pub fn inputs(&self) -> [Input; SLOTS] {
        [self.input0, self.input1]
    }

    pub fn signatures(&self) -> [TxSignature; SLOTS] {
        [self.sig0, self.sig1]
    }

    pub fn outputs(&self) -> [Output; SLOTS] {
        [self.output0, self.output1]
    }

    /// Non-empty inputs with their slot index.
    pub fn used_inputs(&self) -> impl Iterator<Item = (usize, Input)> + '_ {
        self.inputs()
            .into_iter()
            .enumerate()
            .filter(|(_, input)| !input.is_zero())
    }

    /// Sum of the outputs and the fee, or `None` on overflow.
    pub fn total_out(&self) -> Option<U256> {
        self.output0
            .amount
            .checked_add(self.output1.amount)?
            .checked_add(self.fee)
    }

    /// Checks the structural rules every stored transaction satisfies.
    pub fn well_formed(&self) -> Result<(), TransactionError> {
        for (slot, input) in self.used_inputs() {
            if input.blk_num == 0 {
                return Err(TransactionError::ZeroBlockInput { slot });
            }
        }

        if self.input0.is_zero() && !self.input1.is_zero() {
            return Err(TransactionError::Input1WithoutInput0);
        }

        if !self.input0.is_zero() && self.input0 == self.input1 {
            return Err(TransactionError::DuplicateInput(self.input0.utxo_ref()));
        }

        let signatures = self.signatures();
        for (slot, _) in self.used_inputs() {
            if signatures[slot].is_empty() {
                return Err(TransactionError::MissingSignature { slot });
            }
        }

        if self.output0.is_zero() && !self.output1.is_zero() {
            return Err(TransactionError::Output1WithoutOutput0);
        }

        Ok(())
    }

    /// Signs the input in `slot` with `key`.
    pub fn sign(&mut self, slot: usize, key: &PrivateKey) -> Result<(), TransactionError> {
        if self.inputs().get(slot).ok_or(TransactionError::InvalidSlot(slot))?.is_zero() {
            return Err(TransactionError::EmptySlot { slot });
        }

        let signature = key.sign_hash(&self.signing_hash())?;
        match slot {
            0 => self.sig0 = signature,
            _ => self.sig1 = signature,
        }
        Ok(())
    }

    /// Recovers the address that signed the input in `slot`.
    pub fn signer(&self, slot: usize) -> Result<Address, TransactionError> {
        let signature = *self
            .signatures()
            .get(slot)
            .ok_or(TransactionError::InvalidSlot(slot))?;
        if signature.is_empty() {
            return Err(TransactionError::MissingSignature { slot });
        }
        Ok(signature.recover(&self.signing_hash())?)
    }
}
