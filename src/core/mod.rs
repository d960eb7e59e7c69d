//! Child-chain data model.
//!
//! - `Transaction`: two-input, two-output UTXO transaction with recoverable
//!   signatures
//! - `UtxoRef` / `UtxoRecord`: output references and their persisted state
//! - `DepositEvent`: root-chain deposits
//! - `block`: child and deposit block numbering

pub mod block;
pub mod deposit;
pub mod transaction;
pub mod utxo;
