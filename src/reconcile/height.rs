//! The persisted child-block height.
//!
//! The height only moves forward. Every forward move is written to the ledger
//! before it becomes visible through [`ChildHeight::current`].

use crate::storage::storage_trait::{Ledger, StorageError};
use crate::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightUpdate {
    Advanced { from: u64, to: u64 },
    Unchanged,
    /// The reported height was below the current one and was ignored.
    Regressed { current: u64, reported: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildHeight {
    current: u64,
}

impl ChildHeight {
    /// Loads the persisted height, 0 when none was stored.
    pub fn load<L: Ledger + ?Sized>(ledger: &L) -> Result<Self, StorageError> {
        Ok(Self {
            current: ledger.reconciled_height()?,
        })
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Moves to `reported` if it is higher, persisting it first.
    pub fn advance<L: Ledger + ?Sized>(
        &mut self,
        ledger: &L,
        reported: u64,
    ) -> Result<HeightUpdate, StorageError> {
        if reported < self.current {
            warn!(
                "Root chain reported child block {reported} below reconciled height {}, ignoring",
                self.current
            );
            return Ok(HeightUpdate::Regressed {
                current: self.current,
                reported,
            });
        }
        if reported == self.current {
            return Ok(HeightUpdate::Unchanged);
        }

        ledger.store_reconciled_height(reported)?;
        let from = self.current;
        self.current = reported;
        Ok(HeightUpdate::Advanced { from, to: reported })
    }
}
