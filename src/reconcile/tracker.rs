//! Per-deposit confirmation state.
//!
//! ```text
//! Observed ─(reported >= height + depth)─▶ Confirmed ─(put_deposit)─▶ Indexed
//!                                                   └─(structural)──▶ Rejected
//! ```
//!
//! `Indexed` and `Rejected` are terminal. Transport failures never move an
//! event.

use crate::core::deposit::DepositEvent;
use crate::types::hash::Hash;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositState {
    Observed,
    Confirmed,
    Indexed,
    /// The ledger refused the deposit as malformed; it will never be indexed.
    Rejected,
}

impl DepositState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DepositState::Indexed | DepositState::Rejected)
    }
}

#[derive(Debug, Clone)]
pub struct TrackedDeposit {
    pub event: DepositEvent,
    pub state: DepositState,
}

#[derive(Debug, Default)]
pub struct DepositTracker {
    deposits: BTreeMap<Hash, TrackedDeposit>,
}

impl DepositTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `event`. Returns `false` if it was already known.
    pub fn observe(&mut self, event: DepositEvent) -> bool {
        if self.deposits.contains_key(&event.root_tx_id) {
            return false;
        }
        self.deposits.insert(
            event.root_tx_id,
            TrackedDeposit {
                event,
                state: DepositState::Observed,
            },
        );
        true
    }

    /// Confirms observed events buried `depth` blocks below `reported` and
    /// returns every confirmed, not yet indexed event ordered by
    /// `(root_block_height, root_tx_id)`.
    pub fn confirm(&mut self, reported: u64, depth: u64) -> Vec<DepositEvent> {
        let mut ready = Vec::new();
        for tracked in self.deposits.values_mut() {
            if tracked.state == DepositState::Observed
                && reported >= tracked.event.root_block_height.saturating_add(depth)
            {
                tracked.state = DepositState::Confirmed;
            }
            if tracked.state == DepositState::Confirmed {
                ready.push(tracked.event);
            }
        }
        ready.sort_by_key(|e| (e.root_block_height, e.root_tx_id));
        ready
    }

    fn finish(&mut self, root_tx_id: &Hash, state: DepositState) -> bool {
        match self.deposits.get_mut(root_tx_id) {
            Some(tracked) if tracked.state == DepositState::Confirmed => {
                tracked.state = state;
                true
            }
            _ => false,
        }
    }

    /// Moves a confirmed event to `Indexed`. Returns `false` for unknown or
    /// unconfirmed events.
    pub fn mark_indexed(&mut self, root_tx_id: &Hash) -> bool {
        self.finish(root_tx_id, DepositState::Indexed)
    }

    pub fn mark_rejected(&mut self, root_tx_id: &Hash) -> bool {
        self.finish(root_tx_id, DepositState::Rejected)
    }

    pub fn state(&self, root_tx_id: &Hash) -> Option<DepositState> {
        self.deposits.get(root_tx_id).map(|t| t.state)
    }

    /// Number of events not yet in a terminal state.
    pub fn pending(&self) -> usize {
        self.deposits
            .values()
            .filter(|t| !t.state.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }

    /// Forgets terminal events included below `height`; they are no longer
    /// re-reported by the client.
    pub fn prune_below(&mut self, height: u64) {
        self.deposits
            .retain(|_, t| !(t.state.is_terminal() && t.event.root_block_height < height));
    }
}
