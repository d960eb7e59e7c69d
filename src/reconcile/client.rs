//! Interface to the root chain.

use crate::core::deposit::DepositEvent;
use crate::types::address::Address;

/// Failures talking to the root chain. All of them are transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("root chain unreachable: {0}")]
    Unreachable(String),

    #[error("root chain request timed out")]
    Timeout,

    #[error("invalid root chain response: {0}")]
    InvalidResponse(String),
}

/// Read access to the root-chain contract.
///
/// Implementations wrap an RPC client. Both calls may be retried freely.
#[async_trait::async_trait]
pub trait RootChainClient: Send + Sync {
    /// Highest child block the contract has accepted from `operator`.
    async fn current_child_block(&self, operator: Address) -> Result<u64, ClientError>;

    /// Deposits included at root-chain height `from_height` or later.
    async fn deposits_since(&self, from_height: u64) -> Result<Vec<DepositEvent>, ClientError>;
}
