//! Root-chain deposit reconciliation.
//!
//! - [`client`]: the [`RootChainClient`](client::RootChainClient) seam
//! - [`tracker`]: per-deposit `Observed → Confirmed → Indexed` state
//! - [`height`]: the persisted child-block height
//! - [`backoff`]: retry delays for client failures
//! - [`service`]: the [`Reconciler`](service::Reconciler) poll loop

pub mod backoff;
pub mod client;
pub mod height;
pub mod service;
pub mod tracker;
