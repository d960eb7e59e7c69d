//! The deposit reconciler.
//!
//! Each poll reads the child-block height reported by the root chain, fetches
//! deposits from `height - confirmation_depth` onwards, indexes every confirmed
//! deposit and, once all of them are indexed, persists the new height. A
//! restarted reconciler resumes from the persisted height and replays whatever
//! was not indexed; `put_deposit` is idempotent so replays are harmless.

use crate::reconcile::backoff::Backoff;
use crate::reconcile::client::{ClientError, RootChainClient};
use crate::reconcile::height::{ChildHeight, HeightUpdate};
use crate::reconcile::tracker::DepositTracker;
use crate::storage::storage_trait::{DepositOutcome, ErrorKind, Ledger, StorageError};
use crate::types::address::Address;
use crate::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Root chain unavailable; the poll can be retried.
    #[error("root chain client: {0}")]
    Client(#[from] ClientError),
    /// Ledger failure; reconciliation cannot continue.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    /// A blocking ledger task panicked or was cancelled.
    #[error("ledger task failed: {0}")]
    Task(String),
}

impl ReconcileError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ReconcileError::Client(_))
    }
}

/// Tuning of the reconciler loop.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Operator whose child blocks the root chain is queried for.
    pub operator: Address,
    pub poll_interval: Duration,
    /// Root-chain blocks a deposit must be buried under before it is indexed.
    pub confirmation_depth: u64,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            operator: Address::ZERO,
            poll_interval: Duration::from_secs(1),
            confirmation_depth: 1,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub reported_height: u64,
    pub observed: usize,
    pub indexed: usize,
    pub already_indexed: usize,
    pub rejected: usize,
    pub height: HeightUpdate,
}

/// Mirrors confirmed root-chain deposits into a [`Ledger`].
///
/// Holds the deposit tracker and the persisted child-block height. Drive it
/// with [`Reconciler::poll_once`] or hand it to [`Reconciler::run`].
pub struct Reconciler<C, L> {
    client: Arc<C>,
    ledger: Arc<L>,
    options: ReconcileOptions,
    height: ChildHeight,
    tracker: DepositTracker,
}

impl<C, L> Reconciler<C, L>
where
    C: RootChainClient + 'static,
    L: Ledger + 'static,
{
    /// Creates a reconciler resuming from the height persisted in `ledger`.
    pub async fn new(
        client: Arc<C>,
        ledger: Arc<L>,
        options: ReconcileOptions,
    ) -> Result<Self, ReconcileError> {
        let height = blocking(&ledger, |l| ChildHeight::load(l)).await?;
        info!(
            "Reconciler starting at child block {} (confirmation depth {})",
            height.current(),
            options.confirmation_depth
        );
        Ok(Self {
            client,
            ledger,
            options,
            height,
            tracker: DepositTracker::new(),
        })
    }

    pub fn height(&self) -> u64 {
        self.height.current()
    }

    pub fn tracker(&self) -> &DepositTracker {
        &self.tracker
    }

    /// Runs one reconciliation round.
    ///
    /// Client errors leave every event where it was. A storage error aborts the
    /// round before the height moves.
    pub async fn poll_once(&mut self) -> Result<PollReport, ReconcileError> {
        let depth = self.options.confirmation_depth;
        let reported = self
            .client
            .current_child_block(self.options.operator)
            .await?;

        let from = self.height.current().saturating_sub(depth);
        let events = self.client.deposits_since(from).await?;
        let observed = events
            .into_iter()
            .filter(|e| self.tracker.observe(*e))
            .count();

        let mut report = PollReport {
            reported_height: reported,
            observed,
            indexed: 0,
            already_indexed: 0,
            rejected: 0,
            height: HeightUpdate::Unchanged,
        };

        for event in self.tracker.confirm(reported, depth) {
            let root_tx_id = event.root_tx_id;
            let tx = event.to_transaction();

            match blocking(&self.ledger, move |l| l.put_deposit(root_tx_id, tx)).await {
                Ok(DepositOutcome::Indexed(_)) => report.indexed += 1,
                Ok(DepositOutcome::AlreadyIndexed(_)) => report.already_indexed += 1,
                Err(ReconcileError::Storage(e)) if e.kind() == ErrorKind::Structural => {
                    error!("Rejecting deposit {root_tx_id}: {e}");
                    self.tracker.mark_rejected(&root_tx_id);
                    report.rejected += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
            self.tracker.mark_indexed(&root_tx_id);
        }

        let mut height = self.height;
        let (height, update) = blocking(&self.ledger, move |l| {
            let update = height.advance(l, reported)?;
            Ok((height, update))
        })
        .await?;
        self.height = height;
        report.height = update;

        self.tracker
            .prune_below(self.height.current().saturating_sub(depth));

        Ok(report)
    }

    /// Polls until `shutdown` fires or a non-transient error occurs.
    ///
    /// Client errors are retried with exponential backoff, without limit.
    /// Shutdown is only observed between polls.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<(), ReconcileError> {
        let mut backoff = Backoff::new(self.options.backoff_initial, self.options.backoff_max);

        loop {
            let delay = match self.poll_once().await {
                Ok(report) => {
                    backoff.reset();
                    if report.indexed > 0 {
                        info!(
                            "Indexed {} deposits, child block height {}",
                            report.indexed,
                            self.height.current()
                        );
                    } else {
                        debug!("Poll: {report:?}");
                    }
                    self.options.poll_interval
                }
                Err(e) if e.is_transient() => {
                    let delay = backoff.next_delay();
                    warn!("Reconcile poll failed: {e}, retrying in {delay:?}");
                    delay
                }
                Err(e) => {
                    error!("Reconciler stopped: {e}");
                    return Err(e);
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Reconciler shut down at child block {}", self.height.current());
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Spawns [`Reconciler::run`] on the current runtime.
    pub fn spawn(self, shutdown: oneshot::Receiver<()>) -> JoinHandle<Result<(), ReconcileError>> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Runs a ledger call on the blocking pool.
async fn blocking<L, T, F>(ledger: &Arc<L>, f: F) -> Result<T, ReconcileError>
where
    L: Ledger + 'static,
    T: Send + 'static,
    F: FnOnce(&L) -> Result<T, StorageError> + Send + 'static,
{
    let ledger = Arc::clone(ledger);
    tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(|e| ReconcileError::Task(e.to_string()))?
        .map_err(ReconcileError::from)
}
