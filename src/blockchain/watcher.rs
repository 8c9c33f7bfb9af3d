//! Confirmation monitoring.
//!
//! # State Transitions
//! ```text
//! Pending → Confirmed   receipt found, status success
//! Pending → Reverted    receipt found, status failure
//! Pending → TimedOut    attempt budget spent without a receipt
//! Pending → Cancelled   caller cancelled
//! ```
//!
//! The first poll happens immediately, then one per interval. A watcher runs
//! as its own task; the caller may await it, cancel it, or drop the handle
//! and let it finish unobserved.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::blockchain::transport::ChainTransport;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationState};
use crate::config::schema::ConfirmationConfig;
use crate::lifecycle::CancelToken;
use crate::observability::metrics;

/// Shortest poll interval a watcher will use.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polling parameters for one watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl From<&ConfirmationConfig> for WatcherConfig {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_attempts: config.attempt_budget(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from(&ConfirmationConfig::default())
    }
}

/// Polls for one transaction's receipt until a terminal state.
pub struct ConfirmationWatcher {
    transport: Arc<dyn ChainTransport>,
    tx_hash: TxHash,
    config: WatcherConfig,
    state: watch::Sender<ConfirmationState>,
}

impl ConfirmationWatcher {
    pub fn new(transport: Arc<dyn ChainTransport>, tx_hash: TxHash, config: WatcherConfig) -> Self {
        let (state, _) = watch::channel(ConfirmationState::Pending);
        Self {
            transport,
            tx_hash,
            config,
            state,
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Observe the state this watcher publishes.
    pub fn subscribe(&self) -> watch::Receiver<ConfirmationState> {
        self.state.subscribe()
    }

    /// Poll until a terminal state is reached or `cancel` fires.
    pub async fn run(self, cancel: CancelToken) -> ConfirmationState {
        let outcome = self.poll_loop(&cancel).await;

        tracing::info!(
            tx_hash = %self.tx_hash,
            state = outcome.label(),
            "Confirmation watcher finished"
        );
        metrics::record_confirmation(outcome.label());
        self.state.send_replace(outcome.clone());
        outcome
    }

    /// Run on a separate task and return a handle to it.
    pub fn spawn(self) -> WatchHandle {
        let cancel = CancelToken::new();
        let state = self.subscribe();
        let tx_hash = self.tx_hash;
        let task = tokio::spawn(self.run(cancel.clone()));

        WatchHandle {
            tx_hash,
            cancel,
            state,
            task,
        }
    }

    async fn poll_loop(&self, cancel: &CancelToken) -> ConfirmationState {
        let mut ticker = interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let budget = self.config.max_attempts.max(1);

        for attempt in 1..=budget {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return ConfirmationState::Cancelled { attempts: attempt - 1 },
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ConfirmationState::Cancelled { attempts: attempt - 1 },
                result = self.transport.receipt(self.tx_hash) => result,
            };

            match result {
                Ok(Some(receipt)) => return ConfirmationState::from(&receipt),
                Ok(None) => {
                    tracing::debug!(tx_hash = %self.tx_hash, attempt, budget, "Transaction pending");
                }
                Err(e) => {
                    // The transaction's fate is unknown; keep polling.
                    tracing::warn!(tx_hash = %self.tx_hash, attempt, error = %e, "Receipt lookup failed");
                }
            }
        }

        ConfirmationState::TimedOut { attempts: budget }
    }
}

/// Handle to a spawned watcher.
///
/// Dropping the handle abandons the watcher: it keeps polling in the
/// background but nobody observes the result.
#[derive(Debug)]
pub struct WatchHandle {
    tx_hash: TxHash,
    cancel: CancelToken,
    state: watch::Receiver<ConfirmationState>,
    task: JoinHandle<ConfirmationState>,
}

impl WatchHandle {
    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Latest published state; `Pending` until the watcher finishes.
    pub fn status(&self) -> ConfirmationState {
        self.state.borrow().clone()
    }

    /// Token that cancels this watcher, for handing to other tasks.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop polling. `wait` then returns `Cancelled` unless a terminal state won the race.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the watcher's terminal state.
    ///
    /// Fails with [`BlockchainError::WatcherFailed`] if the task panicked or
    /// was aborted; that says nothing about the transaction itself.
    pub async fn wait(self) -> BlockchainResult<ConfirmationState> {
        match self.task.await {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::error!(tx_hash = %self.tx_hash, error = %e, "Confirmation watcher task failed");
                let last = self.state.borrow().clone();
                if last.is_terminal() {
                    return Ok(last);
                }
                Err(BlockchainError::WatcherFailed {
                    tx_hash: self.tx_hash,
                    reason: e.to_string(),
                })
            }
        }
    }
}
