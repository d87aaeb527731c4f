//! Shutdown coordination and background task tracking.
//!
//! Every long-running loop and every detached transaction task is spawned
//! through [`Shutdown`], so a shutdown can cancel and await all of them.

use alloy::primitives::TxHash;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// A failure reported by a background task to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// A tracked task returned an error.
    Task { name: &'static str, error: String },
    /// A transaction failed on-chain or never produced a receipt.
    Settlement { tx_hash: TxHash, error: String },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Task { name, error } => write!(f, "task {} failed: {}", name, error),
            Fault::Settlement { tx_hash, error } => write!(f, "settlement of {} failed: {}", tx_hash, error),
        }
    }
}

/// Returned when tasks are still running at the shutdown deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainTimeout {
    pub remaining: usize,
}

impl fmt::Display for DrainTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tasks still running at shutdown deadline", self.remaining)
    }
}

impl std::error::Error for DrainTimeout {}

/// Coordinator for graceful shutdown.
///
/// Cloning is cheap; all clones share one tracker, token and fault channel.
#[derive(Clone)]
pub struct Shutdown {
    tracker: TaskTracker,
    token: CancellationToken,
    faults: mpsc::UnboundedSender<Fault>,
    draining: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new coordinator and the receiving end of its fault channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fault>) {
        let (faults, fault_rx) = mpsc::unbounded_channel();
        let shutdown = Self {
            tracker: TaskTracker::new(),
            token: CancellationToken::new(),
            faults,
            draining: Arc::new(AtomicBool::new(false)),
        };
        (shutdown, fault_rx)
    }

    /// Spawn a tracked task. It is dropped at its next await once shutdown
    /// is triggered; an error result is reported as [`Fault::Task`].
    pub fn spawn<F, E>(&self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let token = self.token.clone();
        let faults = self.faults.clone();
        let draining = self.draining.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    tracing::debug!(task = name, "Task cancelled");
                }

                result = future => match result {
                    Ok(()) => tracing::debug!(task = name, "Task completed"),
                    Err(e) if draining.load(Ordering::SeqCst) => {
                        tracing::info!(task = name, error = %e, "Task stopped during shutdown");
                    }
                    Err(e) => {
                        let _ = faults.send(Fault::Task { name, error: e.to_string() });
                    }
                },
            }
        });
    }

    /// Report a fault from outside a tracked task's return value.
    pub fn report(&self, fault: Fault) {
        let _ = self.faults.send(fault);
    }

    /// Signal every tracked task to stop.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of tracked tasks still alive.
    pub fn task_count(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel everything and wait for tracked tasks, up to `deadline`.
    ///
    /// Task errors after this point are logged, not reported.
    pub async fn drain(&self, deadline: Duration) -> Result<(), DrainTimeout> {
        self.draining.store(true, Ordering::SeqCst);
        self.tracker.close();
        self.token.cancel();

        tracing::info!(tasks = self.tracker.len(), "Cancelling tasks");
        match tokio::time::timeout(deadline, self.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(DrainTimeout {
                remaining: self.tracker.len(),
            }),
        }
    }
}
