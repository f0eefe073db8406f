//! Producer plumbing shared by all readers
//!
//! Every reader owns a `ReadLifecycle`. `start` spawns the reader-specific
//! produce loop with an `EntrySender`; the channel closes when the loop
//! returns, which happens on natural end, task cancellation or shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_channel::{bounded, Receiver, Sender};
use contracts::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::counters::ReaderMetrics;

/// Start-once and shutdown state of a reader
pub(crate) struct ReadLifecycle {
    name: &'static str,
    capacity: usize,
    started: AtomicBool,
    shutdown: CancellationToken,
    /// Kept to observe the channel backlog; never read from
    backlog: OnceLock<Receiver<Entry>>,
    metrics: Arc<ReaderMetrics>,
}

impl ReadLifecycle {
    pub(crate) fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            backlog: OnceLock::new(),
            metrics: Arc::new(ReaderMetrics::new()),
        }
    }

    pub(crate) fn metrics(&self) -> &Arc<ReaderMetrics> {
        &self.metrics
    }

    /// Spawn the produce loop
    ///
    /// A second call returns an already-closed receiver.
    pub(crate) fn start<F, Fut>(&self, cancel: CancellationToken, produce: F) -> Receiver<Entry>
    where
        F: FnOnce(EntrySender) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(reader = self.name, "start_read called more than once");
            return closed_receiver();
        }

        let (tx, rx) = bounded(self.capacity);
        let _ = self.backlog.set(rx.clone());

        let sender = EntrySender {
            tx,
            cancel,
            shutdown: self.shutdown.clone(),
            metrics: self.metrics.clone(),
        };
        let name = self.name;
        let fut = produce(sender);
        tokio::spawn(async move {
            debug!(reader = name, "reader started");
            fut.await;
            debug!(reader = name, "reader stopped");
        });

        rx
    }

    /// Stop the produce loop, idempotent
    pub(crate) fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!(reader = self.name, "reader shutdown");
            self.shutdown.cancel();
        }
    }

    /// Entries produced but not yet consumed
    pub(crate) fn backlog(&self) -> usize {
        self.backlog.get().map_or(0, Receiver::len)
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }
}

/// Sending half handed to a produce loop
pub(crate) struct EntrySender {
    tx: Sender<Entry>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    metrics: Arc<ReaderMetrics>,
}

impl EntrySender {
    /// Push one entry, waiting for channel space
    ///
    /// Returns `false` when the read should stop.
    pub(crate) async fn send(&self, entry: Entry) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = self.shutdown.cancelled() => false,
            res = self.tx.send(entry) => {
                if res.is_ok() {
                    self.metrics.record_read();
                }
                res.is_ok()
            }
        }
    }

    /// Resolves once the read should stop
    pub(crate) async fn stopped(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.shutdown.is_cancelled()
    }

    pub(crate) fn metrics(&self) -> &ReaderMetrics {
        &self.metrics
    }
}

fn closed_receiver() -> Receiver<Entry> {
    let (_, rx) = bounded(1);
    rx
}
