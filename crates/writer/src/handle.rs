//! WriterHandle - owns a sink behind a bounded queue and worker task

use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{Entry, EntrySink, Statusable};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

use crate::counters::WriterMetrics;

/// Default queue capacity between the pipeline and the sink worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Upper bound on draining and closing the sink
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to a running sink worker
///
/// This is the writer as seen by the task manager: `write` waits for queue
/// space, sink errors are logged and counted by the worker, `close` drains
/// and closes the sink exactly once.
pub struct WriterHandle {
    /// Sink name
    name: String,
    /// Channel to send entries to worker, `None` once closed
    tx: Mutex<Option<mpsc::Sender<Entry>>>,
    /// Shared counters
    metrics: Arc<WriterMetrics>,
    /// Worker task handle, taken by the first `close`
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    /// Sink-side status that outlives the move into the worker
    probe: Option<Arc<dyn Statusable>>,
    close_timeout: Duration,
}

impl WriterHandle {
    /// Create a new WriterHandle and spawn the worker task
    pub fn spawn<S: EntrySink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let probe = sink.status_probe();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(WriterMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx: Mutex::new(Some(tx)),
            metrics,
            worker_handle: Mutex::new(Some(worker_handle)),
            probe,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Bound `close`; past it the worker is aborted and queued entries dropped
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current counters
    pub fn metrics(&self) -> &Arc<WriterMetrics> {
        &self.metrics
    }

    /// Queue an entry, waiting while the queue is full
    ///
    /// Never fails: after `close` the entry is dropped and counted.
    pub async fn write(&self, entry: Entry) {
        let tx = self.tx.lock().ok().and_then(|slot| slot.clone());
        let Some(tx) = tx else {
            self.metrics.inc_dropped_count();
            debug!(sink = %self.name, cmd = %entry.cmd_name, "writer closed, entry dropped");
            return;
        };

        self.metrics.inc_queued();
        if tx.send(entry).await.is_err() {
            self.metrics.dec_queued();
            self.metrics.inc_dropped_count();
            error!(sink = %self.name, "sink worker closed unexpectedly");
        }
    }

    /// Drain the queue, flush and close the sink
    ///
    /// Idempotent: only the first call waits for the worker.
    #[instrument(name = "writer_handle_close", skip(self), fields(sink = %self.name))]
    pub async fn close(&self) {
        // Drop sender to signal worker to stop
        let tx = self.tx.lock().ok().and_then(|mut slot| slot.take());
        drop(tx);

        let worker = self.worker_handle.lock().ok().and_then(|mut slot| slot.take());
        let Some(mut worker) = worker else {
            return;
        };
        // Wait for worker to finish
        match timeout(self.close_timeout, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(sink = %self.name, error = ?e, "worker task panicked"),
            Err(_) => {
                warn!(
                    sink = %self.name,
                    queued = self.metrics.snapshot().queued,
                    "sink did not drain in time, aborting worker"
                );
                worker.abort();
            }
        }
        debug!(sink = %self.name, "WriterHandle close complete");
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.tx.lock().map(|slot| slot.is_none()).unwrap_or(true)
    }
}

impl Statusable for WriterHandle {
    fn status(&self) -> serde_json::Value {
        let snap = self.metrics.snapshot();
        json!({
            "name": self.name,
            "queued": snap.queued,
            "write_count": snap.write_count,
            "failure_count": snap.failure_count,
            "dropped_count": snap.dropped_count,
            "sink": self.probe.as_ref().map(|p| p.status()),
        })
    }

    fn status_string(&self) -> String {
        let snap = self.metrics.snapshot();
        let mut line = format!(
            "writer=[{}], queued=[{}], written=[{}], failed=[{}]",
            self.name, snap.queued, snap.write_count, snap.failure_count
        );
        if let Some(probe) = &self.probe {
            line.push_str(", ");
            line.push_str(&probe.status_string());
        }
        line
    }

    fn status_consistent(&self) -> bool {
        self.metrics.queued() == 0
            && self.probe.as_ref().is_none_or(|p| p.status_consistent())
    }
}

/// Worker task that consumes entries and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: EntrySink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Entry>,
    metrics: Arc<WriterMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker started");

    while let Some(entry) = rx.recv().await {
        match sink.write(&entry).await {
            Ok(()) => {
                metrics.inc_write_count();
            }
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    sink = %name,
                    cmd = %entry.cmd_name,
                    error = %e,
                    "write failed"
                );
                // Continue processing - don't crash on single failure
            }
        }

        // Flush whenever the queue runs dry so idle output is never held back
        if rx.is_empty() {
            if let Err(e) = sink.flush().await {
                error!(sink = %name, error = %e, "flush failed");
            }
        }
        metrics.dec_queued();
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }

    debug!(sink = %name, "sink worker stopped");
}
