//! Reader trait - source side of a sync task
//!
//! Concrete readers decode an upstream stream into `Entry` values and push
//! them on a bounded channel, so a slow consumer throttles the reader
//! instead of growing memory.

use async_channel::Receiver;
use tokio_util::sync::CancellationToken;

use crate::{Entry, Statusable};

/// Source of entries
///
/// # Example
///
/// ```ignore
/// let reader: Arc<dyn Reader> = reader::create_reader(&task_config, 1024)?;
/// let rx = reader.start_read(token.clone());
/// while let Ok(entry) = rx.recv().await {
///     // ...
/// }
/// reader.shutdown();
/// ```
pub trait Reader: Statusable {
    /// Start producing entries in source order
    ///
    /// The returned channel closes when `cancel` fires or the upstream
    /// stream ends. Calling it a second time yields an already-closed
    /// receiver.
    fn start_read(&self, cancel: CancellationToken) -> Receiver<Entry>;

    /// Release background resources
    ///
    /// Idempotent. Also stops a running read.
    fn shutdown(&self);
}
