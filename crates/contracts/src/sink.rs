//! EntrySink trait - encoder side of a sync task
//!
//! Defines the abstract interface for concrete sinks. The core never calls a
//! sink directly: sinks are driven by a writer worker that owns them.

use std::sync::Arc;

use crate::{ContractError, Entry, Statusable};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(EntrySink: Send)]
pub trait LocalEntrySink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one entry
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, entry: &Entry) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;

    /// Sink-specific status that stays readable after the sink moves into
    /// its worker
    fn status_probe(&self) -> Option<Arc<dyn Statusable>> {
        None
    }
}
