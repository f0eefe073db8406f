//! Statusable - status introspection shared by readers and writers

/// Status introspection surface
///
/// Implementations must be cheap to call: the aggregator samples them on a
/// fixed tick and the log ticker formats `status_string()` on every tick.
pub trait Statusable: Send + Sync {
    /// Opaque status snapshot, embedded verbatim into task stats
    fn status(&self) -> serde_json::Value;

    /// Human-readable one-line summary
    fn status_string(&self) -> String;

    /// Whether this end reports itself caught up
    fn status_consistent(&self) -> bool;

    /// Replication id and offset usable as a checkpoint
    ///
    /// `None` for sources that cannot be resumed.
    fn id_offset(&self) -> Option<(String, i64)> {
        None
    }
}
