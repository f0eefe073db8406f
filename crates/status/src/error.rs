//! Status error types

use thiserror::Error;

/// Aggregator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("statistics aggregator stopped")]
    Closed,
}

/// Admin reporting errors
///
/// All of them are logged and dropped by the timers; none is retried.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("admin request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("admin returned HTTP {0}")]
    Status(u16),

    #[error("admin response is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("admin rejected report: code={code}, message={message}")]
    Rejected { code: i64, message: String },
}
