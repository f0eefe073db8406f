//! Writer error types

use thiserror::Error;

/// Writer-specific errors
#[derive(Debug, Error)]
pub enum WriterError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Malformed reply from the target
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WriterError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<WriterError> for contracts::ContractError {
    fn from(err: WriterError) -> Self {
        match err {
            WriterError::Contract(inner) => inner,
            WriterError::SinkCreation { name, message } => Self::sink_connection(name, message),
            other => Self::Other(other.to_string()),
        }
    }
}
