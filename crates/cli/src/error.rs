//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Task in the configuration file failed to start
    #[error("Failed to start task: {0}")]
    Task(#[from] task_manager::TaskError),

    /// Admin reporter could not be created
    #[error("Failed to create admin reporter: {0}")]
    Report(#[from] status::ReportError),

    /// Control plane failed
    #[error("Control plane failed: {0}")]
    ControlPlane(#[from] control_plane::ControlPlaneError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}
