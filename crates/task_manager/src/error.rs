//! Task lifecycle errors

use contracts::ContractError;
use status::StatusError;
use thiserror::Error;

/// Errors returned by `TaskManager` operations
///
/// Each variant maps to one control-plane response code.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task already active: {0}")]
    AlreadyActive(String),

    #[error("missing task id")]
    MissingTaskId,

    #[error("invalid config: {0}")]
    InvalidConfig(#[source] ContractError),

    #[error("task construction failed: {0}")]
    Construction(#[source] ContractError),

    #[error("no task")]
    NoTask,

    #[error(transparent)]
    Stats(#[from] StatusError),
}

impl TaskError {
    /// Response code carried in the control-plane envelope
    pub fn code(&self) -> i32 {
        match self {
            Self::AlreadyActive(_) => 1,
            Self::MissingTaskId | Self::InvalidConfig(_) => 2,
            Self::Construction(_) => 3,
            Self::NoTask => 4,
            Self::Stats(_) => -1,
        }
    }

    /// Config errors are the caller's fault, everything else is construction
    pub(crate) fn from_factory(err: ContractError) -> Self {
        if err.is_config() {
            Self::InvalidConfig(err)
        } else {
            Self::Construction(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(TaskError::AlreadyActive("t1".into()).code(), 1);
        assert_eq!(TaskError::MissingTaskId.code(), 2);
        assert_eq!(
            TaskError::InvalidConfig(ContractError::config_validation("x", "y")).code(),
            2
        );
        assert_eq!(
            TaskError::Construction(ContractError::sink_connection("redis_writer", "refused"))
                .code(),
            3
        );
        assert_eq!(TaskError::NoTask.code(), 4);
    }

    #[test]
    fn test_factory_classification() {
        let err = TaskError::from_factory(ContractError::config_validation("writer", "none"));
        assert!(matches!(err, TaskError::InvalidConfig(_)));

        let err = TaskError::from_factory(ContractError::reader_open("file_reader", "missing"));
        assert!(matches!(err, TaskError::Construction(_)));
    }
}
