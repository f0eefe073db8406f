//! LogSink - logs entry summary via tracing

use contracts::{ContractError, Entry, EntrySink};
use tracing::{info, instrument};

/// Sink that logs every entry, for dry runs and debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EntrySink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, entry: &Entry) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            db = entry.db,
            group = entry.group,
            cmd = %entry.cmd_name,
            "{}",
            entry.to_text()
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let mut entry = Entry::from_args(["SET", "a", "1"]);
        entry.parse().unwrap();

        assert!(sink.write(&entry).await.is_ok());
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
        assert!(sink.status_probe().is_none());
    }
}
