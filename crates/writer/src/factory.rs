//! Writer factory
//!
//! Selects the concrete sink from the task config and wraps it in a
//! `WriterHandle`.

use std::sync::Arc;

use contracts::{AdvancedOptions, ContractError, TaskConfig, WriterOptions};
use tracing::{info, instrument};

use crate::error::WriterError;
use crate::handle::WriterHandle;
use crate::sinks::{FileSink, LogSink, RedisSink, RedisSinkSettings, UdpSink};

/// Build the writer named by the task config
///
/// # Errors
/// - `ConfigValidation` when no writer section is present
/// - `SinkConnection` when the target cannot be opened or reached
#[instrument(name = "writer_create", skip(task, advanced), fields(task_id = %task.task_id))]
pub async fn create_writer(
    task: &TaskConfig,
    advanced: &AdvancedOptions,
) -> Result<Arc<WriterHandle>, ContractError> {
    let capacity = advanced.writer_queue_capacity;

    let handle = match task.writer_options()? {
        WriterOptions::Redis(opts) => {
            info!(address = %opts.address, "create RedisSink");
            let settings = RedisSinkSettings {
                restore: advanced.rdb_restore_command_behavior,
                flush_all: advanced.empty_db_before_sync,
            };
            WriterHandle::spawn(RedisSink::connect(&opts, settings).await?, capacity)
        }
        WriterOptions::File(opts) => {
            info!(filepath = %opts.filepath.display(), "create FileSink");
            let sink = FileSink::open("file_writer", &opts.filepath)
                .await
                .map_err(|e| WriterError::sink_creation("file_writer", e.to_string()))?;
            WriterHandle::spawn(sink, capacity)
        }
        WriterOptions::Udp(opts) => {
            info!(address = %opts.address, format = ?opts.format, "create UdpSink");
            let sink = UdpSink::new("udp_writer", opts)
                .await
                .map_err(|e| WriterError::sink_creation("udp_writer", e.to_string()))?;
            WriterHandle::spawn(sink, capacity)
        }
        WriterOptions::Log(_) => {
            info!("create LogSink");
            WriterHandle::spawn(LogSink::new("log_writer"), capacity)
        }
    };

    Ok(Arc::new(handle))
}
