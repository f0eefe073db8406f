//! Reader factory
//!
//! Selects the concrete reader from the task config.

use std::sync::Arc;

use contracts::{ContractError, Reader, ReaderOptions, TaskConfig};
use tracing::{info, instrument};

use crate::file_reader::FileReader;
use crate::mock::MockReader;
use crate::static_reader::StaticReader;

/// Build the reader named by the task config
///
/// # Errors
/// - `ConfigValidation` when no reader section is present
/// - `ReaderOpen` when the source cannot be opened
#[instrument(name = "reader_create", skip(task), fields(task_id = %task.task_id))]
pub fn create_reader(
    task: &TaskConfig,
    channel_capacity: usize,
) -> Result<Arc<dyn Reader>, ContractError> {
    let reader: Arc<dyn Reader> = match task.reader_options()? {
        ReaderOptions::Static(opts) => {
            info!(entries = opts.entries.len(), "create StaticReader");
            Arc::new(StaticReader::new(&opts, channel_capacity))
        }
        ReaderOptions::File(opts) => {
            info!(filepath = %opts.filepath.display(), format = ?opts.format, "create FileReader");
            Arc::new(FileReader::open(&opts, channel_capacity)?)
        }
        ReaderOptions::Mock(opts) => {
            info!(rate = opts.rate, count = opts.count, "create MockReader");
            Arc::new(MockReader::new(&opts, channel_capacity))
        }
    };
    Ok(reader)
}
