//! Component construction for a task
//!
//! The manager builds its reader and writer through `ComponentFactory` so
//! tests can swap in mock components.

use std::sync::Arc;

use contracts::{AdvancedOptions, ContractError, Reader, TaskConfig};
use tracing::debug;
use writer::WriterHandle;

/// Builds the reader and writer of a task
#[trait_variant::make(ComponentFactory: Send)]
pub trait LocalComponentFactory {
    /// Build the reader named by the task config
    fn create_reader(&self, task: &TaskConfig) -> Result<Arc<dyn Reader>, ContractError>;

    /// Build and start the writer named by the task config
    async fn create_writer(&self, task: &TaskConfig) -> Result<Arc<WriterHandle>, ContractError>;
}

/// Factory backed by the bundled readers and sinks
#[derive(Debug, Clone, Default)]
pub struct ConfiguredFactory {
    advanced: AdvancedOptions,
}

impl ConfiguredFactory {
    pub fn new(advanced: AdvancedOptions) -> Self {
        Self { advanced }
    }
}

impl ComponentFactory for ConfiguredFactory {
    fn create_reader(&self, task: &TaskConfig) -> Result<Arc<dyn Reader>, ContractError> {
        reader::create_reader(task, self.advanced.reader_channel_capacity)
    }

    async fn create_writer(&self, task: &TaskConfig) -> Result<Arc<WriterHandle>, ContractError> {
        debug!(task_id = %task.task_id, "creating writer");
        writer::create_writer(task, &self.advanced).await
    }
}

/// Shuts the reader down on drop unless released with `into_inner`
///
/// Held while the writer is built so a failed construction never leaks a
/// running reader.
pub struct ReaderGuard {
    reader: Arc<dyn Reader>,
    armed: bool,
}

impl ReaderGuard {
    pub fn new(reader: Arc<dyn Reader>) -> Self {
        Self {
            reader,
            armed: true,
        }
    }

    /// Disarm the guard and hand the reader over
    pub fn into_inner(mut self) -> Arc<dyn Reader> {
        self.armed = false;
        Arc::clone(&self.reader)
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!("releasing reader of unfinished task");
            self.reader.shutdown();
        }
    }
}
