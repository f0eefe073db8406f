//! # Status
//!
//! 任务统计与外部上报。
//!
//! - `Aggregator`: 闭包队列 actor，独占 `Stat`，负责计数、OPS、一致性
//! - `AdminReporter`: 向 admin 服务推送 heartbeat 与 checkpoint

pub mod aggregator;
pub mod entry_count;
pub mod error;
pub mod reporter;
pub mod stat;

pub use aggregator::{
    Aggregator, AggregatorSettings, Attachment, StatState, TaskSnapshot, TaskState,
    QUEUE_CAPACITY,
};
pub use entry_count::EntryCount;
pub use error::{ReportError, StatusError};
pub use reporter::{AdminReporter, AdminResponse, Checkpoint, WorkerIdentity};
pub use stat::Stat;
