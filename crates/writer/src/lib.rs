//! # Writer
//!
//! 写入端模块。
//!
//! 负责：
//! - 把 `Entry` 编码写入目标 (Redis / AOF 文件 / UDP / 日志)
//! - 每个 writer 一个有界队列 + worker，队列满时反压上游
//! - 单条写入失败只记录，不中断任务

pub mod error;
pub mod factory;
pub mod handle;
pub mod resp;
pub mod sinks;

mod counters;

pub use contracts::{Entry, EntrySink};
pub use counters::{MetricsSnapshot, WriterMetrics};
pub use error::WriterError;
pub use factory::create_writer;
pub use handle::{WriterHandle, DEFAULT_QUEUE_CAPACITY};
pub use sinks::{FileSink, LogSink, RedisSink, RedisSinkSettings, UdpSink};
