//! # Task Manager
//!
//! 同步任务生命周期管理。
//!
//! 同一时刻最多一个活动任务：
//! - `start`: 校验配置，构造 Reader / Writer，挂载统计，启动 pipeline
//! - `cancel`: 取消任务，关闭 Writer，释放 Reader，丢弃统计
//! - `info` / `health`: 按 id 查询
//!
//! 数据流：Reader channel → pipeline (解析、计数、过滤) → WriterHandle

mod error;
mod factory;
mod manager;
pub mod pipeline;

pub use error::TaskError;
pub use factory::{ComponentFactory, ConfiguredFactory, LocalComponentFactory, ReaderGuard};
pub use manager::TaskManager;
pub use pipeline::PipelineSummary;
