//! # Contracts
//!
//! Shared interface contracts between the sync crates: the `Entry` record,
//! the `Reader` / `EntrySink` / `Statusable` traits and the configuration
//! model. All business crates depend on this crate, never the other way.

mod app_config;
mod entry;
mod error;
mod reader;
mod sink;
mod status;
mod task_config;

pub use app_config::*;
pub use entry::{Entry, UNKNOWN_GROUP};
pub use error::*;
pub use reader::Reader;
pub use sink::*;
pub use status::Statusable;
pub use task_config::*;
