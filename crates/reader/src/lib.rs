//! # Reader
//!
//! Concrete entry sources behind the `contracts::Reader` contract.
//!
//! Every reader pushes onto a bounded `async_channel`, so a slow writer
//! throttles the source instead of growing memory.
//!
//! | Reader | Source |
//! |---|---|
//! | `StaticReader` | entries listed in the task config |
//! | `FileReader` | command file (text or JSON lines), resumable by byte offset |
//! | `MockReader` | synthetic replication stream, resumable by repl id + offset |

mod error;
mod factory;
mod file_reader;
mod counters;
mod mock;
mod producer;
mod static_reader;

pub use error::{ReaderError, Result};
pub use factory::create_reader;
pub use file_reader::FileReader;
pub use counters::{MetricsSnapshot, ReaderMetrics};
pub use mock::{generate as generate_mock_command, MockReader};
pub use static_reader::StaticReader;
