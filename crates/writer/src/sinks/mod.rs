//! Sink implementations
//!
//! Contains LogSink, FileSink, UdpSink and RedisSink.

mod file;
mod log;
mod redis;
mod udp;

pub use self::file::FileSink;
pub use self::log::LogSink;
pub use self::redis::{RedisSink, RedisSinkSettings};
pub use self::udp::UdpSink;
