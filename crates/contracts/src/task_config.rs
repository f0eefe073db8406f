//! TaskConfig - body of a task start request
//!
//! A task names exactly one reader section and one writer section. When
//! several are present the first one in priority order wins:
//! readers `static_reader` > `file_reader` > `mock_reader`,
//! writers `redis_writer` > `file_writer` > `udp_writer` > `log_writer`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ContractError;

/// Complete task configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task identifier, required
    #[serde(default)]
    pub task_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_reader: Option<StaticReaderOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_reader: Option<FileReaderOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_reader: Option<MockReaderOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_writer: Option<RedisWriterOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_writer: Option<FileWriterOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_writer: Option<UdpWriterOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_writer: Option<LogWriterOptions>,

    /// Command filter applied between reader and writer
    #[serde(default)]
    pub filter: FilterOptions,
}

/// Reader section selected from a task config
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderOptions {
    Static(StaticReaderOptions),
    File(FileReaderOptions),
    Mock(MockReaderOptions),
}

/// Writer section selected from a task config
#[derive(Debug, Clone, PartialEq)]
pub enum WriterOptions {
    Redis(RedisWriterOptions),
    File(FileWriterOptions),
    Udp(UdpWriterOptions),
    Log(LogWriterOptions),
}

impl TaskConfig {
    /// Pick the reader section
    ///
    /// # Errors
    /// `ConfigValidation` when no reader section is present.
    pub fn reader_options(&self) -> Result<ReaderOptions, ContractError> {
        if let Some(opts) = &self.static_reader {
            Ok(ReaderOptions::Static(opts.clone()))
        } else if let Some(opts) = &self.file_reader {
            Ok(ReaderOptions::File(opts.clone()))
        } else if let Some(opts) = &self.mock_reader {
            Ok(ReaderOptions::Mock(opts.clone()))
        } else {
            Err(ContractError::config_validation(
                "reader",
                "no reader config entry found",
            ))
        }
    }

    /// Pick the writer section
    ///
    /// # Errors
    /// `ConfigValidation` when no writer section is present.
    pub fn writer_options(&self) -> Result<WriterOptions, ContractError> {
        if let Some(opts) = &self.redis_writer {
            Ok(WriterOptions::Redis(opts.clone()))
        } else if let Some(opts) = &self.file_writer {
            Ok(WriterOptions::File(opts.clone()))
        } else if let Some(opts) = &self.udp_writer {
            Ok(WriterOptions::Udp(opts.clone()))
        } else if let Some(opts) = &self.log_writer {
            Ok(WriterOptions::Log(opts.clone()))
        } else {
            Err(ContractError::config_validation(
                "writer",
                "no writer config entry found",
            ))
        }
    }

    /// Config as JSON, for display in task info
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Reader over entries listed inline in the config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticReaderOptions {
    /// Each entry is an argv
    #[serde(default)]
    pub entries: Vec<Vec<String>>,

    /// Database the entries belong to
    #[serde(default)]
    pub db: i32,
}

/// Reader over a command file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReaderOptions {
    pub filepath: PathBuf,

    #[serde(default)]
    pub format: FileFormat,

    /// Byte offset to resume from (a previously reported checkpoint)
    #[serde(default)]
    pub start_offset: u64,
}

/// Line format of a command file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// One command per line, arguments separated by whitespace
    #[default]
    Text,
    /// One JSON array of strings per line
    Json,
}

/// Synthetic replication source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockReaderOptions {
    /// Entries per second, 0 = unthrottled
    #[serde(default = "default_mock_rate")]
    pub rate: f64,

    /// Number of distinct keys cycled through
    #[serde(default = "default_mock_key_space")]
    pub key_space: u64,

    /// Stop after this many entries, 0 = unbounded
    #[serde(default)]
    pub count: u64,

    /// Replication id reported in checkpoints
    #[serde(default)]
    pub repl_id: Option<String>,
}

impl Default for MockReaderOptions {
    fn default() -> Self {
        Self {
            rate: default_mock_rate(),
            key_space: default_mock_key_space(),
            count: 0,
            repl_id: None,
        }
    }
}

fn default_mock_rate() -> f64 {
    100.0
}

fn default_mock_key_space() -> u64 {
    1000
}

/// Redis standalone writer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedisWriterOptions {
    /// `host:port`
    pub address: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Send `CLIENT REPLY OFF` and stop tracking replies
    #[serde(default)]
    pub off_reply: bool,
}

/// Append-only file writer (RESP encoded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileWriterOptions {
    pub filepath: PathBuf,
}

/// UDP datagram writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpWriterOptions {
    /// Target `host:port`
    pub address: String,

    #[serde(default)]
    pub format: UdpFormat,

    /// Datagrams larger than this are rejected
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

fn default_max_packet_size() -> usize {
    65000
}

/// Serialization format for UDP transmission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UdpFormat {
    /// Space separated argv
    #[default]
    Text,
    /// JSON (human-readable, larger)
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Writer that only logs entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogWriterOptions {}

/// Command filter
///
/// Names are compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// When non-empty only these commands are written
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_commands: Vec<String>,

    /// These commands are never written
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_commands: Vec<String>,
}

impl FilterOptions {
    /// Whether a command passes the filter
    pub fn allows(&self, cmd_name: &str) -> bool {
        if self
            .block_commands
            .iter()
            .any(|c| c.eq_ignore_ascii_case(cmd_name))
        {
            return false;
        }
        self.allow_commands.is_empty()
            || self
                .allow_commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(cmd_name))
    }

    /// Whether the filter lets everything through
    pub fn is_pass_through(&self) -> bool {
        self.allow_commands.is_empty() && self.block_commands.is_empty()
    }
}
