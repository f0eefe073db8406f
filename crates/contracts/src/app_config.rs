//! AppConfig - process configuration file model
//!
//! The file carries the process-wide `[advanced]`, `[http_server]` and
//! `[metrics]` sections. In standalone mode the task itself is described at
//! the top level of the same file (flattened `TaskConfig`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::TaskConfig;

/// Log levels accepted in `advanced.log_level`
pub const LOG_LEVELS: &[&str] = &["debug", "info", "warn"];

/// Root of the process configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub advanced: AdvancedOptions,

    /// Control plane; absent or disabled means standalone mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_server: Option<HttpServerOptions>,

    #[serde(default)]
    pub metrics: MetricsOptions,

    /// Task run directly in standalone mode
    #[serde(flatten)]
    pub task: TaskConfig,
}

impl AppConfig {
    /// Whether the HTTP control plane should run
    pub fn control_plane_enabled(&self) -> bool {
        self.http_server.as_ref().is_some_and(|h| h.enable)
    }
}

/// What to do with `RESTORE` commands coming out of a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreBehavior {
    /// Fail the write when the key already exists
    #[default]
    Panic,
    /// Overwrite existing keys (`RESTORE ... REPLACE`)
    Rewrite,
    /// Skip existing keys
    Skip,
}

/// Process-wide tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdvancedOptions {
    /// Working directory for log files
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Log file name inside `dir`; empty means console only
    #[serde(default)]
    pub log_file: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between summary log lines, 0 disables
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,

    #[serde(default)]
    pub rdb_restore_command_behavior: RestoreBehavior,

    /// Send `FLUSHALL` to the target before the first entry
    #[serde(default)]
    pub empty_db_before_sync: bool,

    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "capacity must be >= 1"))]
    pub writer_queue_capacity: usize,

    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "capacity must be >= 1"))]
    pub reader_channel_capacity: usize,

    /// Seconds between stat refresh ticks
    #[serde(default = "default_stat_interval")]
    #[validate(range(min = 1))]
    pub stat_interval: u64,

    /// Seconds between heartbeat pushes
    #[serde(default = "default_report_interval")]
    #[validate(range(min = 1))]
    pub heartbeat_interval: u64,

    /// Seconds between checkpoint pushes
    #[serde(default = "default_report_interval")]
    #[validate(range(min = 1))]
    pub checkpoint_interval: u64,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            log_file: String::new(),
            log_level: default_log_level(),
            log_interval: default_log_interval(),
            rdb_restore_command_behavior: RestoreBehavior::default(),
            empty_db_before_sync: false,
            writer_queue_capacity: default_capacity(),
            reader_channel_capacity: default_capacity(),
            stat_interval: default_stat_interval(),
            heartbeat_interval: default_report_interval(),
            checkpoint_interval: default_report_interval(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_interval() -> u64 {
    5
}

fn default_capacity() -> usize {
    1024
}

fn default_stat_interval() -> u64 {
    10
}

fn default_report_interval() -> u64 {
    60
}

/// HTTP control plane and admin reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpServerOptions {
    #[serde(default)]
    pub enable: bool,

    /// Address advertised in heartbeats and bound by the server
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub http_port: u16,

    /// Base URL of the admin service
    #[serde(default)]
    pub admin_url: String,
}

/// Prometheus exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsOptions {
    /// Listen port, 0 disables the exporter
    #[serde(default)]
    pub port: u16,
}
