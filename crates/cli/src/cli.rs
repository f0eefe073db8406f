//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Redis Syncer - copies a Redis mutation stream into a target sink
#[derive(Parser, Debug)]
#[command(
    name = "redis-syncer",
    author,
    version,
    about = "Redis sync task orchestrator",
    long_about = "Copies a mutation stream from a Redis-compatible source into a target sink.\n\n\
                  With [http_server] enabled it serves a control plane that starts, cancels \n\
                  and inspects one task at a time; otherwise it runs the task described in \n\
                  the configuration file directly."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "REDIS_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "REDIS_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level forced by `-v` / `-q`, overriding `advanced.log_level`
    pub fn level_override(&self) -> Option<&'static str> {
        if self.quiet {
            Some("warn")
        } else if self.verbose > 0 {
            Some("debug")
        } else {
            None
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control plane, or the configured task in standalone mode
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "redis-syncer.toml",
        env = "REDIS_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the Prometheus exporter port (0 = disabled)
    #[arg(long, env = "REDIS_SYNCER_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "redis-syncer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
