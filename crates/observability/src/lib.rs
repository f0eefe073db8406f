//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 控制台 + 按天滚动的日志文件)
//! - Prometheus 指标导出
//! - 同步任务指标记录
//!
//! ## 使用示例
//!
//! ```ignore
//! let _guard = observability::init_logging(&LoggingConfig {
//!     level: "info".into(),
//!     ..Default::default()
//! })?;
//! observability::init_metrics(9100)?;
//!
//! observability::metrics::record_entry_read("SET");
//! ```

pub mod metrics;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

// Re-exports
pub use crate::metrics::{
    record_consistency, record_entry_read, record_entry_written, record_ops,
    record_report_failure,
};

/// 允许的日志级别
pub const ALLOWED_LEVELS: &[&str] = &["debug", "info", "warn"];

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 控制台日志格式
    pub log_format: LogFormat,
    /// 日志级别 (debug / info / warn)
    pub level: String,
    /// 日志文件目录
    pub dir: PathBuf,
    /// 日志文件名，空字符串表示只输出到控制台
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            level: "info".to_string(),
            dir: PathBuf::from("data"),
            log_file: String::new(),
        }
    }
}

/// 校验日志级别
pub fn check_level(level: &str) -> Result<()> {
    if !ALLOWED_LEVELS.contains(&level) {
        bail!(
            "unknown log level '{level}', expected one of {}",
            ALLOWED_LEVELS.join(", ")
        );
    }
    Ok(())
}

/// 初始化 Tracing
///
/// `RUST_LOG` 优先于配置中的级别。配置了日志文件时返回的 guard
/// 必须保持存活，drop 时会刷出剩余日志。
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    check_level(&config.level)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    });

    let guard = if config.log_file.is_empty() {
        None
    } else {
        std::fs::create_dir_all(&config.dir)
            .with_context(|| format!("Failed to create log dir {}", config.dir.display()))?;
        let appender = tracing_appender::rolling::daily(&config.dir, &config.log_file);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());
        Some(guard)
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        log_format = ?config.log_format,
        level = %config.level,
        log_file = %config.log_file,
        "Logging initialized"
    );

    Ok(guard)
}

/// 初始化 Prometheus 指标导出
///
/// `port` 为 0 时不启动。
pub fn init_metrics(port: u16) -> Result<()> {
    if port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
