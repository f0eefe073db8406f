//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{AppConfig, ReaderOptions, WriterOptions};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reader: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    writer: Option<&'static str>,
    log_level: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(config: &AppConfig) -> ConfigSummary {
    let standalone = !config.control_plane_enabled();
    let reader = config.task.reader_options().ok().map(|r| match r {
        ReaderOptions::Static(_) => "static_reader",
        ReaderOptions::File(_) => "file_reader",
        ReaderOptions::Mock(_) => "mock_reader",
    });
    let writer = config.task.writer_options().ok().map(|w| match w {
        WriterOptions::Redis(_) => "redis_writer",
        WriterOptions::File(_) => "file_writer",
        WriterOptions::Udp(_) => "udp_writer",
        WriterOptions::Log(_) => "log_writer",
    });

    ConfigSummary {
        mode: if standalone { "standalone" } else { "control_plane" },
        task_id: standalone.then(|| config.task.task_id.clone()),
        reader,
        writer,
        log_level: config.advanced.log_level.clone(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.advanced.log_interval == 0 {
        warnings.push("advanced.log_interval is 0 - periodic summaries disabled".to_string());
    }

    if config.metrics.port == 0 {
        warnings.push("metrics.port is 0 - Prometheus exporter disabled".to_string());
    }

    if config.task.redis_writer.as_ref().is_some_and(|w| w.off_reply) {
        warnings.push("redis_writer.off_reply is set - write errors will not be observed".to_string());
    }

    if config.control_plane_enabled() && config.task.reader_options().is_ok() {
        warnings.push("task sections are ignored while http_server is enabled".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Mode: {}", summary.mode);
            if let Some(ref task_id) = summary.task_id {
                println!("  Task: {}", task_id);
            }
            if let Some(reader) = summary.reader {
                println!("  Reader: {}", reader);
            }
            if let Some(writer) = summary.writer {
                println!("  Writer: {}", writer);
            }
            println!("  Log level: {}", summary.log_level);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
