//! `run` command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{AppConfig, HttpServerOptions};
use observability::LoggingConfig;
use status::{AdminReporter, Aggregator, AggregatorSettings, WorkerIdentity};
use task_manager::{ConfiguredFactory, TaskManager};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::{Cli, RunArgs};
use crate::error::CliError;

/// Execute the `run` command
pub async fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Logging depends on the file, so it starts after loading
    let _guard = observability::init_logging(&LoggingConfig {
        log_format: cli.log_format.into(),
        level: cli
            .level_override()
            .map(str::to_string)
            .unwrap_or_else(|| config.advanced.log_level.clone()),
        dir: config.advanced.dir.clone(),
        log_file: config.advanced.log_file.clone(),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        control_plane = config.control_plane_enabled(),
        "Redis Syncer starting"
    );

    observability::init_metrics(args.metrics_port.unwrap_or(config.metrics.port))?;

    let shutdown = CancellationToken::new();
    let http = config.http_server.clone().filter(|h| h.enable);
    let reporter = http.as_ref().map(admin_reporter).transpose()?;

    let aggregator = Aggregator::spawn(
        AggregatorSettings::from_advanced(&config.advanced),
        reporter,
        shutdown.clone(),
    );
    let manager = Arc::new(TaskManager::new(
        ConfiguredFactory::new(config.advanced.clone()),
        config.advanced.clone(),
        aggregator,
    ));

    let result = match http {
        Some(http) => serve_control_plane(Arc::clone(&manager), &http).await,
        None => run_standalone(&manager, &config).await,
    };

    manager.shutdown().await;
    shutdown.cancel();

    if let Err(ref e) = result {
        error!(error = %e, "Redis Syncer stopped with error");
    }
    result?;

    info!("Redis Syncer finished");
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig, CliError> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}

fn admin_reporter(http: &HttpServerOptions) -> Result<AdminReporter, CliError> {
    let identity = WorkerIdentity {
        ip: http.host.clone(),
        port: http.http_port,
    };
    Ok(AdminReporter::new(&http.admin_url, identity)?)
}

/// Serve the control plane until Ctrl+C / SIGTERM
async fn serve_control_plane(
    manager: Arc<TaskManager>,
    http: &HttpServerOptions,
) -> Result<(), CliError> {
    let addr = format!("{}:{}", http.host, http.http_port);
    let router = control_plane::router(manager);

    control_plane::serve(router, &addr, async {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping control plane...");
    })
    .await?;
    Ok(())
}

/// Run the task from the config file until it completes or a signal arrives
async fn run_standalone(manager: &TaskManager, config: &AppConfig) -> Result<(), CliError> {
    let task_id = config.task.task_id.clone();
    manager.start(config.task.clone()).await?;
    info!(task_id = %task_id, "Standalone task started");

    tokio::select! {
        _ = manager.wait_idle() => {
            info!(task_id = %task_id, "Task completed");
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, cancelling task...");
            return Ok(());
        }
    }

    // Print final statistics
    match manager.info(&task_id).await {
        Ok(snapshot) => {
            let stat = &snapshot.stat;
            info!(
                task_id = %task_id,
                consistent = stat.consistent,
                "{}",
                stat.total_entries_count
            );
            for (cmd, count) in &stat.per_cmd_entries_count {
                println!("  {cmd:<12} {count}");
            }
        }
        Err(e) => warn!(error = %e, "Final statistics unavailable"),
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Path::new("/nonexistent/redis-syncer.toml")).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[advanced]\nlog_level = \"loud\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[tokio::test]
    async fn test_standalone_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.aof");
        let path = dir.path().join("standalone.toml");
        std::fs::write(
            &path,
            format!(
                r#"
task_id = "local"

[advanced]
log_interval = 0

[static_reader]
entries = [["SET", "a", "1"], ["DEL", "a"]]

[file_writer]
filepath = "{}"
"#,
                out.display()
            ),
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(!config.control_plane_enabled());

        let aggregator = Aggregator::spawn(
            AggregatorSettings::from_advanced(&config.advanced),
            None,
            CancellationToken::new(),
        );
        let manager = TaskManager::new(
            ConfiguredFactory::new(config.advanced.clone()),
            config.advanced.clone(),
            aggregator,
        );
        run_standalone(&manager, &config).await.unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("SET"));
        assert!(written.contains("DEL"));
    }
}
