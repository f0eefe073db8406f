//! # Redis Syncer CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 控制面 / 独立模式任务运行
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use observability::LoggingConfig;

use cli::{Cli, Commands};
use commands::{run, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // `run` sets up logging itself once the config file is loaded
    let result = match &cli.command {
        Commands::Run(args) => run(&cli, args).await,
        Commands::Validate(args) => {
            let _guard = observability::init_logging(&LoggingConfig {
                log_format: cli.log_format.into(),
                level: cli.level_override().unwrap_or("info").to_string(),
                ..Default::default()
            })?;
            run_validate(args)
        }
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
