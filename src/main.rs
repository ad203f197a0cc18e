//! Pavilion - HPC test harness
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pavilion::cli::{Cli, Commands};
use pavilion::config::{Config, ConfigManager};
use pavilion::error::PavResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            if e.is_retryable() {
                eprintln!("{} this failure is transient; retrying may succeed", style("Note:").dim());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PavResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    // Config commands work without a working directory
    if let Commands::Config(args) = cli.command {
        return pavilion::cli::commands::config(args, &config, &config_manager).await;
    }

    ConfigManager::ensure_working_dirs(&config).await?;

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Create(args) => pavilion::cli::commands::create(args, &config).await,
        Commands::Build(args) => pavilion::cli::commands::build(args, &config).await,
        Commands::Run(args) => pavilion::cli::commands::run(args, &config).await,
        Commands::Status(args) => pavilion::cli::commands::status(args, &config).await,
        Commands::List(args) => pavilion::cli::commands::list(args, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr so listings on
/// stdout stay machine readable.
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("pavilion=warn"),
        1 => EnvFilter::new("pavilion=info"),
        _ => EnvFilter::new("pavilion=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
