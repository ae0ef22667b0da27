use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod digest;
mod format;
mod mycelium_cli;

use mycelium_cli::Commands;
use mycelium_core::MyceliumConfig;

#[derive(Parser)]
#[command(name = "mycelium")]
#[command(about = "Shared memory substrate for an agent fleet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: <data dir>/mycelium.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level when RUST_LOG is unset: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let config = MyceliumConfig::discover(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    tracing::debug!("Using data directory {}", config.data_path().display());

    mycelium_cli::handle_command(cli.command, config)
}

/// Logs go to stderr so `taste --raw` output on stdout stays parseable.
fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}
