//! lameduck - run an HTTP server with signal-triggered lame-duck shutdown
//!
//! Usage:
//!     lameduck [--config <path>] [--listen <addr>] [--grace-period <duration>]
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use lameduck::config::{Config, load_config, validate_config};
use lameduck::util::init_logging;
use lameduck::{HttpServer, RunError, Runner};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run an HTTP server that drains gracefully on SIGINT/SIGTERM.
#[derive(Parser, Debug)]
#[command(name = "lameduck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the listen address
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Override the lame-duck grace period (e.g. "10s", "1m")
    #[arg(short, long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    grace_period: Option<Duration>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => load_config(path).with_context(|| {
            format!("failed to load configuration from '{}'", path.display())
        })?,
        None => Config::default(),
    };

    // CLI overrides config
    if let Some(level) = cli.log_level {
        config.global.log_level = level;
    }
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(grace_period) = cli.grace_period {
        config.lameduck.grace_period = grace_period;
    }

    validate_config(&config)
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    // Initialize logging
    init_logging(&config.global.log_level, &config.global.log_format);

    // If --validate flag, just validate and exit
    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.server.listen);
        println!(
            "  Grace period: {}",
            humantime::format_duration(config.lameduck.grace_period)
        );
        println!("  Signals: {:?}", config.lameduck.signals);
        return Ok(());
    }

    info!(
        listen = %config.server.listen,
        grace_period = %humantime::format_duration(config.lameduck.grace_period),
        signals = ?config.lameduck.signals,
        "lameduck starting"
    );

    run(config)
}

/// Run the server with the given configuration.
fn run(config: Config) -> Result<()> {
    // Create tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point.
async fn run_async(config: Config) -> Result<()> {
    let server = HttpServer::bind(&config.server)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;

    let runner = Runner::new(Arc::new(server), config.lameduck.options())
        .context("failed to create runner")?;

    match runner.run(CancellationToken::new()).await {
        Ok(()) => {
            info!("lameduck shut down cleanly");
            Ok(())
        }
        Err(e @ RunError::LameDuck(_)) => {
            error!(error = %e, expired = e.is_expired(), "lame-duck shutdown failed");
            Err(e).context("lame-duck shutdown failed")
        }
        Err(e) => {
            error!(error = %e, "server failed");
            Err(e).context("server failed")
        }
    }
}
