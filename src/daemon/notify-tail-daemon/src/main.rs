//! notify-tail - show lines appended to files as desktop notifications
//!
//! Follows each file across deletion, rotation and truncation and sends every
//! new line to the configured notification sink.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notify_tail_daemon::{Daemon, LogFormat, SinkKind, TailConfig};

/// notify-tail - tail files into desktop notifications
#[derive(Parser)]
#[command(name = "notify-tail")]
#[command(about = "Show lines appended to files as desktop notifications")]
#[command(version)]
struct Cli {
    /// Files to follow; they do not need to exist yet
    #[arg(required_unless_present = "dump_config")]
    paths: Vec<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "notify-tail.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Override the notification sink
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// Show content already present in the files at startup
    #[arg(long)]
    from_start: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let mut config = if config_found {
        TailConfig::load_from_file(&cli.config)?
    } else {
        TailConfig::default()
    };

    // Apply CLI overrides
    if let Some(sink) = cli.sink {
        config.notification.sink = sink;
    }
    if cli.from_start {
        config.tail.from_start = true;
    }

    config.validate()?;

    if cli.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_tracing(&config, cli.debug)?;

    if config_found {
        info!("Using configuration file: {}", cli.config.display());
    } else {
        warn!(
            "Configuration file {} not found, using defaults",
            cli.config.display()
        );
    }

    let daemon = Daemon::new(&config, &cli.paths).context("Startup failed")?;
    daemon.run()
}

/// Initialize tracing/logging
fn init_tracing(config: &TailConfig, debug: bool) -> Result<()> {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Full => registry.with(layer).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    }
    .context("Failed to initialize logging")?;

    Ok(())
}
