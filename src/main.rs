use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gdrive_export::{Config, DriveClient, SyncEngine, SyncSummary};

#[derive(Parser, Debug)]
#[command(name = "gdrive-export")]
#[command(about = "Export Google Docs, Sheets, and Slides to Microsoft Office formats and PDF.")]
#[command(version)]
struct Cli {
    /// Output directory path
    #[arg(short, long)]
    output: PathBuf,

    /// Starting folder ID
    #[arg(short, long)]
    folder: String,

    /// Service account key file name, looked up in the secrets directory
    #[arg(short, long)]
    keyfile: Option<String>,

    /// Only log errors
    #[arg(short, long)]
    silent: bool,

    /// Seconds of difference after which a remote file counts as updated
    #[arg(short = 'u', long)]
    update_tolerance: Option<u64>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Report what would be exported without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    config.apply_overrides(cli.keyfile.clone(), cli.silent, cli.update_tolerance);

    init_logging(&config, cli.verbose);
    info!(
        "gdrive-export v{} starting export to '{}'",
        env!("CARGO_PKG_VERSION"),
        cli.output.display()
    );

    let drive = DriveClient::new(&config)?;
    let engine = SyncEngine::new(Arc::new(drive), config.sync_options(cli.dry_run));

    tokio::select! {
        summary = engine.run(&cli.folder, &cli.output) => {
            report_failures(&summary?);
        }
        _ = wait_for_interrupt() => {
            info!("Received Ctrl+C signal. Exiting gracefully...");
            std::process::exit(0);
        }
    }

    Ok(())
}

/// Initialize logging; silent mode keeps errors only
fn init_logging(config: &Config, verbose: bool) {
    let filter = EnvFilter::new(log_directives(config, verbose));

    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_ansi(config.logging.color);

    match config.logging.format.as_str() {
        "pretty" => registry.with(layer.pretty()).init(),
        "full" => registry.with(layer).init(),
        _ => registry.with(layer.compact()).init(),
    }
}

/// Filter directives, in priority order: silent, verbose, `RUST_LOG`, config level
fn log_directives(config: &Config, verbose: bool) -> String {
    if config.logging.silent {
        return "error".to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => directives,
        _ => config.logging.level.clone(),
    }
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn report_failures(summary: &SyncSummary) {
    for failure in &summary.failures {
        warn!("Failed: {}: {}", failure.path.display(), failure.error);
    }
}
