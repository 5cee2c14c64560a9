//! polymarket_book - Main Entry Point
//!
//! Resolves one market of a Polymarket event and shows its live order book
//! in the terminal.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

use polymarket_book::config::loader::load_config;
use polymarket_book::{run_viewer, ExitReason, MarketQuery};

/// Exit code after Ctrl-C (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Polymarket event URL (or bare event slug)
    #[arg(long)]
    event_url: String,

    /// Fragment of the market question to pick, e.g. "February 28"
    #[arg(long, required_unless_present = "market_slug")]
    date_text: Option<String>,

    /// Exact market slug; takes precedence over --date-text
    #[arg(long)]
    market_slug: Option<String>,

    /// Levels per side (clamped to the terminal height)
    #[arg(long)]
    depth: Option<usize>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(long)]
    log_level: Option<String>,

    /// Write logs to this file; without it logs are discarded
    #[arg(long, env = "POLYMARKET_BOOK_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(Some(&args.config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    if let Err(e) = init_logging(&level, args.log_file.as_ref()) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    info!(event_url = %args.event_url, config = %args.config, "Starting polymarket_book");

    let query = MarketQuery {
        event_url: args.event_url,
        date_text: args.date_text,
        market_slug: args.market_slug,
    };

    match run_viewer(&config, query, args.depth).await {
        Ok(ExitReason::Interrupted) => {
            info!("Interrupted, exiting");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Ok(ExitReason::Finished) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Viewer failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// The terminal belongs to the viewer, so logs go to a file or nowhere
fn init_logging(level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level:?}"))?;

    let writer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::sink),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install tracing subscriber")
}
