//! share_stats CLI application
//!
//! Polls federated storage shares for usage and quota and publishes the
//! results to memcached, stdout or report files.

use std::fs::OpenOptions;
use std::process;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter};

use share_stats::cli::{handle_config, handle_stats, Cli, Commands};
use share_stats::config::AppConfig;
use share_stats::constants::logging;
use share_stats::errors::{AppError, Result};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{} error: {}", e.category(), e);
        eprintln!("Error: {}", e);
        process::exit(exit_code(&e));
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli).await;

    info!("share_stats v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Stats(args) => {
            info!("Executing stats command");
            let summary = handle_stats(&cli.global, args).await?;
            if summary.has_failures() {
                info!("{} share(s) failed, see their status", summary.failed);
            }
            Ok(())
        }
        Commands::Config(args) => handle_config(&cli.global, args).await,
    }
}

/// Initialize logging from CLI verbosity, the settings file and `RUST_LOG`
///
/// CLI flags win over the settings file level. `RUST_LOG` directives are
/// added on top.
async fn init_logging(cli: &Cli) {
    let settings_logging = AppConfig::load(cli.global.settings.clone())
        .await
        .map(|settings| settings.logging)
        .unwrap_or_default();

    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| settings_logging.level.clone());

    let filter = match format!("share_stats={}", level).parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(e) => {
            eprintln!(
                "Invalid log level \"{}\" ({}), using {}",
                level,
                e,
                logging::DEFAULT_LOG_LEVEL
            );
            EnvFilter::from_default_env().add_directive(LevelFilter::WARN.into())
        }
    };

    let log_file = cli
        .global
        .logfile
        .clone()
        .or(settings_logging.log_file);

    let file = log_file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Arc::new(file)),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    match file {
        Some(file) => {
            // File lines carry no colour codes
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(file))
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    }
}

/// Configuration problems exit with 2, everything else with 1
fn exit_code(err: &AppError) -> i32 {
    match err {
        AppError::Config(_) => 2,
        _ => 1,
    }
}
