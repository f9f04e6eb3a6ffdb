//! Command handlers for the share_stats CLI
//!
//! This module implements the command handlers that turn CLI arguments and
//! application settings into a run of the core library.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::app::{
    cache, models, report, AdapterRegistry, ConfigLoader, RunContext, RunSummary, Scheduler,
    ShareReport,
};
use crate::cli::{ConfigAction, ConfigArgs, GlobalArgs, ProgressDisplay, StatsArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the stats command
///
/// Loads the share configuration, polls every selected share once and
/// writes the requested reports. Per-share failures are part of the reports;
/// only configuration problems and report I/O return an error.
pub async fn handle_stats(global: &GlobalArgs, args: StatsArgs) -> Result<RunSummary> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let settings = AppConfig::load(global.settings.clone()).await?;
    let (mut cache_config, client_config, mut scheduler_config, loader_config) =
        settings.to_runtime_config();

    if let Some(host) = &args.memhost {
        cache_config.host = host.clone();
    }
    if let Some(port) = args.memport {
        cache_config.port = port;
    }
    if args.no_cache {
        cache_config.enabled = false;
    }
    if args.max_concurrency.is_some() {
        scheduler_config.max_concurrency = args.max_concurrency;
    }
    if args.deadline.is_some() {
        scheduler_config.poll_deadline = args.poll_deadline();
    }
    scheduler_config.store_results = args.to_memcached;

    if !args.has_output() {
        warn!("No output selected; use --stdout, --json, --plain or --memcached");
    }

    let loader = ConfigLoader::new(loader_config.with_id_filter(args.endpoints.iter().cloned()));
    let specs = loader.load(&args.config_paths).await?;

    let registry = AdapterRegistry::default();
    let shares = registry.build_shares(specs.values(), models::now_unix())?;
    let endpoint_count = shares
        .iter()
        .map(|share| share.uri.url.as_str())
        .collect::<HashSet<_>>()
        .len();
    info!(
        "Checking {} share(s) on {} endpoint(s)",
        shares.len(),
        endpoint_count
    );

    let context = RunContext::new(registry, client_config)
        .with_cache(cache::from_config(&cache_config))
        .with_scheduler(scheduler_config);

    let (display, sender) = ProgressDisplay::start(endpoint_count, !global.quiet);
    let endpoints = Scheduler::new(Arc::new(context))
        .with_progress(sender)
        .run(shares)
        .await;
    let tally = display.finish().await;
    debug!(
        "Progress saw {} endpoint(s), {} failed",
        tally.endpoints, tally.failed_endpoints
    );

    let reports = report::collect(&endpoints);
    write_reports(&args, &reports).await?;

    let summary = RunSummary::from_endpoints(&endpoints, start_time.elapsed());
    info!(
        "Polled {} share(s) in {:?}: {} ok, {} with warnings, {} failed, {} skipped",
        summary.shares,
        summary.duration,
        summary.succeeded,
        summary.warned,
        summary.failed,
        summary.skipped
    );
    Ok(summary)
}

/// Write every report destination requested on the command line
async fn write_reports(args: &StatsArgs, reports: &[ShareReport]) -> Result<()> {
    if args.stdout {
        print!("{}", report::to_stdout(reports, args.debug));
    }

    if let Some(file) = &args.json {
        let hostname = local_hostname().await;
        let content = report::to_json(reports, &hostname, models::now_unix())?;
        write_file(&args.output_path(file), &content).await?;
    }

    if let Some(file) = &args.plaintext {
        write_file(&args.output_path(file), &report::to_plaintext(reports)).await?;
    }

    Ok(())
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content).await.map_err(|e| {
        AppError::generic(format!("Failed to write report {}: {}", path.display(), e))
    })?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Name used for the storage service in JSON reports
async fn local_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    match tokio::fs::read_to_string("/etc/hostname").await {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => "localhost".to_string(),
    }
}

/// Handle settings management commands
pub async fn handle_config(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let settings = AppConfig::load(global.settings.clone()).await?;
            let content = toml::to_string_pretty(&settings).map_err(|e| {
                AppError::generic(format!("Failed to serialize settings: {}", e))
            })?;
            print!("{}", content);
        }
        ConfigAction::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => AppConfig::get_default_config_path()?,
            };
            if path.exists() && !force {
                return Err(AppError::generic(format!(
                    "Settings file {} already exists; use --force to overwrite it",
                    path.display()
                )));
            }
            AppConfig::write_default(&path).await?;
            println!("Created settings file: {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", AppConfig::get_default_config_path()?.display());
        }
    }
    Ok(())
}
