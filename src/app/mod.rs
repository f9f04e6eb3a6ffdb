//! Core application logic for share_stats
//!
//! A run flows through these modules in order: the [`loader`] reads share
//! declarations, [`validation`] (through the adapter registry) types their
//! settings, the [`cache`] gates them on freshness, the [`scheduler`] polls
//! them with the protocol [`adapters`] and the [`report`] renderers present
//! the results.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use share_stats::app::{self, ConfigLoader, LoaderConfig, RunContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ConfigLoader::new(LoaderConfig::default());
//! let specs = loader.load(&[]).await?;
//!
//! let endpoints = app::run(Arc::new(RunContext::default()), specs.values()).await?;
//! for report in app::report::collect(&endpoints) {
//!     println!("{} {} {}", report.id, report.bytes_used, report.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cache;
pub mod context;
pub mod diagnostics;
pub mod loader;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod validation;

use std::sync::Arc;

use tracing::info;

// Re-export main public API
pub use adapters::{AdapterRegistry, ClientConfig, Collected, ProtocolAdapter};
pub use cache::{CacheBackend, CacheConfig, MemcachedBackend, MemoryBackend, StatsCache};
pub use context::RunContext;
pub use diagnostics::{Diagnostic, Severity};
pub use loader::{ConfigLoader, LoaderConfig};
pub use models::{
    CheckState, Endpoint, PollState, ProtocolKind, Share, ShareSpec, ShareUri, StatsRecord,
};
pub use report::ShareReport;
pub use scheduler::{RunSummary, Scheduler, SchedulerConfig};

use crate::errors::ConfigResult;

/// Validate declarations and poll them once
///
/// # Errors
///
/// Only a malformed quota literal fails; every other problem is recorded on
/// the affected share.
pub async fn run<'a, I>(context: Arc<RunContext>, specs: I) -> ConfigResult<Vec<Endpoint>>
where
    I: IntoIterator<Item = &'a ShareSpec>,
{
    let shares = context
        .registry
        .build_shares(specs, models::now_unix())?;
    info!("Validated {} share(s)", shares.len());
    Ok(Scheduler::new(context).run(shares).await)
}
