//! Prelude module for the share_stats library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use share_stats::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use share_stats::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let specs = ConfigLoader::new(LoaderConfig::default()).load(&[]).await?;
//!     let context = RunContext::default().with_cache(None);
//!
//!     let endpoints = share_stats::app::run(Arc::new(context), specs.values()).await?;
//!     print!("{}", to_plaintext(&collect(&endpoints)));
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components
pub use crate::app::{
    AdapterRegistry, CacheBackend, CacheConfig, ClientConfig, ConfigLoader, Diagnostic, Endpoint,
    LoaderConfig, MemcachedBackend, MemoryBackend, PollState, ProtocolAdapter, RunContext,
    RunSummary, Scheduler, SchedulerConfig, Share, ShareReport, ShareSpec, StatsCache,
};

// Report renderers
pub use crate::app::report::{collect, to_json, to_plaintext, to_stdout};

// Application settings
pub use crate::config::AppConfig;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
