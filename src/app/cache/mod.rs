//! Shared stats cache and freshness gating
//!
//! Stats of every share are kept in memcached so that the federation service
//! can read them and so that shares are not polled more often than their
//! `storagestats.frequency`. The federation in turn publishes connection
//! health records that mark endpoints offline.
//!
//! # Key Features
//!
//! - **Pluggable backends**: [`MemcachedBackend`] speaks the memcached text
//!   protocol over tokio; [`MemoryBackend`] keeps everything in process
//! - **Typed payloads**: Delimited strings are decoded into [`CachedStats`]
//!   and [`ConnectionHealth`] at the boundary
//! - **Freshness gate**: [`StatsCache::apply_freshness`] skips offline
//!   endpoints and shares polled within their period
//! - **Best effort**: A missing or unreachable cache never aborts a run
//!
//! # Module Organization
//!
//! - [`config`] - Cache configuration and defaults
//! - [`backend`] - Backend trait and in-process backend
//! - [`memcached`] - Memcached client
//! - [`codec`] - Wire format of cached values
//! - [`freshness`] - Typed cache access and the freshness gate

pub mod backend;
pub mod codec;
pub mod config;
pub mod freshness;
pub mod memcached;

pub use backend::{CacheBackend, MemoryBackend};
pub use codec::{decode_connection_stats, CachedStats, ConnectionHealth};
pub use config::CacheConfig;
pub use freshness::StatsCache;
pub use memcached::MemcachedBackend;

use std::sync::Arc;

/// Cache for a configuration, or `None` when disabled
pub fn from_config(config: &CacheConfig) -> Option<StatsCache> {
    config.enabled.then(|| {
        StatsCache::new(
            Arc::new(MemcachedBackend::new(config)) as Arc<dyn CacheBackend>,
            config.clone(),
        )
    })
}
