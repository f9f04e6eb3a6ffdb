//! Everything a run needs, passed explicitly

use crate::app::adapters::{AdapterRegistry, ClientConfig};
use crate::app::cache::StatsCache;
use crate::app::scheduler::SchedulerConfig;

/// Shared, read-only state of one run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub registry: AdapterRegistry,
    pub client: ClientConfig,
    /// Stats cache, `None` when caching is disabled
    pub cache: Option<StatsCache>,
    pub scheduler: SchedulerConfig,
}

impl RunContext {
    pub fn new(registry: AdapterRegistry, client: ClientConfig) -> Self {
        Self {
            registry,
            client,
            cache: None,
            scheduler: SchedulerConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: Option<StatsCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}
