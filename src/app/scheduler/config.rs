//! Configuration structures for the poll scheduler

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the poll scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on endpoints polled at once, unbounded when `None`
    pub max_concurrency: Option<usize>,
    /// Deadline for polling a single endpoint
    #[serde(with = "humantime_serde")]
    pub poll_deadline: Option<Duration>,
    /// Store every share's stats in the cache after aggregation
    pub store_results: bool,
}

impl SchedulerConfig {
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn with_poll_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.poll_deadline = deadline;
        self
    }

    pub fn with_store_results(mut self, store: bool) -> Self {
        self.store_results = store;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == Some(0) {
            return Err("Max concurrency cannot be zero".to_string());
        }
        if self.poll_deadline.is_some_and(|d| d.is_zero()) {
            return Err("Poll deadline cannot be zero".to_string());
        }
        Ok(())
    }
}
