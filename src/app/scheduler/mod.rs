//! Endpoint polling and result aggregation
//!
//! This module is the control plane of a run: it gates shares on freshness,
//! groups them into endpoints, polls one representative per endpoint in its
//! own task and spreads the results to the rest of the endpoint.
//!
//! # Key Features
//!
//! - **One task per endpoint**: Endpoints are moved into their worker and come
//!   back through the join handle, so no share is ever shared between tasks
//! - **Bounded concurrency**: An optional semaphore caps endpoints in flight
//! - **Deadlines**: An optional per-endpoint deadline turns a hung backend into
//!   a `ConnectionTimeout` failure
//! - **Isolation**: A panicking worker fails only its own endpoint
//! - **Progress**: Completed endpoints are reported over a channel
//!
//! # Module Organization
//!
//! - [`config`] - Scheduler configuration
//! - [`aggregate`] - Result propagation within an endpoint
//! - [`stats`] - Run outcome counts

pub mod aggregate;
pub mod config;
pub mod stats;

pub use aggregate::aggregate;
pub use config::SchedulerConfig;
pub use stats::RunSummary;

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::app::context::RunContext;
use crate::app::diagnostics::Diagnostic;
use crate::app::models::{group_by_url, Endpoint, PollState, Share};
use crate::errors::StatsError;

/// Notification sent when an endpoint finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDone {
    pub url: String,
    pub shares: usize,
    pub state: PollState,
}

/// Polls endpoints and aggregates their results
#[derive(Debug, Clone)]
pub struct Scheduler {
    context: Arc<RunContext>,
    progress: Option<mpsc::UnboundedSender<EndpointDone>>,
}

impl Scheduler {
    pub fn new(context: Arc<RunContext>) -> Self {
        Self {
            context,
            progress: None,
        }
    }

    /// Report finished endpoints on `sender`
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<EndpointDone>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Poll all shares and return them grouped by endpoint
    ///
    /// Endpoints come back in first-appearance order of their urls. Every
    /// share ends in a terminal poll state.
    pub async fn run(&self, mut shares: Vec<Share>) -> Vec<Endpoint> {
        if let Some(cache) = &self.context.cache {
            cache.apply_freshness(&mut shares).await;
        }

        let endpoints = group_by_url(shares);
        info!("Polling {} endpoint(s)", endpoints.len());

        let limiter = self
            .context
            .scheduler
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let (fallbacks, handles): (Vec<_>, Vec<_>) = endpoints
            .into_iter()
            .map(|endpoint| {
                let fallback = endpoint.clone();
                let context = self.context.clone();
                let limiter = limiter.clone();
                let progress = self.progress.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match &limiter {
                        Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
                        None => None,
                    };
                    let endpoint = poll_endpoint(&context, endpoint).await;
                    notify(progress.as_ref(), &endpoint);
                    endpoint
                });
                (fallback, handle)
            })
            .unzip();

        let joined = join_all(handles).await;
        let mut results = Vec::with_capacity(joined.len());
        for (fallback, outcome) in fallbacks.into_iter().zip(joined) {
            let endpoint = match outcome {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    error!("Worker for {} terminated: {}", fallback.url, e);
                    let endpoint = fail_endpoint(fallback, &StatsError::WorkerPanic {
                        debug: e.to_string(),
                    });
                    notify(self.progress.as_ref(), &endpoint);
                    endpoint
                }
            };
            results.push(endpoint);
        }

        results
    }
}

fn notify(progress: Option<&mpsc::UnboundedSender<EndpointDone>>, endpoint: &Endpoint) {
    if let Some(progress) = progress {
        let _ = progress.send(EndpointDone {
            url: endpoint.url.clone(),
            shares: endpoint.shares.len(),
            state: endpoint
                .representative()
                .map(|s| s.poll_state)
                .unwrap_or(PollState::Pending),
        });
    }
}

/// Poll one share, returning the diagnostics raised by the poll
///
/// Shares that are not `Ok` are skipped without contacting their backend.
pub async fn poll_share(context: &RunContext, share: &mut Share) -> Vec<Diagnostic> {
    if !share.check.is_ok() {
        debug!("[{}] Skipping, check state {}", share.id, share.check);
        let before = share.diagnostics.len();
        aggregate::skip(share);
        return share.diagnostics[before..].to_vec();
    }

    let Some(adapter) = share.protocol.and_then(|kind| context.registry.get(kind)) else {
        let err = StatsError::UnsupportedPlugin {
            plugin: share.plugin.clone(),
        };
        return fail_share(share, &err);
    };

    share.poll_state = PollState::Polling;
    debug!("[{}] Polling {} endpoint {}", share.id, share.protocol_name(), share.uri.url);

    let collect = adapter.collect_stats(share, &context.client);
    let result = match context.scheduler.poll_deadline {
        Some(deadline) => tokio::time::timeout(deadline, collect)
            .await
            .unwrap_or_else(|_| {
                Err(StatsError::Timeout {
                    seconds: deadline.as_secs(),
                })
            }),
        None => collect.await,
    };

    match result {
        Ok(collected) => {
            share.stats = collected.record;
            let diagnostics: Vec<Diagnostic> = collected.warnings.iter().map(Diagnostic::from).collect();
            share.poll_state = if diagnostics.is_empty() {
                PollState::Succeeded
            } else {
                PollState::SucceededWithWarning
            };
            for diagnostic in &diagnostics {
                share.push_diagnostic(diagnostic.clone());
            }
            diagnostics
        }
        Err(e) => fail_share(share, &e),
    }
}

fn fail_share(share: &mut Share, err: &StatsError) -> Vec<Diagnostic> {
    let diagnostic = Diagnostic::from(err);
    share.push_diagnostic(diagnostic.clone());
    share.poll_state = PollState::Failed;
    vec![diagnostic]
}

fn fail_endpoint(mut endpoint: Endpoint, err: &StatsError) -> Endpoint {
    for share in &mut endpoint.shares {
        fail_share(share, err);
    }
    endpoint
}

/// Poll an endpoint's representative, aggregate and store the results
async fn poll_endpoint(context: &RunContext, mut endpoint: Endpoint) -> Endpoint {
    let Some(representative) = endpoint.representative_mut() else {
        return endpoint;
    };

    poll_share(context, representative).await;
    if !representative.poll_state.was_polled() && endpoint.shares.len() > 1 {
        debug!(
            "[{}] Not polled, sharing its last known stats with {} other share(s)",
            endpoint.shares[0].id,
            endpoint.shares.len() - 1
        );
    }
    aggregate(&mut endpoint);

    if context.scheduler.store_results {
        if let Some(cache) = &context.cache {
            for share in &mut endpoint.shares {
                if let Err(e) = cache.store_stats(share).await {
                    warn!("[{}] Could not store stats: {}", share.id, e);
                    share.push_diagnostic(
                        Diagnostic::error(
                            "MemcachedConnectionError",
                            "080",
                            "Failed to connect to memcached.",
                        )
                        .with_debug(e.to_string()),
                    );
                }
            }
        }
    }

    endpoint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adapters::{AdapterRegistry, ClientConfig, Collected, ProtocolAdapter};
    use crate::app::models::{CheckState, ProtocolKind, ShareSpec, StatsRecord};
    use crate::app::validation::Schema;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct CountingAdapter {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ProtocolAdapter for CountingAdapter {
        fn kind(&self) -> ProtocolKind {
            ProtocolKind::S3
        }

        fn schema(&self) -> Schema {
            Schema::common("generic", &["generic"])
        }

        async fn collect_stats(&self, share: &Share, _client: &ClientConfig) -> crate::errors::StatsResult<Collected> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(Collected {
                record: StatsRecord {
                    bytes_used: 10,
                    bytes_free: 90,
                    quota: 100,
                    file_count: 1,
                    ..StatsRecord::new(share.stats.start_time)
                },
                warnings: Vec::new(),
            })
        }
    }

    fn context(adapter: Arc<CountingAdapter>, scheduler: SchedulerConfig) -> Arc<RunContext> {
        let registry = AdapterRegistry::empty().register(adapter);
        Arc::new(RunContext::new(registry, ClientConfig::default()).with_scheduler(scheduler))
    }

    fn share(id: &str, url: &str) -> Share {
        let mut share = Share::from_spec(&ShareSpec::new(id, url, "libugrlocplugin_s3.so"), 0);
        share.protocol = Some(ProtocolKind::S3);
        share
    }

    #[tokio::test]
    async fn test_one_poll_per_endpoint() {
        let adapter = Arc::new(CountingAdapter::default());
        let scheduler = Scheduler::new(context(adapter.clone(), SchedulerConfig::default()));

        let endpoints = scheduler
            .run(vec![
                share("a", "https://one.example.org/"),
                share("b", "https://two.example.org/"),
                share("c", "https://one.example.org/"),
            ])
            .await;

        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].shares[1].id, "c");
        assert_eq!(endpoints[0].shares[1].stats.bytes_used, 10);
        assert!(endpoints
            .iter()
            .flat_map(|e| &e.shares)
            .all(|s| s.poll_state == PollState::Succeeded));
    }

    #[tokio::test]
    async fn test_invalid_share_is_never_polled() {
        let adapter = Arc::new(CountingAdapter::default());
        let scheduler = Scheduler::new(context(adapter.clone(), SchedulerConfig::default()));

        let mut invalid = share("a", "https://one.example.org/");
        invalid.check = CheckState::MissingRequiredSetting;
        let endpoints = scheduler.run(vec![invalid]).await;

        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            endpoints[0].shares[0].poll_state,
            PollState::Skipped(CheckState::MissingRequiredSetting)
        );
    }

    #[tokio::test]
    async fn test_deadline_fails_slow_endpoint() {
        let adapter = Arc::new(CountingAdapter {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_secs(5)),
        });
        let config = SchedulerConfig::default().with_poll_deadline(Some(Duration::from_millis(50)));
        let scheduler = Scheduler::new(context(adapter, config));

        let endpoints = scheduler.run(vec![share("a", "https://one.example.org/")]).await;
        let share = &endpoints[0].shares[0];
        assert_eq!(share.poll_state, PollState::Failed);
        assert_eq!(share.status(), "[ERROR][ConnectionTimeout][400]");
    }

    #[tokio::test]
    async fn test_progress_reports_each_endpoint() {
        let adapter = Arc::new(CountingAdapter::default());
        let config = SchedulerConfig::default().with_max_concurrency(Some(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(context(adapter, config)).with_progress(tx);

        scheduler
            .run(vec![
                share("a", "https://one.example.org/"),
                share("b", "https://two.example.org/"),
            ])
            .await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.url, "https://one.example.org/");
        assert_eq!(first.state, PollState::Succeeded);
        assert!(rx.recv().await.is_some());
    }
}
