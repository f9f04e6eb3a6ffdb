//! Stats cache and the freshness gate applied before polling

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::cache::backend::CacheBackend;
use crate::app::cache::codec::{decode_connection_stats, CachedStats, ConnectionHealth};
use crate::app::cache::config::CacheConfig;
use crate::app::models::{now_unix, CheckState, Share};
use crate::constants::cache::{HEALTH_INDEX_KEY, HEALTH_PREFIX, STATS_PREFIX};
use crate::errors::CacheResult;

/// Typed access to stats and connection health in the shared cache
#[derive(Debug, Clone)]
pub struct StatsCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl StatsCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats_key(share_id: &str) -> String {
        format!("{}{}", STATS_PREFIX, share_id)
    }

    /// Last stored stats of a share
    pub async fn load_stats(&self, share_id: &str) -> CacheResult<Option<CachedStats>> {
        let key = Self::stats_key(share_id);
        match self.backend.get(&key).await? {
            Some(raw) => CachedStats::decode(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Connection health of every share in the current generation
    pub async fn load_health(&self) -> CacheResult<HashMap<String, ConnectionHealth>> {
        let Some(generation) = self.backend.get(HEALTH_INDEX_KEY).await? else {
            debug!("No connection stats index in cache");
            return Ok(HashMap::new());
        };

        let key = format!("{}{}", HEALTH_PREFIX, generation.trim());
        debug!("Using connection stats index: {}", key);
        Ok(self
            .backend
            .get(&key)
            .await?
            .map(|raw| decode_connection_stats(&raw))
            .unwrap_or_default())
    }

    /// Connection health of a single share
    pub async fn load_share_health(&self, share_id: &str) -> CacheResult<Option<ConnectionHealth>> {
        Ok(self.load_health().await?.remove(share_id))
    }

    /// Whether a share's last poll is at least `frequency` seconds old
    pub async fn is_due(&self, share_id: &str, frequency: u64) -> CacheResult<bool> {
        Ok(match self.load_stats(share_id).await? {
            Some(cached) => Self::is_due_at(cached.timestamp, frequency, now_unix()),
            None => true,
        })
    }

    pub fn is_due_at(last_poll: i64, frequency: u64, now: i64) -> bool {
        now.saturating_sub(last_poll) >= frequency as i64
    }

    /// Lifetime of stored stats for a poll frequency
    pub fn ttl_for(&self, frequency: u64) -> Duration {
        Duration::from_secs(frequency.saturating_mul(self.config.ttl_multiplier)).max(self.config.ttl_minimum)
    }

    /// Store a share's stats with an explicit lifetime
    pub async fn store(&self, share: &Share, ttl: Duration) -> CacheResult<()> {
        let stats = CachedStats::from_share(share);
        self.backend
            .set(&Self::stats_key(&share.id), &stats.encode(), ttl)
            .await
    }

    /// Store a share's stats with the lifetime derived from its frequency
    pub async fn store_stats(&self, share: &Share) -> CacheResult<()> {
        self.store(share, self.ttl_for(share.frequency())).await
    }

    /// Gate shares on connection health and poll frequency
    ///
    /// Only shares still `Ok` are considered. Offline endpoints are marked
    /// `Offline`; shares polled less than `frequency` seconds ago are marked
    /// `PeriodNotReached` and take their last cached numbers. Cache failures
    /// are logged and leave the share due.
    pub async fn apply_freshness(&self, shares: &mut [Share]) {
        let health = match self.load_health().await {
            Ok(health) => health,
            Err(e) => {
                warn!("Could not read connection stats, assuming all endpoints online: {}", e);
                HashMap::new()
            }
        };

        let now = now_unix();
        for share in shares.iter_mut().filter(|s| s.check.is_ok()) {
            match health.get(&share.id) {
                Some(h) if h.is_offline() => {
                    info!("[{}] Endpoint flagged offline by the federation", share.id);
                    share.check = CheckState::Offline;
                    continue;
                }
                Some(_) => {}
                None => warn!("[{}] No connection stats found, assuming online", share.id),
            }

            let cached = match self.load_stats(&share.id).await {
                Ok(cached) => cached,
                Err(e) => {
                    warn!("[{}] Could not read cached stats: {}", share.id, e);
                    None
                }
            };

            match cached {
                Some(cached) if !Self::is_due_at(cached.timestamp, share.frequency(), now) => {
                    info!(
                        "[{}] Checked {}s ago, within the {}s period, skipping",
                        share.id,
                        now - cached.timestamp,
                        share.frequency()
                    );
                    share.check = CheckState::PeriodNotReached;
                    share.stats.bytes_used = cached.bytes_used;
                    share.stats.bytes_free = cached.bytes_free;
                    share.stats.quota = cached.quota;
                    share.stats.start_time = cached.timestamp;
                }
                Some(_) => debug!("[{}] Poll period reached", share.id),
                None => debug!("[{}] No cached stats, will be polled", share.id),
            }
        }
    }
}
