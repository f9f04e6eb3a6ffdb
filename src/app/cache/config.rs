//! Cache configuration types and defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::cache;

/// Configuration for the shared stats cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether to consult and update the cache at all
    pub enabled: bool,
    /// Memcached host
    pub host: String,
    /// Memcached port
    pub port: u16,
    /// Timeout for one memcached round trip
    #[serde(with = "humantime_serde")]
    pub io_timeout: Duration,
    /// Stored stats live `frequency * ttl_multiplier` seconds
    pub ttl_multiplier: u64,
    /// Lower bound on stored stats lifetime
    #[serde(with = "humantime_serde")]
    pub ttl_minimum: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: cache::DEFAULT_HOST.to_string(),
            port: cache::DEFAULT_PORT,
            io_timeout: cache::DEFAULT_IO_TIMEOUT,
            ttl_multiplier: cache::DEFAULT_TTL_MULTIPLIER,
            ttl_minimum: cache::DEFAULT_TTL_MINIMUM,
        }
    }
}

impl CacheConfig {
    /// Set the memcached address
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the TTL policy
    pub fn with_ttl(mut self, multiplier: u64, minimum: Duration) -> Self {
        self.ttl_multiplier = multiplier;
        self.ttl_minimum = minimum;
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.address(), "127.0.0.1:11211");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CacheConfig = toml::from_str("port = 22122\nio_timeout = \"2s\"").unwrap();
        assert_eq!(config.port, 22122);
        assert_eq!(config.io_timeout, Duration::from_secs(2));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.ttl_minimum, Duration::from_secs(3600));
    }
}
