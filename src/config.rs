//! Application settings for share_stats
//!
//! These settings control how the poller itself behaves (memcached address,
//! HTTP client tuning, concurrency, where share configuration lives). They are
//! distinct from the share configuration files read by the
//! [`loader`](crate::app::loader). Settings come from a TOML file with
//! zero-config defaults for everything that is absent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{CacheConfig, ClientConfig, LoaderConfig, SchedulerConfig};
use crate::constants::{cache, config_files, http, limits, logging, settings};
use crate::errors::{AppError, ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Memcached stats cache settings
    pub cache: CacheConfig,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Poll scheduler settings
    pub scheduler: SchedulerConfig,
    /// Share configuration locations
    pub loader: LoaderConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// User agent sent with every request
    pub user_agent: String,
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit within one endpoint poll (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            user_agent: http::USER_AGENT.to_string(),
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// TOML-friendly loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfigToml {
    /// Main federation config; an empty path disables it
    pub main_config_file: PathBuf,
    /// Files or directories searched when none are given on the command line
    pub config_paths: Vec<PathBuf>,
}

impl Default for LoaderConfigToml {
    fn default() -> Self {
        Self {
            main_config_file: PathBuf::from(config_files::MAIN_CONFIG_FILE),
            config_paths: vec![PathBuf::from(config_files::DEFAULT_CONFIG_DIR)],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when neither CLI flags nor `RUST_LOG` set one
    pub level: String,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (CacheConfig, ClientConfig, SchedulerConfig, LoaderConfig) {
        (
            self.cache.clone(),
            self.client.to_runtime_config(),
            self.scheduler.clone(),
            self.loader.to_runtime_config(),
        )
    }

    /// Reject settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate().map_err(|reason| {
            ConfigError::InvalidValue {
                field: "scheduler".to_string(),
                value: format!("{:?}", self.scheduler),
                reason,
            }
        })?;

        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be at least one request per second".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Load settings with precedence:
    /// 1. Default values
    /// 2. Settings file (explicit, or the first found in standard locations)
    ///
    /// Command line flags are applied on top by the caller.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => {
                debug!("Loading settings from: {}", path.display());
                Self::load_from_file(&path).await?
            }
            None => {
                debug!("No settings file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Write a default settings file for the current user if none exists
    ///
    /// Returns the path of the (possibly pre-existing) file.
    pub async fn initialize_first_run() -> Result<PathBuf> {
        let config_path = Self::get_default_config_path()?;
        if config_path.exists() {
            return Ok(config_path);
        }

        info!("Creating default settings file...");
        Self::write_default(&config_path).await?;
        Ok(config_path)
    }

    /// Write the commented default settings to `path`
    pub async fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create settings directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write settings file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!("Wrote default settings to {}", path.display());
        Ok(())
    }

    /// First settings file found in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(settings::LOCAL_FILE)];
        if let Ok(user_path) = Self::get_default_config_path() {
            search_paths.push(user_path);
        }
        #[cfg(unix)]
        search_paths.push(PathBuf::from(settings::SYSTEM_FILE));

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found settings file: {}", path.display()),
            None => debug!("No settings file found in standard locations"),
        }
        found
    }

    /// Default settings file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir.join(settings::APP_DIR).join(settings::FILE_NAME))
    }

    /// Load settings from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;

        info!("Loaded settings from: {}", path.display());
        Ok(config)
    }

    /// Default settings with comments, as written by `config init`
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# share_stats settings
# Every value below is the built-in default; remove any line to keep it.

[cache]
# Memcached instance shared with the federation frontend
enabled = true
host = "{host}"
port = {port}
io_timeout = "{io_timeout}s"

# Stored stats live frequency * ttl_multiplier, but never less than ttl_minimum
ttl_multiplier = {ttl_multiplier}
ttl_minimum = "{ttl_minimum}s"

[client]
user_agent = "{user_agent}"
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = {pool_idle}
pool_max_per_host = {pool_max}
connect_timeout_secs = {connect_timeout}
rate_limit_rps = {rate_limit}

[scheduler]
# Endpoints polled at once (unbounded when absent)
# max_concurrency = 16
# Deadline for polling one endpoint
# poll_deadline = "2m"
store_results = false

[loader]
# Set to "" to ignore the main config file
main_config_file = "{main_config}"
config_paths = ["{config_dir}"]

[logging]
level = "{level}"  # error, warn, info, debug, trace
# log_file = "/var/log/share-stats.log"
"#,
            host = cache::DEFAULT_HOST,
            port = cache::DEFAULT_PORT,
            io_timeout = cache::DEFAULT_IO_TIMEOUT.as_secs(),
            ttl_multiplier = cache::DEFAULT_TTL_MULTIPLIER,
            ttl_minimum = cache::DEFAULT_TTL_MINIMUM.as_secs(),
            user_agent = http::USER_AGENT,
            pool_idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool_max = http::POOL_MAX_PER_HOST,
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            rate_limit = limits::DEFAULT_RATE_LIMIT_RPS,
            main_config = config_files::MAIN_CONFIG_FILE,
            config_dir = config_files::DEFAULT_CONFIG_DIR,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
            user_agent: self.user_agent.clone(),
        }
    }
}

impl LoaderConfigToml {
    /// Convert to runtime LoaderConfig
    pub fn to_runtime_config(&self) -> LoaderConfig {
        let main_config_file = if self.main_config_file.as_os_str().is_empty() {
            None
        } else {
            Some(self.main_config_file.clone())
        };

        LoaderConfig::default()
            .with_main_config_file(main_config_file)
            .with_config_paths(self.config_paths.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        let config = AppConfig::default();

        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.logging.level, "warn");
        assert!(config.cache.enabled);
        assert!(config.scheduler.max_concurrency.is_none());
    }

    /// Test that the generated default settings parse back to the defaults
    ///
    /// Purpose: `config init` must never write a file that `load` rejects.
    /// Benefit: Catches drift between the template and the structs.
    #[test]
    fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content();
        let parsed: AppConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.cache, CacheConfig::default());
        assert_eq!(parsed.client.connect_timeout_secs, http::CONNECT_TIMEOUT.as_secs());
        assert_eq!(parsed.scheduler, SchedulerConfig::default());
        assert_eq!(
            parsed.loader.main_config_file,
            PathBuf::from(config_files::MAIN_CONFIG_FILE)
        );
        assert!(content.contains("[cache]"));
        assert!(content.contains("[loader]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_config_loading_from_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let test_config = r#"
[cache]
host = "memcache.internal"
ttl_minimum = "30m"

[scheduler]
max_concurrency = 4
poll_deadline = "90s"

[loader]
main_config_file = ""
config_paths = ["/srv/ugr/conf.d"]

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load(Some(config_path)).await.unwrap();
        assert_eq!(config.logging.level, "debug");

        let (cache, client, scheduler, loader) = config.to_runtime_config();
        assert_eq!(cache.address(), "memcache.internal:11211");
        assert_eq!(cache.ttl_minimum, Duration::from_secs(1800));
        assert_eq!(client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(scheduler.max_concurrency, Some(4));
        assert_eq!(scheduler.poll_deadline, Some(Duration::from_secs(90)));
        assert!(loader.main_config_file.is_none());
        assert_eq!(loader.config_paths, vec![PathBuf::from("/srv/ugr/conf.d")]);
    }

    #[tokio::test]
    async fn test_invalid_settings_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        tokio::fs::write(&config_path, "[scheduler]\nmax_concurrency = 0\n")
            .await
            .unwrap();
        assert!(AppConfig::load(Some(config_path.clone())).await.is_err());

        tokio::fs::write(&config_path, "[cache\n").await.unwrap();
        assert!(matches!(
            AppConfig::load(Some(config_path)).await,
            Err(AppError::Config(ConfigError::InvalidFormat(_)))
        ));
    }

    #[tokio::test]
    async fn test_write_default_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        AppConfig::write_default(&path).await.unwrap();
        let config = AppConfig::load(Some(path)).await.unwrap();
        assert_eq!(config.cache.port, cache::DEFAULT_PORT);
    }
}
