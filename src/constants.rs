//! Application constants for share_stats
//!
//! This module centralizes the constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Share configuration file grammar and locations
pub mod config_files {
    /// Default directory holding share configuration files
    pub const DEFAULT_CONFIG_DIR: &str = "/etc/ugr/conf.d";

    /// Main federation configuration file, prepended when present
    pub const MAIN_CONFIG_FILE: &str = "/etc/ugr/ugr.conf";

    /// Extension of configuration files picked up from directories
    pub const CONFIG_EXTENSION: &str = "conf";

    /// Marker of a share declaration line
    pub const DECLARATION_MARKER: &str = "glb.locplugin[]";

    /// Prefix of a share setting line
    pub const SETTING_MARKER: &str = "locplugin.";

    /// Id used by settings that apply to every share
    pub const GLOBAL_ID: &str = "*";
}

/// Plugin identifiers understood by the adapter registry
pub mod plugins {
    /// WebDAV plugin
    pub const DAV: &str = "libugrlocplugin_dav.so";

    /// Plain HTTP plugin, served by the WebDAV adapter
    pub const HTTP: &str = "libugrlocplugin_http.so";

    /// S3 plugin
    pub const S3: &str = "libugrlocplugin_s3.so";

    /// Azure blob plugin
    pub const AZURE: &str = "libugrlocplugin_azure.so";
}

/// Quota handling
pub mod quota {
    /// Setting value meaning "ask the backend"
    pub const API: &str = "api";

    /// Quota applied when neither backend nor configuration provide one (1 TiB)
    pub const DEFAULT_QUOTA: i64 = 1024 * 1024 * 1024 * 1024;

    /// Sentinel for unknown numeric stats
    pub const UNKNOWN: i64 = -1;
}

/// Status code rendering
pub mod status {
    /// Status string of a share with no diagnostics
    pub const OK: &str = "[OK][OK][200]";

    /// Connection health status meaning the endpoint is offline
    pub const OFFLINE: &str = "2";
}

/// Shared cache keys and defaults
pub mod cache {
    use super::Duration;

    /// Prefix of per-share stats keys
    pub const STATS_PREFIX: &str = "Ugrstoragestats_";

    /// Key holding the current connection stats generation
    pub const HEALTH_INDEX_KEY: &str = "Ugrpluginstats_idx";

    /// Prefix of connection stats generation keys
    pub const HEALTH_PREFIX: &str = "Ugrpluginstats_";

    /// Field separator inside cached values
    pub const FIELD_SEPARATOR: &str = "%%";

    /// Entry separator inside connection stats values
    pub const ENTRY_SEPARATOR: &str = "&&";

    /// Default memcached host
    pub const DEFAULT_HOST: &str = "127.0.0.1";

    /// Default memcached port
    pub const DEFAULT_PORT: u16 = 11211;

    /// Cached stats live this many poll periods
    pub const DEFAULT_TTL_MULTIPLIER: u64 = 10;

    /// Lower bound of the cache TTL
    pub const DEFAULT_TTL_MINIMUM: Duration = Duration::from_secs(3600);

    /// Timeout for a single memcached round trip
    pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

    /// Longest key memcached accepts
    pub const MAX_KEY_LENGTH: usize = 250;
}

/// Default share setting values
pub mod defaults {
    /// Connection timeout in seconds
    pub const CONN_TIMEOUT_SECS: &str = "10";

    /// Poll frequency in seconds
    pub const FREQUENCY_SECS: &str = "600";

    /// Default S3 region
    pub const S3_REGION: &str = "us-east-1";

    /// Default S3 signature version
    pub const S3_SIGNATURE: &str = "s3v4";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "share-stats/0.1.0";

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 4;
}

/// Rate limiting
pub mod limits {
    /// Requests per second within one endpoint's paginated listing
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;
}

/// Application settings file locations
pub mod settings {
    /// File name looked up in the working directory
    pub const LOCAL_FILE: &str = "share-stats.toml";

    /// Directory name under the user config directory
    pub const APP_DIR: &str = "share-stats";

    /// File name inside the config directories
    pub const FILE_NAME: &str = "config.toml";

    /// System-wide settings file
    pub const SYSTEM_FILE: &str = "/etc/share-stats/config.toml";
}

/// Logging
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

pub use http::USER_AGENT;
pub use limits::DEFAULT_RATE_LIMIT_RPS;
pub use quota::{DEFAULT_QUOTA, UNKNOWN};
