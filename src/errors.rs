//! Error types for share_stats
//!
//! This module defines the error types for every component of the application.
//! Configuration errors are fatal and abort a run. Poll errors and warnings are
//! per-share: they are converted into [`Diagnostic`](crate::app::Diagnostic)
//! values and attached to the share, so one failing backend never stops the
//! others from being reported.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// None of the given paths yielded a readable configuration file
    #[error("No configuration files found in the path(s): {paths:?}")]
    NoConfigFilesFound { paths: Vec<PathBuf> },

    /// Configuration files were read but declared no shares
    #[error("No endpoints found in configuration file(s): {files:?}")]
    NoEndpointsFound { files: Vec<PathBuf> },

    /// A setting line references a share other than the one currently being declared
    #[error(
        "Failed to match ID in file: \"{}\" @ line: [{line_number}] \"{line}\". Check your configuration.",
        file.display()
    )]
    SettingIdMismatch {
        file: PathBuf,
        line_number: usize,
        line: String,
    },

    /// A quota literal could not be converted to bytes
    #[error("[{share_id}] Malformed quota \"{value}\". Use an integer with an optional unit suffix such as \"1TB\" or \"500GiB\"")]
    MalformedQuota { share_id: String, value: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// I/O error reading a configuration file
    #[error("Failed to read configuration file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid application settings format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid application settings value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Per-setting validation problems, reported as share diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingError {
    /// Required setting absent from the share configuration
    #[error("\"{setting}\" is required. Check your configuration.")]
    MissingRequired { setting: String },

    /// Optional setting absent; the default is used
    #[error("Unspecified \"{setting}\" setting. Using default value \"{default}\"")]
    Missing { setting: String, default: String },

    /// Value outside the allowed set
    #[error("Incorrect value \"{value}\" given in setting \"{setting}\". Valid settings: {valid:?}")]
    NotInValidSet {
        setting: String,
        value: String,
        valid: Vec<String>,
    },

    /// Value is not an integer where one is expected
    #[error("Setting \"{setting}\" expects an integer, got \"{value}\"")]
    NotAnInteger { setting: String, value: String },
}

impl SettingError {
    /// Error name used in status codes
    pub fn error_name(&self) -> &'static str {
        match self {
            SettingError::MissingRequired { .. } => "MissingRequiredSetting",
            SettingError::Missing { .. } => "MissingSetting",
            SettingError::NotInValidSet { .. } | SettingError::NotAnInteger { .. } => {
                "InvalidSetting"
            }
        }
    }

    /// Whether the problem leaves the share usable
    pub fn is_warning(&self) -> bool {
        matches!(self, SettingError::Missing { .. })
    }
}

/// Errors raised while polling a single share
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// Transport failure or HTTP error status
    #[error("Failed to establish a connection.")]
    Connection {
        error: String,
        status_code: String,
        debug: String,
    },

    /// URL scheme the HTTP client cannot speak
    #[error("Invalid schema \"{schema}\".")]
    InvalidSchema { schema: String, debug: String },

    /// S3 API replied with an error or unusable content
    #[error("Error requesting stats using API \"{api}\".")]
    S3Api {
        error: String,
        status_code: String,
        api: String,
        debug: String,
    },

    /// Ceph admin reply lacked the bucket usage section
    #[error("Failed to get bucket usage information.")]
    MissingBucketUsage {
        error: String,
        status_code: String,
        debug: String,
    },

    /// Client certificate or key unreadable
    #[error("Invalid client certificate path \"{certfile}\".")]
    DavCertPath { certfile: String, debug: String },

    /// Server does not implement the RFC 4331 quota properties
    #[error("WebDAV quota method not supported by the server.")]
    DavQuotaMethod { debug: String },

    /// Azure container does not exist
    #[error("Container tried: {container}")]
    ContainerNotFound { container: String, debug: String },

    /// Azure API replied with an error
    #[error("Error requesting stats using API \"{api}\".")]
    AzureApi {
        error: String,
        status_code: String,
        api: String,
        debug: String,
    },

    /// Connection health records flag the endpoint as offline
    #[error("Endpoint has been flagged offline by the federation.")]
    EndpointOffline,

    /// Plugin has no adapter
    #[error("StorageStats method for \"{plugin}\" not implemented yet.")]
    UnsupportedPlugin { plugin: String },

    /// Poll exceeded the scheduler deadline
    #[error("Poll timed out after {seconds} seconds.")]
    Timeout { seconds: u64 },

    /// Worker task terminated unexpectedly
    #[error("Worker terminated unexpectedly while polling.")]
    WorkerPanic { debug: String },
}

impl StatsError {
    /// Build a connection error from a status code and detail
    pub fn connection(
        error: impl Into<String>,
        status_code: impl Into<String>,
        debug: impl Into<String>,
    ) -> Self {
        StatsError::Connection {
            error: error.into(),
            status_code: status_code.into(),
            debug: debug.into(),
        }
    }

    /// Error name used in status codes
    pub fn error_name(&self) -> String {
        match self {
            StatsError::Connection { error, .. }
            | StatsError::S3Api { error, .. }
            | StatsError::MissingBucketUsage { error, .. }
            | StatsError::AzureApi { error, .. } => error.clone(),
            StatsError::InvalidSchema { .. } => "InvalidSchema".to_string(),
            StatsError::DavCertPath { .. } => "ClientCertError".to_string(),
            StatsError::DavQuotaMethod { .. } => "UnsupportedMethod".to_string(),
            StatsError::ContainerNotFound { .. } => "ContainerNotFound".to_string(),
            StatsError::EndpointOffline => "EndpointOffline".to_string(),
            StatsError::UnsupportedPlugin { .. } => "UnsupportedPlugin".to_string(),
            StatsError::Timeout { .. } => "ConnectionTimeout".to_string(),
            StatsError::WorkerPanic { .. } => "WorkerPanic".to_string(),
        }
    }

    /// Three-digit status code
    pub fn status_code(&self) -> String {
        match self {
            StatsError::Connection { status_code, .. }
            | StatsError::S3Api { status_code, .. }
            | StatsError::MissingBucketUsage { status_code, .. }
            | StatsError::AzureApi { status_code, .. } => status_code.clone(),
            StatsError::InvalidSchema { .. } => "000".to_string(),
            StatsError::UnsupportedPlugin { .. } => "001".to_string(),
            StatsError::DavCertPath { .. } => "003".to_string(),
            StatsError::WorkerPanic { .. } => "090".to_string(),
            StatsError::DavQuotaMethod { .. } => "096".to_string(),
            StatsError::ContainerNotFound { .. } => "404".to_string(),
            StatsError::EndpointOffline | StatsError::Timeout { .. } => "400".to_string(),
        }
    }

    /// Extra detail for debug output
    pub fn debug_detail(&self) -> Option<&str> {
        match self {
            StatsError::Connection { debug, .. }
            | StatsError::InvalidSchema { debug, .. }
            | StatsError::S3Api { debug, .. }
            | StatsError::MissingBucketUsage { debug, .. }
            | StatsError::DavCertPath { debug, .. }
            | StatsError::DavQuotaMethod { debug }
            | StatsError::ContainerNotFound { debug, .. }
            | StatsError::AzureApi { debug, .. }
            | StatsError::WorkerPanic { debug } => Some(debug.as_str()),
            StatsError::EndpointOffline
            | StatsError::UnsupportedPlugin { .. }
            | StatsError::Timeout { .. } => None,
        }
    }
}

/// Non-fatal conditions raised while polling a share
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsWarning {
    /// Neither backend nor configuration supplied a quota
    #[error("No quota obtained from API or configuration file. Using default of {default_quota} bytes")]
    NoQuotaGiven { default_quota: i64 },

    /// Ceph reports the bucket quota as disabled
    #[error("Bucket quota is disabled. Using default of {default_quota} bytes")]
    BucketQuotaDisabled { default_quota: i64 },

    /// RFC 4331 server reports no available bytes, which usually means no quota is set
    #[error("RFC 4331 server reports \"quota-available-bytes\" as 0. Using default quota of {default_quota} bytes")]
    ZeroAvailableBytes { default_quota: i64 },
}

impl StatsWarning {
    /// Warning name used in status codes
    pub fn error_name(&self) -> &'static str {
        match self {
            StatsWarning::NoQuotaGiven { .. } => "NoQuotaGiven",
            StatsWarning::BucketQuotaDisabled { .. } => "BucketQuotaDisabled",
            StatsWarning::ZeroAvailableBytes { .. } => "ZeroAvailableBytes",
        }
    }

    /// Three-digit status code
    pub fn status_code(&self) -> &'static str {
        match self {
            StatsWarning::NoQuotaGiven { .. } | StatsWarning::ZeroAvailableBytes { .. } => "098",
            StatsWarning::BucketQuotaDisabled { .. } => "099",
        }
    }
}

/// Shared cache (memcached) errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Could not reach the cache server
    #[error("Failed to connect to memcached at {address}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Cache operation did not finish in time
    #[error("Cache operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Server reply did not follow the protocol
    #[error("Unexpected memcached reply: {reply}")]
    Protocol { reply: String },

    /// Key cannot be sent over the text protocol
    #[error("Invalid cache key: {key}")]
    InvalidKey { key: String },

    /// Stored value could not be decoded
    #[error("Malformed cache entry under {key}: {reason}")]
    Decode { key: String, reason: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Poll error
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Report serialization error
    #[error("Failed to serialize report")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Cache(CacheError::Connection { .. })
            | AppError::Cache(CacheError::Timeout { .. })
            | AppError::Stats(StatsError::Connection { .. })
            | AppError::Stats(StatsError::Timeout { .. })
            | AppError::Stats(StatsError::EndpointOffline) => true,

            AppError::Config(_)
            | AppError::Stats(StatsError::UnsupportedPlugin { .. })
            | AppError::Stats(StatsError::InvalidSchema { .. })
            | AppError::Cache(CacheError::InvalidKey { .. }) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Stats(_) => "stats",
            AppError::Cache(_) => "cache",
            AppError::Serialization(_) => "serialization",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Poll result type alias
pub type StatsResult<T> = std::result::Result<T, StatsError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_mismatch_message_names_file_and_line() {
        let err = ConfigError::SettingIdMismatch {
            file: PathBuf::from("/etc/ugr/conf.d/s3.conf"),
            line_number: 3,
            line: "locplugin.b.s3.pub_key".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/etc/ugr/conf.d/s3.conf"));
        assert!(message.contains("line: [3]"));
        assert!(message.contains("locplugin.b.s3.pub_key"));
    }

    #[test]
    fn test_stats_error_codes() {
        let err = StatsError::connection("ConnectionError", "400", "refused");
        assert_eq!(err.error_name(), "ConnectionError");
        assert_eq!(err.status_code(), "400");
        assert_eq!(err.debug_detail(), Some("refused"));

        let err = StatsError::UnsupportedPlugin {
            plugin: "libugrlocplugin_gcs.so".to_string(),
        };
        assert_eq!(err.status_code(), "001");
        assert!(err.debug_detail().is_none());
    }

    #[test]
    fn test_app_error_category_and_recoverability() {
        let err: AppError = StatsError::Timeout { seconds: 5 }.into();
        assert_eq!(err.category(), "stats");
        assert!(err.is_recoverable());

        let err: AppError = ConfigError::NoConfigFilesFound { paths: vec![] }.into();
        assert_eq!(err.category(), "config");
        assert!(!err.is_recoverable());
    }
}
