//! share_stats library
//!
//! Polls federated storage shares (S3, WebDAV and Azure endpoints declared in
//! UGR configuration files) for usage and quota. Each endpoint is polled once
//! per run, results are spread to every share on it, and a memcached-backed
//! freshness window keeps backends from being polled too often.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(status::OK, "[OK][OK][200]");
        assert_eq!(cache::DEFAULT_PORT, 11211);
        assert!(http::USER_AGENT.starts_with("share-stats"));
    }

    #[test]
    fn test_error_types() {
        let config_error = errors::ConfigError::NoEndpointsFound { files: Vec::new() };
        let app_error = AppError::Config(config_error);

        assert_eq!(app_error.category(), "config");
        assert!(!app_error.is_recoverable());
    }
}
