//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the per-share
//! HTTP clients used by the protocol adapters, including the share's TLS
//! verification policy and optional client certificate identity.

use std::time::Duration;

use reqwest::{Certificate, Client, Identity};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::models::{Share, TlsVerify};
use crate::constants::{http, limits};
use crate::errors::{StatsError, StatsResult};

/// Configuration for HTTP clients shared by all adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Upper bound on connection establishment, further capped by the share's `conn_timeout`
    pub connect_timeout: Duration,
    /// Rate limit (requests per second) within one endpoint poll
    pub rate_limit_rps: u32,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            user_agent: http::USER_AGENT.to_string(),
        }
    }
}

/// PEM-encoded client certificate and PKCS#8 private key
#[derive(Debug, Clone)]
pub struct ClientPem {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

/// TLS material for one share's client
#[derive(Debug, Clone)]
pub struct TlsOptions {
    pub verify: TlsVerify,
    /// Contents of the CA bundle when `verify` is `CaBundle`
    pub ca_bundle_pem: Option<Vec<u8>>,
    pub client_pem: Option<ClientPem>,
}

impl TlsOptions {
    /// TLS material for a share, reading its CA bundle when it names one
    ///
    /// A bundle that cannot be read or holds no certificate is logged and
    /// replaced by the system trust store.
    pub async fn load(share: &Share, client_pem: Option<ClientPem>) -> Self {
        let verify = share.tls_verify();
        let options = Self {
            verify: verify.clone(),
            ca_bundle_pem: None,
            client_pem,
        };
        let TlsVerify::CaBundle(path) = &verify else {
            return options;
        };

        let checked = match tokio::fs::read(path).await {
            Ok(pem) => ca_certificates(&pem).map(|_| pem),
            Err(e) => Err(e.to_string()),
        };
        match checked {
            Ok(pem) => Self {
                ca_bundle_pem: Some(pem),
                ..options
            },
            Err(e) => {
                warn!(
                    "[{}] Cannot use CA bundle {}, using the system trust store: {}",
                    share.id,
                    path.display(),
                    e
                );
                options.system_trust()
            }
        }
    }

    /// Verify against the system trust store, keeping any client identity
    pub fn system_trust(&self) -> Self {
        Self {
            verify: TlsVerify::Enabled,
            ca_bundle_pem: None,
            client_pem: self.client_pem.clone(),
        }
    }
}

/// Every certificate of a PEM bundle
pub fn ca_certificates(pem: &[u8]) -> Result<Vec<Certificate>, String> {
    let certs = Certificate::from_pem_bundle(pem).map_err(|e| e.to_string())?;
    if certs.is_empty() {
        return Err("no certificate found in bundle".to_string());
    }
    Ok(certs)
}

impl ClientConfig {
    /// Set the per-endpoint request rate
    pub fn with_rate_limit(mut self, rps: u32) -> Self {
        self.rate_limit_rps = rps;
        self
    }

    /// Builds an HTTP client for one share
    ///
    /// `timeout` bounds every request made with the client.
    pub fn build_http_client(&self, timeout: Duration, tls: &TlsOptions) -> StatsResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(self.connect_timeout.min(timeout))
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        match &tls.verify {
            TlsVerify::Disabled => {
                client_builder = client_builder.danger_accept_invalid_certs(true);
            }
            TlsVerify::CaBundle(path) => {
                if let Some(pem) = &tls.ca_bundle_pem {
                    let certs = ca_certificates(pem).map_err(|e| {
                        StatsError::connection(
                            "SSLError",
                            "092",
                            format!("Invalid CA bundle {}: {}", path.display(), e),
                        )
                    })?;
                    // The bundle replaces the built-in roots
                    client_builder = certs
                        .into_iter()
                        .fold(client_builder.tls_built_in_root_certs(false), |builder, cert| {
                            builder.add_root_certificate(cert)
                        });
                }
            }
            TlsVerify::Enabled => {}
        }

        if let Some(pem) = &tls.client_pem {
            let identity = Identity::from_pkcs8_pem(&pem.cert, &pem.key).map_err(|e| {
                StatsError::connection("ClientCertError", "003", format!("Invalid client identity: {}", e))
            })?;
            client_builder = client_builder.identity(identity);
        }

        client_builder
            .build()
            .map_err(|e| StatsError::connection("ClientBuildError", "400", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{SettingValue, ShareSpec};
    use std::path::PathBuf;

    fn tls(verify: TlsVerify) -> TlsOptions {
        TlsOptions {
            verify,
            ca_bundle_pem: None,
            client_pem: None,
        }
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert_eq!(config.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.user_agent, http::USER_AGENT);
    }

    #[test]
    fn test_http_client_creation() {
        let config = ClientConfig::default();
        assert!(config
            .build_http_client(Duration::from_secs(5), &tls(TlsVerify::Enabled))
            .is_ok());
        assert!(config
            .build_http_client(Duration::from_secs(5), &tls(TlsVerify::Disabled))
            .is_ok());
    }

    #[test]
    fn test_invalid_ca_bundle_is_an_ssl_error() {
        let options = TlsOptions {
            verify: TlsVerify::CaBundle("/etc/ca.pem".into()),
            ca_bundle_pem: Some(b"not a certificate".to_vec()),
            client_pem: None,
        };
        let err = ClientConfig::default()
            .build_http_client(Duration::from_secs(5), &options)
            .unwrap_err();
        assert_eq!(err.error_name(), "SSLError");
        assert_eq!(err.status_code(), "092");
    }

    const CERT: &[u8] = include_bytes!("../../../tests/fixtures/client.pem");

    #[test]
    fn test_ca_bundle_loads_every_certificate() {
        let bundle = [CERT, CERT].concat();
        assert_eq!(ca_certificates(&bundle).unwrap().len(), 2);
        assert!(ca_certificates(b"").is_err());

        let options = TlsOptions {
            verify: TlsVerify::CaBundle("/etc/ca.pem".into()),
            ca_bundle_pem: Some(bundle),
            client_pem: None,
        };
        assert!(ClientConfig::default()
            .build_http_client(Duration::from_secs(5), &options)
            .is_ok());
    }

    /// Test that an unusable CA bundle falls back to the system trust store
    ///
    /// Purpose: A missing bundle file or one without certificates does not
    /// fail the share before any request is made.
    /// Benefit: Misconfigured `ca_path` settings degrade to default
    /// verification instead of silencing the share.
    #[tokio::test]
    async fn test_unusable_ca_bundle_uses_system_trust() {
        let temp = tempfile::TempDir::new().unwrap();
        let empty = temp.path().join("empty.pem");
        std::fs::write(&empty, "").unwrap();
        let valid = temp.path().join("ca.pem");
        std::fs::write(&valid, CERT).unwrap();

        for (path, expected) in [
            (PathBuf::from("/nonexistent/ca.pem"), TlsVerify::Enabled),
            (empty, TlsVerify::Enabled),
            (valid.clone(), TlsVerify::CaBundle(valid.clone())),
        ] {
            let mut share = Share::from_spec(
                &ShareSpec::new("a", "https://a.example.org/", "libugrlocplugin_dav.so"),
                0,
            );
            share.settings.insert(
                "ssl_check".into(),
                SettingValue::Text(path.display().to_string()),
            );

            let options = TlsOptions::load(&share, None).await;
            assert_eq!(options.verify, expected);
            assert_eq!(options.ca_bundle_pem.is_some(), expected != TlsVerify::Enabled);
        }
    }

    #[test]
    fn test_system_trust_keeps_identity() {
        let options = TlsOptions {
            verify: TlsVerify::Disabled,
            ca_bundle_pem: None,
            client_pem: Some(ClientPem {
                cert: b"cert".to_vec(),
                key: b"key".to_vec(),
            }),
        };
        let fallback = options.system_trust();
        assert_eq!(fallback.verify, TlsVerify::Enabled);
        assert!(fallback.client_pem.is_some());
    }
}
