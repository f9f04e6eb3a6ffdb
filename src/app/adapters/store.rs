//! Bucket and container listings through `object_store`
//!
//! SigV4 S3 listings and Azure blob listings are delegated to the
//! `object_store` clients, which sign each request and follow continuation
//! tokens. This module builds the client options for a share, sums the
//! listing and maps store failures onto the connection error taxonomy. The
//! TLS policy matches [`HttpHandler`](super::HttpHandler): one retry with the
//! system trust store, then `SSLError` (092).

use std::error::Error as StdError;

use futures::StreamExt;
use object_store::{BackoffConfig, Certificate, ClientOptions, ObjectStore, RetryConfig};
use tracing::{debug, warn};

use crate::app::adapters::config::{ClientConfig, TlsOptions};
use crate::app::adapters::http::{error_chain, is_tls_error, require_http};
use crate::app::adapters::quota::Usage;
use crate::app::models::{Share, TlsVerify};
use crate::errors::{StatsError, StatsResult};

/// Client options for one share's store
pub fn client_options(config: &ClientConfig, share: &Share, tls: &TlsOptions) -> ClientOptions {
    let timeout = share.conn_timeout();
    let mut options = ClientOptions::default()
        .with_timeout(timeout)
        .with_connect_timeout(config.connect_timeout.min(timeout))
        .with_pool_max_idle_per_host(config.pool_max_per_host)
        .with_allow_http(share.uri.scheme == "http");

    if let Some(idle_timeout) = config.pool_idle_timeout {
        options = options.with_pool_idle_timeout(idle_timeout);
    }

    match &tls.verify {
        TlsVerify::Disabled => options = options.with_allow_invalid_certificates(true),
        TlsVerify::CaBundle(_) => {
            // The bundle was checked when the TLS options were loaded
            if let Some(Ok(certs)) = tls.ca_bundle_pem.as_deref().map(Certificate::from_pem_bundle) {
                options = certs
                    .into_iter()
                    .fold(options, |options, cert| options.with_root_certificate(cert));
            }
        }
        TlsVerify::Enabled => {}
    }

    options
}

/// No store-level retries: a failed poll is retried on the next run
pub fn retry_config(share: &Share) -> RetryConfig {
    RetryConfig {
        backoff: BackoffConfig::default(),
        max_retries: 0,
        retry_timeout: share.conn_timeout(),
    }
}

async fn sum_listing(store: &dyn ObjectStore) -> object_store::Result<Usage> {
    let mut usage = Usage::default();
    let mut listing = store.list(None);
    while let Some(meta) = listing.next().await {
        usage.add(meta?.size as i64);
    }
    Ok(usage)
}

/// A TLS failure with no HTTP reply behind it
fn tls_failure(err: &object_store::Error) -> bool {
    status_in(&error_text(err)).is_none() && is_tls_error(err)
}

/// Sum the sizes of every object a share's store lists
///
/// `build` creates the store from client options and is called again for
/// the TLS retry. `classify` maps listing failures that are not TLS related.
pub async fn list_usage<B, C>(
    config: &ClientConfig,
    share: &Share,
    build: B,
    classify: C,
) -> StatsResult<Usage>
where
    B: Fn(ClientOptions) -> StatsResult<Box<dyn ObjectStore>>,
    C: Fn(&object_store::Error) -> StatsError,
{
    require_http(share)?;
    let tls = TlsOptions::load(share, None).await;
    let store = build(client_options(config, share, &tls))?;

    let usage = match sum_listing(store.as_ref()).await {
        Ok(usage) => usage,
        Err(e) if tls_failure(&e) => {
            warn!(
                "[{}] TLS failure, retrying with the system trust store: {}",
                share.id,
                error_chain(&e)
            );
            let fallback = build(client_options(config, share, &tls.system_trust()))?;
            sum_listing(fallback.as_ref()).await.map_err(|e| {
                if tls_failure(&e) {
                    StatsError::connection("SSLError", "092", error_chain(&e))
                } else {
                    classify(&e)
                }
            })?
        }
        Err(e) => return Err(classify(&e)),
    };

    debug!("[{}] Listed {} objects", share.id, usage.files);
    Ok(usage)
}

/// Display chain and debug form of a store error, for scanning
pub fn error_text(err: &object_store::Error) -> String {
    format!("{} {:?}", error_chain(err), err)
}

/// HTTP status a store error carries when the backend replied
pub fn status_in(text: &str) -> Option<String> {
    text.match_indices("status").find_map(|(at, needle)| {
        let rest = &text[at + needle.len()..];
        let (digits_at, _) = rest
            .char_indices()
            .take(8)
            .find(|(_, c)| c.is_ascii_digit())?;
        let code = rest.get(digits_at..digits_at + 3)?;
        let valid = code.bytes().all(|b| b.is_ascii_digit()) && (b'1'..=b'5').contains(&code.as_bytes()[0]);
        valid.then(|| code.to_string())
    })
}

/// `<Code>` element of an XML error body
pub fn error_code_in(text: &str) -> Option<String> {
    let start = text.find("<Code>")? + "<Code>".len();
    let len = text[start..].find("</Code>")?;
    Some(text[start..start + len].trim().to_string()).filter(|code| !code.is_empty())
}

/// Failure before any HTTP reply
pub fn transport_error(err: &object_store::Error) -> StatsError {
    let chain = error_chain(err);
    let timed_out = std::iter::successors(Some(err as &(dyn StdError + 'static)), |&e| e.source())
        .filter_map(|e| e.downcast_ref::<reqwest::Error>())
        .any(reqwest::Error::is_timeout)
        || chain.contains("timed out");
    let name = if timed_out {
        "ConnectionTimeout"
    } else {
        "ConnectionError"
    };
    StatsError::connection(name, "400", chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{SettingValue, ShareSpec};

    #[test]
    fn test_status_is_found_in_both_renderings() {
        assert_eq!(
            status_in("Client error with status 403 Forbidden: <Error/>").as_deref(),
            Some("403")
        );
        assert_eq!(
            status_in("Error { retries: 0, status: Some(404), source: None }").as_deref(),
            Some("404")
        );
        assert_eq!(status_in("error sending request: connection refused"), None);
        assert_eq!(status_in("status unknown 12"), None);
    }

    #[test]
    fn test_error_code_from_body() {
        let body = "status 403: <?xml version=\"1.0\"?><Error><Code>AccessDenied</Code></Error>";
        assert_eq!(error_code_in(body).as_deref(), Some("AccessDenied"));
        assert_eq!(error_code_in("<Code></Code>"), None);
        assert_eq!(error_code_in("no body"), None);
    }

    #[test]
    fn test_generic_store_error_is_connection_error() {
        let err = object_store::Error::Generic {
            store: "S3",
            source: "error sending request: connection refused".into(),
        };
        let mapped = transport_error(&err);
        assert_eq!(mapped.error_name(), "ConnectionError");
        assert_eq!(mapped.status_code(), "400");
        assert!(!tls_failure(&err));

        let err = object_store::Error::Generic {
            store: "S3",
            source: "operation timed out".into(),
        };
        assert_eq!(transport_error(&err).error_name(), "ConnectionTimeout");
    }

    #[test]
    fn test_tls_failure_needs_no_reply() {
        let err = object_store::Error::Generic {
            store: "S3",
            source: "invalid peer certificate: UnknownIssuer".into(),
        };
        assert!(tls_failure(&err));

        let err = object_store::Error::Generic {
            store: "S3",
            source: "Client error with status 400 Bad Request: The plain HTTP request was sent to HTTPS port (ssl)".into(),
        };
        assert!(!tls_failure(&err));
    }

    #[test]
    fn test_store_retries_are_disabled() {
        let mut share = Share::from_spec(
            &ShareSpec::new("s", "https://data.s3.example.org/", "libugrlocplugin_s3.so"),
            0,
        );
        share.settings.insert("conn_timeout".into(), SettingValue::Int(7));
        let retry = retry_config(&share);
        assert_eq!(retry.max_retries, 0);
        assert_eq!(retry.retry_timeout, std::time::Duration::from_secs(7));
    }
}
