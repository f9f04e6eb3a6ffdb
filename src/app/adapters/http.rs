//! Request sending with rate limiting and the TLS retry policy
//!
//! Every hand-built adapter request goes through [`HttpHandler::send`] or
//! [`HttpHandler::send_signed`]. Requests are throttled by a per-poll rate
//! limiter so paginated listings do not hammer a backend. A TLS failure is retried exactly once with a client that trusts
//! the system store; transport failures become `ConnectionError` (400) and a
//! second TLS failure becomes `SSLError` (092).

use std::error::Error as StdError;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::{Client, Request, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::app::adapters::config::{ClientConfig, ClientPem, TlsOptions};
use crate::app::models::Share;
use crate::errors::{StatsError, StatsResult};

/// HTTP operations handler for one share poll
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    config: ClientConfig,
    tls: TlsOptions,
    timeout: Duration,
    share_id: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpHandler {
    /// Build a handler for a share, loading its CA bundle if configured
    ///
    /// # Errors
    ///
    /// `InvalidSchema` when the share url is not http(s) after scheme
    /// translation.
    pub async fn connect(
        config: &ClientConfig,
        share: &Share,
        client_pem: Option<ClientPem>,
    ) -> StatsResult<Self> {
        require_http(share)?;

        let tls = TlsOptions::load(share, client_pem).await;
        let timeout = share.conn_timeout();
        let client = config.build_http_client(timeout, &tls)?;

        Ok(Self {
            client,
            config: config.clone(),
            tls,
            timeout,
            share_id: share.id.clone(),
            rate_limiter: Self::build_rate_limiter(config.rate_limit_rps),
        })
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> RateLimiter<NotKeyed, InMemoryState, DefaultClock> {
        let rps = NonZeroU32::new(rate_limit_rps).unwrap_or(NonZeroU32::MIN);
        RateLimiter::direct(Quota::per_second(rps))
    }

    /// Send a request built by `build`, retrying once on TLS failure
    ///
    /// `build` is called again for the retry, so it must produce the same
    /// request (including any signature) each time.
    pub async fn send<F>(&self, build: F) -> StatsResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_signed(build, |_: &mut Request| {}).await
    }

    /// Like [`send`](Self::send), with `sign` applied to every built request
    pub async fn send_signed<F, S>(&self, build: F, sign: S) -> StatsResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
        S: Fn(&mut Request),
    {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(20)))
            .await;

        match execute(&self.client, &build, &sign).await {
            Ok(response) => Ok(response),
            Err(e) if is_tls_error(&e) => {
                warn!(
                    "[{}] TLS failure, retrying with the system trust store: {}",
                    self.share_id,
                    error_chain(&e)
                );
                let fallback = self
                    .config
                    .build_http_client(self.timeout, &self.tls.system_trust())?;
                execute(&fallback, &build, &sign).await.map_err(|e| {
                    if is_tls_error(&e) {
                        StatsError::connection("SSLError", "092", error_chain(&e))
                    } else {
                        transport_error(&e)
                    }
                })
            }
            Err(e) => Err(transport_error(&e)),
        }
    }

    /// Like [`send`](Self::send), but HTTP error statuses become connection errors
    pub async fn send_checked<F>(&self, build: F) -> StatsResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send(build).await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(StatsError::connection(
                "HTTPError",
                status.as_str(),
                format!("{} {}", status, body.trim()),
            ));
        }
        debug!("[{}] HTTP {}", self.share_id, status);
        Ok(response)
    }

    /// Read a response body as text
    pub async fn text(&self, response: Response) -> StatsResult<String> {
        response.text().await.map_err(|e| transport_error(&e))
    }

    pub fn share_id(&self) -> &str {
        &self.share_id
    }
}

async fn execute<F, S>(client: &Client, build: &F, sign: &S) -> reqwest::Result<Response>
where
    F: Fn(&Client) -> RequestBuilder,
    S: Fn(&mut Request),
{
    let mut request = build(client).build()?;
    sign(&mut request);
    client.execute(request).await
}

/// Reject shares whose scheme the HTTP clients cannot speak
pub fn require_http(share: &Share) -> StatsResult<()> {
    if share.uri.is_http() {
        return Ok(());
    }
    Err(StatsError::InvalidSchema {
        schema: share.uri.scheme.clone(),
        debug: format!("No connection adapters were found for \"{}\"", share.uri.url),
    })
}

/// Whether any error in the chain points at a TLS problem
pub fn is_tls_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        let text = e.to_string().to_lowercase();
        if ["certificate", "ssl", "tls", "handshake"]
            .iter()
            .any(|needle| text.contains(needle))
        {
            return true;
        }
        current = e.source();
    }
    false
}

/// Error message followed by its sources
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

fn transport_error(err: &reqwest::Error) -> StatsError {
    let name = if err.is_timeout() {
        "ConnectionTimeout"
    } else {
        "ConnectionError"
    };
    StatsError::connection(name, "400", error_chain(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::ShareSpec;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for Layer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.1.as_deref().map(|l| l as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn test_tls_detection_walks_the_chain() {
        let err = Layer(
            "error sending request",
            Some(Box::new(Layer("certificate verify failed", None))),
        );
        assert!(is_tls_error(&err));
        assert_eq!(
            error_chain(&err),
            "error sending request: certificate verify failed"
        );

        let err = Layer("connection refused", None);
        assert!(!is_tls_error(&err));
    }

    #[test]
    fn test_zero_rate_limit_is_clamped() {
        let limiter = HttpHandler::build_rate_limiter(0);
        assert!(limiter.check().is_ok());
    }

    #[tokio::test]
    async fn test_non_http_scheme_is_invalid_schema() {
        let share = Share::from_spec(
            &ShareSpec::new("a", "s3://bucket.example.org/", "libugrlocplugin_s3.so"),
            0,
        );
        let err = HttpHandler::connect(&ClientConfig::default(), &share, None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), "000");
        assert_eq!(err.error_name(), "InvalidSchema");
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let share = Share::from_spec(
            &ShareSpec::new("a", "http://127.0.0.1:1/", "libugrlocplugin_dav.so"),
            0,
        );
        let handler = HttpHandler::connect(&ClientConfig::default(), &share, None)
            .await
            .unwrap();
        let err = handler
            .send(|client| client.get("http://127.0.0.1:1/"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), "400");
    }

    /// Test the TLS retry against a server that does not speak TLS
    ///
    /// Purpose: A failed handshake is retried exactly once with the system
    /// trust store, and the second failure is reported as `SSLError` (092).
    /// Benefit: Guards the retry policy shared by every hand-built request.
    #[tokio::test]
    async fn test_tls_failure_is_retried_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = socket
                    .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });

        let url = format!("https://{}/", addr);
        let share = Share::from_spec(&ShareSpec::new("a", &url, "libugrlocplugin_dav.so"), 0);
        let handler = HttpHandler::connect(&ClientConfig::default(), &share, None)
            .await
            .unwrap();
        let err = handler
            .send(|client| client.get(url.as_str()))
            .await
            .unwrap_err();

        assert_eq!(err.error_name(), "SSLError");
        assert_eq!(err.status_code(), "092");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }
}
