//! Memcached text protocol client
//!
//! Only `get` and `set` are needed. Each operation opens its own connection,
//! which keeps the client trivially shareable between endpoint workers.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::app::cache::backend::CacheBackend;
use crate::app::cache::config::CacheConfig;
use crate::constants::cache::MAX_KEY_LENGTH;
use crate::errors::{CacheError, CacheResult};

/// Longest relative expiry memcached accepts, larger values are read as timestamps
const MAX_RELATIVE_TTL: u64 = 60 * 60 * 24 * 30;

#[derive(Debug, Clone)]
pub struct MemcachedBackend {
    address: String,
    io_timeout: Duration,
}

impl MemcachedBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            address: config.address(),
            io_timeout: config.io_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn check_key(key: &str) -> CacheResult<()> {
        if key.is_empty()
            || key.len() > MAX_KEY_LENGTH
            || key.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(CacheError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Connection {
            address: self.address.clone(),
            source,
        }
    }

    async fn connect(&self) -> CacheResult<BufReader<TcpStream>> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(BufReader::new(stream))
    }

    async fn read_line(&self, stream: &mut BufReader<TcpStream>) -> CacheResult<String> {
        let mut line = String::new();
        let read = stream
            .read_line(&mut line)
            .await
            .map_err(|e| self.io_error(e))?;
        if read == 0 {
            return Err(CacheError::Protocol {
                reply: "connection closed".to_string(),
            });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn get_inner(&self, key: &str) -> CacheResult<Option<String>> {
        let mut stream = self.connect().await?;
        stream
            .get_mut()
            .write_all(format!("get {}\r\n", key).as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;

        let header = self.read_line(&mut stream).await?;
        if header == "END" {
            return Ok(None);
        }

        // VALUE <key> <flags> <bytes>
        let length = match header.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["VALUE", _, _, bytes, ..] => bytes.parse::<usize>().ok(),
            _ => None,
        }
        .ok_or_else(|| CacheError::Protocol {
            reply: header.clone(),
        })?;

        let mut data = vec![0u8; length + 2];
        stream
            .read_exact(&mut data)
            .await
            .map_err(|e| self.io_error(e))?;
        data.truncate(length);

        let trailer = self.read_line(&mut stream).await?;
        if trailer != "END" {
            return Err(CacheError::Protocol { reply: trailer });
        }

        Ok(Some(String::from_utf8_lossy(&data).into_owned()))
    }

    async fn set_inner(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut stream = self.connect().await?;
        let request = format!(
            "set {} 0 {} {}\r\n{}\r\n",
            key,
            ttl.as_secs().min(MAX_RELATIVE_TTL),
            value.len(),
            value
        );
        stream
            .get_mut()
            .write_all(request.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;

        match self.read_line(&mut stream).await? {
            reply if reply == "STORED" => Ok(()),
            reply => Err(CacheError::Protocol { reply }),
        }
    }

    async fn with_timeout<T, F>(&self, operation: F) -> CacheResult<T>
    where
        F: std::future::Future<Output = CacheResult<T>>,
    {
        tokio::time::timeout(self.io_timeout, operation)
            .await
            .map_err(|_| CacheError::Timeout {
                seconds: self.io_timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Self::check_key(key)?;
        let value = self.with_timeout(self.get_inner(key)).await?;
        debug!("memcached get {} -> {}", key, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        Self::check_key(key)?;
        self.with_timeout(self.set_inner(key, value, ttl)).await?;
        debug!("memcached set {} (ttl {}s)", key, ttl.as_secs());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serve one connection: record the request, answer with `reply`.
    async fn fake_server(reply: &'static str) -> (CacheConfig, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (CacheConfig::default().with_address("127.0.0.1", port), handle)
    }

    #[tokio::test]
    async fn test_get_hit() {
        let (config, server) = fake_server("VALUE k 0 5\r\nhello\r\nEND\r\n").await;
        let backend = MemcachedBackend::new(&config);

        let value = backend.get("k").await.unwrap();
        assert_eq!(value.as_deref(), Some("hello"));
        assert_eq!(server.await.unwrap(), "get k\r\n");
    }

    #[tokio::test]
    async fn test_get_miss() {
        let (config, _server) = fake_server("END\r\n").await;
        let backend = MemcachedBackend::new(&config);
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_sends_ttl_and_length() {
        let (config, server) = fake_server("STORED\r\n").await;
        let backend = MemcachedBackend::new(&config);

        backend
            .set("Ugrstoragestats_a", "a%%S3", Duration::from_secs(6000))
            .await
            .unwrap();
        assert_eq!(
            server.await.unwrap(),
            "set Ugrstoragestats_a 0 6000 5\r\na%%S3\r\n"
        );
    }

    #[tokio::test]
    async fn test_set_rejection_is_protocol_error() {
        let (config, _server) = fake_server("SERVER_ERROR out of memory\r\n").await;
        let backend = MemcachedBackend::new(&config);
        let err = backend.set("k", "v", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CacheError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_invalid_keys_never_reach_the_server() {
        let backend = MemcachedBackend::new(&CacheConfig::default().with_address("127.0.0.1", 1));
        assert!(matches!(
            backend.get("has space").await,
            Err(CacheError::InvalidKey { .. })
        ));
        assert!(matches!(
            backend.get(&"k".repeat(300)).await,
            Err(CacheError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let backend = MemcachedBackend::new(&CacheConfig::default().with_address("127.0.0.1", 1));
        assert!(matches!(
            backend.get("k").await,
            Err(CacheError::Connection { .. })
        ));
    }
}
