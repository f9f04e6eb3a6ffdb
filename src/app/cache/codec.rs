//! Delimited cache payloads
//!
//! Values in the shared cache are `%%`-delimited strings shared with the
//! federation service. They are decoded into typed records here and nowhere
//! else.

use std::collections::HashMap;

use tracing::warn;

use crate::app::models::Share;
use crate::constants::cache::{ENTRY_SEPARATOR, FIELD_SEPARATOR};
use crate::constants::status;
use crate::errors::{CacheError, CacheResult};

/// Stats of one share as stored in the cache
///
/// Encoded as `id%%protocol%%timestamp%%quota%%bytes_used%%bytes_free%%status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStats {
    pub share_id: String,
    pub protocol: String,
    /// Start time of the poll that produced these numbers
    pub timestamp: i64,
    pub quota: i64,
    pub bytes_used: i64,
    pub bytes_free: i64,
    pub status: String,
}

impl CachedStats {
    pub fn from_share(share: &Share) -> Self {
        Self {
            share_id: share.id.clone(),
            protocol: share.protocol_name().to_string(),
            timestamp: share.stats.start_time,
            quota: share.stats.quota,
            bytes_used: share.stats.bytes_used,
            bytes_free: share.stats.bytes_free,
            status: share.status(),
        }
    }

    pub fn encode(&self) -> String {
        [
            self.share_id.clone(),
            self.protocol.clone(),
            self.timestamp.to_string(),
            self.quota.to_string(),
            self.bytes_used.to_string(),
            self.bytes_free.to_string(),
            self.status.clone(),
        ]
        .join(FIELD_SEPARATOR)
    }

    /// Decode a value read from `key`
    pub fn decode(key: &str, raw: &str) -> CacheResult<Self> {
        let fields: Vec<&str> = raw.trim().splitn(7, FIELD_SEPARATOR).collect();
        let &[share_id, protocol, timestamp, quota, bytes_used, bytes_free, status] = fields.as_slice()
        else {
            return Err(CacheError::Decode {
                key: key.to_string(),
                reason: format!("expected 7 fields, found {}", fields.len()),
            });
        };

        let number = |name: &str, value: &str| {
            value.trim().parse::<i64>().map_err(|e| CacheError::Decode {
                key: key.to_string(),
                reason: format!("{} \"{}\": {}", name, value, e),
            })
        };

        Ok(Self {
            share_id: share_id.to_string(),
            protocol: protocol.to_string(),
            timestamp: number("timestamp", timestamp)?,
            quota: number("quota", quota)?,
            bytes_used: number("bytes_used", bytes_used)?,
            bytes_free: number("bytes_free", bytes_free)?,
            status: status.to_string(),
        })
    }
}

/// Connection health of one share as recorded by the federation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHealth {
    pub share_id: String,
    pub timestamp: i64,
    pub status: String,
    pub latency: String,
    pub status_code: String,
    pub error: String,
}

impl ConnectionHealth {
    pub fn is_offline(&self) -> bool {
        self.status == status::OFFLINE
    }

    fn decode(entry: &str) -> Option<Self> {
        let fields: Vec<&str> = entry.split(FIELD_SEPARATOR).collect();
        // <dup>%%<id>%%<timestamp>%%<status>%%<latency>%%<status_code>%%<error>
        let &[_dup, share_id, timestamp, status, latency, status_code, ..] = fields.as_slice() else {
            return None;
        };
        let error = fields
            .get(6)
            .copied()
            .filter(|e| !e.is_empty())
            .unwrap_or("OK");

        Some(Self {
            share_id: share_id.to_string(),
            timestamp: timestamp.trim().parse().ok()?,
            status: status.to_string(),
            latency: latency.to_string(),
            status_code: status_code.to_string(),
            error: error.to_string(),
        })
    }
}

/// Decode a connection stats generation into records keyed by share id
///
/// Anything after the last NUL is discarded. Malformed entries are skipped.
pub fn decode_connection_stats(raw: &str) -> HashMap<String, ConnectionHealth> {
    let raw = match raw.rfind('\0') {
        Some(end) => &raw[..end],
        None => raw,
    };

    raw.split(ENTRY_SEPARATOR)
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let health = ConnectionHealth::decode(entry.trim());
            if health.is_none() {
                warn!("Skipping malformed connection stats entry: {:?}", entry);
            }
            health
        })
        .map(|health| (health.share_id.clone(), health))
        .collect()
}
