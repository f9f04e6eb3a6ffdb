//! Data models for share_stats
//!
//! This module defines the core data structures that flow through a run:
//! raw share declarations from configuration files, validated shares with
//! typed settings and collected statistics, and endpoints grouping shares
//! that point at the same storage location.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use url::Url;

use crate::app::diagnostics::{Diagnostic, Severity};
use crate::constants::{defaults, quota, status};

/// Current time in Unix seconds
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One storage share as declared in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSpec {
    /// Unique share id
    pub id: String,
    /// Endpoint URL as written
    pub url: String,
    /// Final component of the declared plugin path
    pub plugin: String,
    /// Raw setting name to value pairs
    pub settings: BTreeMap<String, String>,
}

impl ShareSpec {
    /// Create a declaration with no settings yet
    pub fn new(id: impl Into<String>, url: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            plugin: plugin.into(),
            settings: BTreeMap::new(),
        }
    }

    /// Builder-style setting insertion
    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }
}

/// Typed setting value produced by validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Whether a share may be polled in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    Ok,
    MissingRequiredSetting,
    InvalidSetting,
    Offline,
    PeriodNotReached,
    UnsupportedPlugin,
}

impl CheckState {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckState::Ok)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Ok => "OK",
            CheckState::MissingRequiredSetting => "MissingRequiredSetting",
            CheckState::InvalidSetting => "InvalidSetting",
            CheckState::Offline => "EndpointOffline",
            CheckState::PeriodNotReached => "PeriodNotReached",
            CheckState::UnsupportedPlugin => "UnsupportedPlugin",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-share poll lifecycle within one run
///
/// `Pending` moves to exactly one terminal state: `Skipped`, or through
/// `Polling` to `Succeeded`, `SucceededWithWarning` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Skipped(CheckState),
    Polling,
    Succeeded,
    SucceededWithWarning,
    Failed,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Pending | PollState::Polling)
    }

    /// Whether the representative share actually talked to its backend
    pub fn was_polled(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::SucceededWithWarning | PollState::Failed
        )
    }
}

/// Storage protocol served by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolKind {
    S3,
    Dav,
    Azure,
}

impl ProtocolKind {
    /// Protocol name used in reports and cached records
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::S3 => "S3",
            ProtocolKind::Dav => "DAV",
            ProtocolKind::Azure => "Azure",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TLS verification policy derived from `ssl_check` and `ca_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsVerify {
    Enabled,
    Disabled,
    CaBundle(PathBuf),
}

impl TlsVerify {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsVerify::Disabled)
    }
}

/// Quota source for a share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSetting {
    /// Ask the backend
    Api,
    /// Explicit quota in bytes
    Bytes(i64),
}

/// Parsed URL parts of a share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareUri {
    /// Scheme, rewritten by the owning protocol to one the HTTP client speaks
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    /// The url as written in configuration
    pub url: String,
}

impl ShareUri {
    /// Split a configured url into its parts
    ///
    /// Unparseable urls keep the raw text with empty parts; polling such a
    /// share fails with an invalid schema error instead of aborting the run.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) => Self {
                scheme: url.scheme().to_string(),
                host: url.host_str().unwrap_or_default().to_string(),
                port: url.port(),
                path: url.path().to_string(),
                url: raw.to_string(),
            },
            Err(_) => Self {
                scheme: String::new(),
                host: String::new(),
                port: None,
                path: String::new(),
                url: raw.to_string(),
            },
        }
    }

    /// Host with optional port
    pub fn netloc(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// `scheme://netloc` prefix for building request urls
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.netloc())
    }

    /// Whether the HTTP client can speak this scheme
    pub fn is_http(&self) -> bool {
        self.scheme == "http" || self.scheme == "https"
    }
}

/// Usage statistics of one share
///
/// Numeric fields use `-1` for unknown. An adapter builds a fresh record per
/// poll; the scheduler swaps it in as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub bytes_used: i64,
    pub bytes_free: i64,
    pub quota: i64,
    pub file_count: i64,
    /// Unix seconds when the share was created or the poll started
    pub start_time: i64,
    /// Unix seconds when data was obtained, `0` until then
    pub end_time: i64,
}

impl StatsRecord {
    /// Empty record stamped with a start time
    pub fn new(start_time: i64) -> Self {
        Self {
            bytes_used: quota::UNKNOWN,
            bytes_free: quota::UNKNOWN,
            quota: quota::UNKNOWN,
            file_count: quota::UNKNOWN,
            start_time,
            end_time: 0,
        }
    }
}

/// A share after validation
#[derive(Debug, Clone)]
pub struct Share {
    pub id: String,
    pub plugin: String,
    pub uri: ShareUri,
    pub protocol: Option<ProtocolKind>,
    pub settings: BTreeMap<String, SettingValue>,
    pub check: CheckState,
    pub stats: StatsRecord,
    pub diagnostics: Vec<Diagnostic>,
    pub poll_state: PollState,
}

impl Share {
    /// Fresh share for a declaration, before settings are validated
    pub fn from_spec(spec: &ShareSpec, now: i64) -> Self {
        Self {
            id: spec.id.clone(),
            plugin: spec.plugin.clone(),
            uri: ShareUri::parse(&spec.url),
            protocol: None,
            settings: BTreeMap::new(),
            check: CheckState::Ok,
            stats: StatsRecord::new(now),
            diagnostics: Vec::new(),
            poll_state: PollState::Pending,
        }
    }

    pub fn setting(&self, name: &str) -> Option<&SettingValue> {
        self.settings.get(name)
    }

    /// Text value of a setting, or `""`
    pub fn text(&self, name: &str) -> &str {
        self.setting(name)
            .and_then(SettingValue::as_text)
            .unwrap_or_default()
    }

    /// Boolean value of a setting, `false` when absent
    pub fn flag(&self, name: &str) -> bool {
        self.setting(name)
            .and_then(SettingValue::as_bool)
            .unwrap_or(false)
    }

    /// Selected stats API, lowercased
    pub fn api(&self) -> String {
        self.text("storagestats.api").to_lowercase()
    }

    pub fn quota_setting(&self) -> QuotaSetting {
        match self.setting("storagestats.quota") {
            Some(SettingValue::Int(bytes)) => QuotaSetting::Bytes(*bytes),
            _ => QuotaSetting::Api,
        }
    }

    pub fn tls_verify(&self) -> TlsVerify {
        match self.setting("ssl_check") {
            Some(SettingValue::Bool(false)) => TlsVerify::Disabled,
            Some(SettingValue::Text(path)) if !path.is_empty() => {
                TlsVerify::CaBundle(PathBuf::from(path))
            }
            _ => TlsVerify::Enabled,
        }
    }

    /// Per-request timeout from `conn_timeout`
    pub fn conn_timeout(&self) -> Duration {
        let secs = self
            .setting("conn_timeout")
            .and_then(SettingValue::as_int)
            .or_else(|| defaults::CONN_TIMEOUT_SECS.parse().ok())
            .unwrap_or(10);
        Duration::from_secs(secs.max(1) as u64)
    }

    /// Minimum seconds between polls from `storagestats.frequency`
    pub fn frequency(&self) -> u64 {
        self.setting("storagestats.frequency")
            .and_then(SettingValue::as_int)
            .or_else(|| defaults::FREQUENCY_SECS.parse().ok())
            .unwrap_or(600)
            .max(0) as u64
    }

    /// Protocol name for reports
    pub fn protocol_name(&self) -> &'static str {
        self.protocol.map(|p| p.name()).unwrap_or("Undefined")
    }

    /// Record a diagnostic and log it under the share id
    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!("[{}]{}", self.id, diagnostic.debug_line()),
            Severity::Error => error!("[{}]{}", self.id, diagnostic.debug_line()),
        }
        self.diagnostics.push(diagnostic);
    }

    /// Status string: diagnostic codes joined by `,`, or the OK sentinel
    pub fn status(&self) -> String {
        if self.diagnostics.is_empty() {
            status::OK.to_string()
        } else {
            self.diagnostics
                .iter()
                .map(Diagnostic::status_code_tag)
                .collect::<Vec<_>>()
                .join(",")
        }
    }

    /// Debug lines, one per diagnostic
    pub fn debug_lines(&self) -> Vec<String> {
        self.diagnostics.iter().map(Diagnostic::debug_line).collect()
    }
}

/// Shares that resolve to the same canonical url
///
/// The first share is the representative: it is the one polled and its
/// record is propagated to the others.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub shares: Vec<Share>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shares: Vec::new(),
        }
    }

    pub fn representative(&self) -> Option<&Share> {
        self.shares.first()
    }

    pub fn representative_mut(&mut self) -> Option<&mut Share> {
        self.shares.first_mut()
    }
}

/// Group shares by url, keeping first-appearance order of both endpoints and shares
pub fn group_by_url(shares: Vec<Share>) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for share in shares {
        let key = share.uri.url.clone();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            endpoints.push(Endpoint::new(key));
            endpoints.len() - 1
        });
        endpoints[slot].shares.push(share);
    }

    endpoints
}
