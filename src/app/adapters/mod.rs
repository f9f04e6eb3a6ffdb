//! Protocol adapters for storage backends
//!
//! An adapter knows how to get usage statistics out of one kind of storage:
//! which settings it needs, how its URL scheme maps to HTTP and which API
//! calls to make for each `storagestats.api` strategy.
//!
//! # Key Features
//!
//! - **Registry dispatch**: Plugin names resolve to a [`ProtocolKind`] and its
//!   adapter; unknown plugins still produce a share, marked unsupported
//! - **Object store listings**: S3 (SigV4) and Azure listings go through
//!   `object_store`; ceph-admin requests are signed with its SigV4 authorizer
//!   and only legacy SigV2 signatures are computed locally
//! - **Uniform failure policy**: Transport, TLS and HTTP status failures map to
//!   the same error taxonomy for every protocol
//! - **Pagination**: Full listings follow continuation markers to the end,
//!   throttled by a per-poll rate limiter
//!
//! # Module Organization
//!
//! - [`registry`] - Plugin resolution and share construction
//! - [`config`] - HTTP client configuration and TLS material
//! - [`http`] - Request sending, TLS retry and error mapping
//! - [`quota`] - Quota finalization shared by all adapters
//! - [`signing`] - Legacy S3 SigV2 signatures
//! - [`store`] - `object_store` listings and store error mapping
//! - [`xml`] - Streaming scan of XML replies
//! - [`s3`], [`dav`], [`azure`] - Protocol implementations

pub mod azure;
pub mod config;
pub mod dav;
pub mod http;
pub mod quota;
pub mod registry;
pub mod s3;
pub mod signing;
pub mod store;
pub mod xml;

pub use azure::AzureAdapter;
pub use config::{ClientConfig, ClientPem, TlsOptions};
pub use dav::DavAdapter;
pub use http::HttpHandler;
pub use quota::{finalize_quota, ReportedQuota, Usage};
pub use registry::{resolve, AdapterRegistry};
pub use s3::S3Adapter;

use std::fmt;

use async_trait::async_trait;

use crate::app::models::{ProtocolKind, Share, ShareUri, StatsRecord, TlsVerify};
use crate::app::validation::Schema;
use crate::errors::{StatsResult, StatsWarning};

/// Result of a successful poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub record: StatsRecord,
    pub warnings: Vec<StatsWarning>,
}

/// Strategy for polling one kind of storage backend
#[async_trait]
pub trait ProtocolAdapter: Send + Sync + fmt::Debug {
    /// Protocol served by this adapter
    fn kind(&self) -> ProtocolKind;

    /// Settings schema shares of this protocol are validated against
    fn schema(&self) -> Schema;

    /// Rewrite the configured scheme into one the HTTP client speaks
    fn translate_scheme(&self, _uri: &mut ShareUri, _tls: &TlsVerify) {}

    /// Fetch usage statistics for a share
    ///
    /// Implementations build a fresh [`StatsRecord`] and never touch the
    /// share itself; the caller swaps the record in on success.
    async fn collect_stats(&self, share: &Share, client: &ClientConfig) -> StatsResult<Collected>;
}
