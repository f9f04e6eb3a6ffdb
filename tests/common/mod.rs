//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use share_stats::app::models::now_unix;
use share_stats::app::{
    AdapterRegistry, CacheBackend, CacheConfig, ClientConfig, MemoryBackend, RunContext,
    SchedulerConfig, Share, ShareSpec, StatsCache,
};

pub const S3_PLUGIN: &str = "libugrlocplugin_s3.so";
pub const DAV_PLUGIN: &str = "libugrlocplugin_dav.so";
pub const AZURE_PLUGIN: &str = "libugrlocplugin_azure.so";

/// Path-style S3 share with credentials, as served by a mock server
pub fn s3_spec(id: &str, url: &str) -> ShareSpec {
    ShareSpec::new(id, url, S3_PLUGIN)
        .with_setting("s3.alternate", "true")
        .with_setting("s3.pub_key", "AKIDEXAMPLE")
        .with_setting("s3.priv_key", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// WebDAV share authenticating with the test client certificate
pub fn dav_spec(id: &str, url: &str) -> ShareSpec {
    ShareSpec::new(id, url, DAV_PLUGIN)
        .with_setting("cli_certificate", fixture("client.pem").display().to_string())
        .with_setting("cli_private_key", fixture("client.key").display().to_string())
}

pub fn azure_spec(id: &str, url: &str) -> ShareSpec {
    // base64 of "secret-key"
    ShareSpec::new(id, url, AZURE_PLUGIN).with_setting("azure.key", "c2VjcmV0LWtleQ==")
}

/// Validated share, ready for polling
pub fn build(spec: &ShareSpec) -> Share {
    AdapterRegistry::default()
        .build_share(spec, now_unix())
        .expect("quota literals in fixtures are valid")
}

pub fn memory_cache() -> (Arc<MemoryBackend>, StatsCache) {
    let backend = Arc::new(MemoryBackend::new());
    let cache = StatsCache::new(
        backend.clone() as Arc<dyn CacheBackend>,
        CacheConfig::default(),
    );
    (backend, cache)
}

pub fn context(cache: Option<StatsCache>, scheduler: SchedulerConfig) -> Arc<RunContext> {
    Arc::new(
        RunContext::new(AdapterRegistry::default(), ClientConfig::default())
            .with_cache(cache)
            .with_scheduler(scheduler),
    )
}
