//! S3-compatible object stores
//!
//! Two strategies are supported:
//!
//! - `generic` / `list-objects`: walk the whole bucket, summing object sizes.
//!   SigV4 buckets are listed with `object_store` (ListObjectsV2); buckets
//!   configured for the legacy `s3` signature are listed with ListObjects
//!   (v1) requests signed here
//! - `ceph-admin`: ask the Ceph RADOS gateway admin API for bucket usage and
//!   quota in one SigV4-signed request

use async_trait::async_trait;
use chrono::Utc;
use object_store::aws::{AmazonS3Builder, AwsAuthorizer, AwsCredential};
use object_store::{ClientOptions, ObjectStore};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::app::adapters::config::ClientConfig;
use crate::app::adapters::http::{error_chain, HttpHandler};
use crate::app::adapters::quota::{finalize_quota, ReportedQuota, Usage};
use crate::app::adapters::signing::{sigv2_headers, AwsCredentials, Headers};
use crate::app::adapters::store::{self, error_code_in, error_text, status_in};
use crate::app::adapters::{xml, Collected, ProtocolAdapter};
use crate::app::models::{now_unix, ProtocolKind, Share, ShareUri, TlsVerify};
use crate::app::validation::{Schema, SettingRule};
use crate::constants::defaults;
use crate::errors::{StatsError, StatsResult};

const API_CHOICES: [&str; 3] = ["ceph-admin", "generic", "list-objects"];

#[derive(Debug, Clone, Copy, Default)]
pub struct S3Adapter;

/// Where the bucket lives
#[derive(Debug, Clone, PartialEq, Eq)]
struct BucketLocation {
    bucket: String,
    /// `scheme://host[:port]` without the bucket label
    service_url: String,
    /// Url listing requests go to
    listing_url: String,
}

impl BucketLocation {
    fn of(share: &Share) -> Self {
        let uri = &share.uri;
        let with_port = |host: &str| match uri.port {
            Some(port) => format!("{}://{}:{}", uri.scheme, host, port),
            None => format!("{}://{}", uri.scheme, host),
        };

        if share.flag("s3.alternate") {
            let bucket = uri
                .path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            Self {
                listing_url: format!("{}/{}", uri.base_url(), bucket),
                service_url: uri.base_url(),
                bucket,
            }
        } else {
            let (bucket, domain) = uri.host.split_once('.').unwrap_or((uri.host.as_str(), ""));
            Self {
                bucket: bucket.to_string(),
                service_url: with_port(domain),
                listing_url: format!("{}/", uri.base_url()),
            }
        }
    }
}

/// One ListObjects reply
#[derive(Debug, Default, PartialEq, Eq)]
struct ListPage {
    usage: Usage,
    is_truncated: bool,
    next_marker: Option<String>,
    last_key: Option<String>,
}

impl ListPage {
    fn parse(body: &str) -> Result<Self, String> {
        let mut page = ListPage::default();
        let mut parse_error = None;

        xml::scan(body, |path, text| {
            if xml::ends_with(path, &["Contents", "Size"]) {
                match text.trim().parse::<i64>() {
                    Ok(size) => page.usage.add(size),
                    Err(e) => parse_error = Some(format!("Invalid object size \"{}\": {}", text, e)),
                }
            } else if xml::ends_with(path, &["Contents", "Key"]) {
                page.last_key = Some(text.to_string());
            } else if xml::ends_with(path, &["ListBucketResult", "IsTruncated"]) {
                page.is_truncated = text.trim().eq_ignore_ascii_case("true");
            } else if xml::ends_with(path, &["ListBucketResult", "NextMarker"]) {
                page.next_marker = Some(text.to_string());
            }
        })?;

        match parse_error {
            Some(e) => Err(e),
            None => Ok(page),
        }
    }

    /// Marker for the next request, `None` when the listing is complete
    fn continuation(&self) -> Option<String> {
        self.next_marker.clone().or_else(|| {
            if self.is_truncated {
                self.last_key.clone()
            } else {
                None
            }
        })
    }
}

fn aws_credential(share: &Share) -> AwsCredential {
    AwsCredential {
        key_id: share.text("s3.pub_key").to_string(),
        secret_key: share.text("s3.priv_key").to_string(),
        token: None,
    }
}

fn with_headers(request: RequestBuilder, headers: &Headers) -> RequestBuilder {
    headers
        .iter()
        .fold(request, |request, (name, value)| request.header(*name, value))
}

fn parse_url(raw: &str) -> StatsResult<Url> {
    Url::parse(raw).map_err(|e| StatsError::InvalidSchema {
        schema: raw.to_string(),
        debug: e.to_string(),
    })
}

fn api_error(share: &Share, error: &str, debug: String) -> StatsError {
    StatsError::S3Api {
        error: error.to_string(),
        status_code: "400".to_string(),
        api: share.api(),
        debug,
    }
}

/// Turn an S3 error reply into a connection error carrying the S3 error code
async fn s3_error(http: &HttpHandler, response: Response) -> StatsError {
    let status = response.status();
    let body = http.text(response).await.unwrap_or_default();
    let mut code = None;
    let _ = xml::scan(&body, |path, text| {
        if xml::ends_with(path, &["Error", "Code"]) {
            code = Some(text.to_string());
        }
    });
    StatsError::connection(
        code.unwrap_or_else(|| "ClientError".to_string()),
        status.as_str(),
        body,
    )
}

/// Same mapping as [`s3_error`] for failures reported by the object store
fn store_error(err: &object_store::Error) -> StatsError {
    let text = error_text(err);
    match status_in(&text) {
        Some(status) => StatsError::connection(
            error_code_in(&text).unwrap_or_else(|| "ClientError".to_string()),
            status,
            error_chain(err),
        ),
        None => store::transport_error(err),
    }
}

fn build_store(share: &Share, options: ClientOptions) -> StatsResult<Box<dyn ObjectStore>> {
    let location = BucketLocation::of(share);
    let store = AmazonS3Builder::new()
        .with_bucket_name(location.bucket)
        .with_region(share.text("s3.region"))
        .with_access_key_id(share.text("s3.pub_key"))
        .with_secret_access_key(share.text("s3.priv_key"))
        .with_endpoint(share.uri.base_url())
        .with_virtual_hosted_style_request(!share.flag("s3.alternate"))
        .with_client_options(options)
        .with_retry(store::retry_config(share))
        .build()
        .map_err(|e| api_error(share, "ConfigError", format!("Failed to create S3 store: {}", e)))?;
    Ok(Box::new(store))
}

async fn list_objects(share: &Share, config: &ClientConfig, start: i64) -> StatsResult<Collected> {
    debug!(
        "[{}] Listing objects of bucket \"{}\"",
        share.id,
        BucketLocation::of(share).bucket
    );
    let usage = store::list_usage(
        config,
        share,
        |options| build_store(share, options),
        store_error,
    )
    .await?;
    Ok(finalize_quota(share, start, usage, ReportedQuota::Missing))
}

/// ListObjects (v1) walk for gateways that only accept SigV2
async fn legacy_list_objects(share: &Share, http: &HttpHandler, start: i64) -> StatsResult<Collected> {
    let location = BucketLocation::of(share);
    let resource = format!("/{}/", location.bucket);
    let creds = AwsCredentials {
        access_key: share.text("s3.pub_key"),
        secret_key: share.text("s3.priv_key"),
    };

    debug!(
        "[{}] Listing objects of bucket \"{}\" at {}",
        share.id, location.bucket, location.listing_url
    );

    let mut usage = Usage::default();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let mut url = parse_url(&location.listing_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("delimiter", "*");
            if let Some(marker) = &marker {
                query.append_pair("marker", marker);
            }
        }

        let headers = sigv2_headers("GET", &resource, &creds, Utc::now())
            .map_err(|e| api_error(share, "SignatureError", e.to_string()))?;
        let response = http
            .send(|client| with_headers(client.get(url.clone()), &headers))
            .await?;
        if !response.status().is_success() {
            return Err(s3_error(http, response).await);
        }

        let status = response.status();
        let body = http.text(response).await?;
        let page = ListPage::parse(&body).map_err(|e| StatsError::S3Api {
            error: "InvalidResponse".to_string(),
            status_code: status.as_str().to_string(),
            api: share.api(),
            debug: e,
        })?;

        usage.bytes += page.usage.bytes;
        usage.files += page.usage.files;
        pages += 1;

        match page.continuation() {
            Some(next) if marker.as_deref() == Some(next.as_str()) => {
                warn!("[{}] Listing marker \"{}\" repeated, stopping", share.id, next);
                break;
            }
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    debug!(
        "[{}] Listed {} objects in {} page(s)",
        share.id, usage.files, pages
    );
    Ok(finalize_quota(share, start, usage, ReportedQuota::Missing))
}

async fn ceph_admin(share: &Share, http: &HttpHandler, start: i64) -> StatsResult<Collected> {
    let location = BucketLocation::of(share);
    let mut url = parse_url(&format!("{}/admin/bucket", location.service_url))?;
    url.query_pairs_mut()
        .append_pair("format", "json")
        .append_pair("bucket", &location.bucket)
        .append_pair("stats", "True");

    debug!("[{}] Requesting bucket stats from {}", share.id, url);

    let credential = aws_credential(share);
    let authorizer = AwsAuthorizer::new(&credential, "s3", share.text("s3.region"));
    let response = http
        .send_signed(
            |client| client.get(url.clone()),
            |request| authorizer.authorize(request, None),
        )
        .await?;
    let status = response.status().as_str().to_string();
    let body = http.text(response).await?;

    let stats: Value = serde_json::from_str(&body).map_err(|_| StatsError::S3Api {
        error: "NoContent".to_string(),
        status_code: status.clone(),
        api: share.api(),
        debug: body.clone(),
    })?;

    let Some(usage) = stats.get("usage") else {
        return Err(StatsError::MissingBucketUsage {
            error: stats
                .get("Code")
                .and_then(Value::as_str)
                .unwrap_or("MissingBucketUsage")
                .to_string(),
            status_code: status,
            debug: body,
        });
    };

    let main = usage.get("rgw.main");
    let field = |name: &str| {
        main.and_then(|m| m.get(name))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    };
    let totals = Usage {
        bytes: field("size_utilized"),
        files: field("num_objects"),
    };

    let reported = match stats
        .pointer("/bucket_quota/enabled")
        .and_then(Value::as_bool)
    {
        Some(true) => stats
            .pointer("/bucket_quota/max_size")
            .and_then(Value::as_i64)
            .filter(|size| *size > 0)
            .map(ReportedQuota::Known)
            .unwrap_or(ReportedQuota::Missing),
        Some(false) => ReportedQuota::Disabled,
        None => ReportedQuota::Missing,
    };

    Ok(finalize_quota(share, start, totals, reported))
}

#[async_trait]
impl ProtocolAdapter for S3Adapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::S3
    }

    fn schema(&self) -> Schema {
        Schema::common("generic", &API_CHOICES).extend([
            SettingRule::optional("s3.alternate", "false", "020")
                .one_of(&["true", "false", "yes", "no"])
                .boolean(),
            SettingRule::required("s3.priv_key", "021"),
            SettingRule::required("s3.pub_key", "022"),
            SettingRule::optional("s3.region", defaults::S3_REGION, "023"),
            SettingRule::optional("s3.signature_ver", defaults::S3_SIGNATURE, "024")
                .one_of(&["s3", "s3v4"]),
        ])
    }

    fn translate_scheme(&self, uri: &mut ShareUri, tls: &TlsVerify) {
        if uri.scheme == "s3" {
            uri.scheme = if tls.is_enabled() { "https" } else { "http" }.to_string();
        }
    }

    async fn collect_stats(&self, share: &Share, client: &ClientConfig) -> StatsResult<Collected> {
        let start = now_unix();
        let legacy = share.text("s3.signature_ver").eq_ignore_ascii_case("s3");

        match share.api().as_str() {
            "ceph-admin" => {
                let http = HttpHandler::connect(client, share, None).await?;
                ceph_admin(share, &http, start).await
            }
            _ if legacy => {
                let http = HttpHandler::connect(client, share, None).await?;
                legacy_list_objects(share, &http, start).await
            }
            _ => list_objects(share, client, start).await,
        }
    }
}
