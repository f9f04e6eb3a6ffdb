//! WebDAV shares
//!
//! Requests are PROPFINDs authenticated with the client certificate and key
//! named by `cli_certificate` and `cli_private_key`.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use crate::app::adapters::config::{ClientConfig, ClientPem};
use crate::app::adapters::http::HttpHandler;
use crate::app::adapters::quota::{finalize_quota, ReportedQuota, Usage};
use crate::app::adapters::{xml, Collected, ProtocolAdapter};
use crate::app::models::{now_unix, ProtocolKind, Share, ShareUri, TlsVerify};
use crate::app::validation::{Schema, SettingRule};
use crate::constants::quota;
use crate::errors::{StatsError, StatsResult};

const API_CHOICES: [&str; 3] = ["generic", "list-objects", "rfc4331"];

const QUOTA_REQUEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:quota-available-bytes/>
    <D:quota-used-bytes/>
  </D:prop>
</D:propfind>"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct DavAdapter;

fn propfind_method() -> StatsResult<Method> {
    Method::from_bytes(b"PROPFIND").map_err(|e| StatsError::DavQuotaMethod {
        debug: e.to_string(),
    })
}

fn propfind(
    client: &Client,
    method: &Method,
    url: &str,
    depth: &'static str,
    body: &'static str,
) -> RequestBuilder {
    let request = client
        .request(method.clone(), url)
        .header("Depth", HeaderValue::from_static(depth));
    if body.is_empty() {
        request
    } else {
        request
            .header(CONTENT_TYPE, HeaderValue::from_static("application/xml"))
            .body(body)
    }
}

/// Read the client certificate and key named by the share's settings
async fn load_identity(share: &Share) -> StatsResult<ClientPem> {
    let read = |path: String| async move {
        tokio::fs::read(&path)
            .await
            .map_err(|e| StatsError::DavCertPath {
                debug: format!("{}: {}", e, path),
                certfile: path,
            })
    };

    Ok(ClientPem {
        cert: read(share.text("cli_certificate").to_string()).await?,
        key: read(share.text("cli_private_key").to_string()).await?,
    })
}

/// Used and available bytes from an RFC 4331 reply
fn parse_quota_reply(body: &str) -> Result<(Option<i64>, Option<i64>), String> {
    let mut used = None;
    let mut available = None;
    xml::scan(body, |path, text| {
        if xml::ends_with(path, &["prop", "quota-used-bytes"]) {
            used = text.trim().parse::<i64>().ok();
        } else if xml::ends_with(path, &["prop", "quota-available-bytes"]) {
            available = text.trim().parse::<i64>().ok();
        }
    })?;
    Ok((used, available))
}

/// Sum of `getcontentlength` over a PROPFIND listing
fn sum_content_lengths(body: &str) -> Result<Usage, String> {
    let mut usage = Usage::default();
    xml::scan(body, |path, text| {
        if xml::ends_with(path, &["prop", "getcontentlength"]) {
            if let Ok(bytes) = text.trim().parse::<i64>() {
                usage.add(bytes);
            }
        }
    })?;
    Ok(usage)
}

async fn rfc4331(share: &Share, http: &HttpHandler, url: &str, start: i64) -> StatsResult<Collected> {
    let method = propfind_method()?;
    let response = http
        .send_checked(|client| propfind(client, &method, url, "0", QUOTA_REQUEST))
        .await?;
    let body = http.text(response).await?;

    let quota_method_error = |detail: String| StatsError::DavQuotaMethod { debug: detail };
    let (used, available) = parse_quota_reply(&body).map_err(quota_method_error)?;
    let (Some(used), Some(available)) = (used, available) else {
        return Err(quota_method_error(body));
    };

    let reported = if available == 0 {
        ReportedQuota::ZeroAvailable
    } else {
        ReportedQuota::Known(used + available)
    };
    let usage = Usage {
        bytes: used,
        files: quota::UNKNOWN,
    };
    Ok(finalize_quota(share, start, usage, reported))
}

async fn list_files(share: &Share, http: &HttpHandler, url: &str, start: i64) -> StatsResult<Collected> {
    let method = propfind_method()?;
    let response = http
        .send_checked(|client| propfind(client, &method, url, "infinity", ""))
        .await?;
    let status = response.status();
    let body = http.text(response).await?;

    let usage = sum_content_lengths(&body)
        .map_err(|e| StatsError::connection("InvalidResponse", status.as_str(), e))?;
    debug!("[{}] Found {} files", share.id, usage.files);

    Ok(finalize_quota(share, start, usage, ReportedQuota::Missing))
}

#[async_trait]
impl ProtocolAdapter for DavAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Dav
    }

    fn schema(&self) -> Schema {
        Schema::common("rfc4331", &API_CHOICES).extend([
            SettingRule::required("cli_certificate", "003"),
            SettingRule::required("cli_private_key", "004"),
        ])
    }

    fn translate_scheme(&self, uri: &mut ShareUri, _tls: &TlsVerify) {
        match uri.scheme.as_str() {
            "dav" => uri.scheme = "http".to_string(),
            "davs" => uri.scheme = "https".to_string(),
            _ => {}
        }
    }

    async fn collect_stats(&self, share: &Share, client: &ClientConfig) -> StatsResult<Collected> {
        let start = now_unix();
        let identity = load_identity(share).await?;
        let http = HttpHandler::connect(client, share, Some(identity)).await?;
        let url = format!("{}{}", share.uri.base_url(), share.uri.path);

        debug!(
            "[{}] PROPFIND {} using API \"{}\"",
            share.id,
            url,
            share.api()
        );

        match share.api().as_str() {
            "rfc4331" => rfc4331(share, &http, &url, start).await,
            _ => list_files(share, &http, &url, start).await,
        }
    }
}
