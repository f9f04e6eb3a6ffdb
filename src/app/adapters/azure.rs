//! Azure blob containers
//!
//! The share url names the storage account in its first host label and the
//! container in its path: `https://<account>.blob.core.windows.net/<container>`.
//! Containers are listed with `object_store`, which signs each request with
//! the account's SharedKey.

use async_trait::async_trait;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::{ClientOptions, ObjectStore};
use tracing::debug;

use crate::app::adapters::config::ClientConfig;
use crate::app::adapters::http::error_chain;
use crate::app::adapters::quota::{finalize_quota, ReportedQuota};
use crate::app::adapters::store::{self, error_code_in, error_text, status_in};
use crate::app::adapters::{Collected, ProtocolAdapter};
use crate::app::models::{now_unix, ProtocolKind, Share};
use crate::app::validation::{Schema, SettingRule};
use crate::errors::{StatsError, StatsResult};

const API_CHOICES: [&str; 2] = ["generic", "list-blobs"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AzureAdapter;

/// Account name and container of a share
fn account_and_container(share: &Share) -> (String, String) {
    let account = share
        .uri
        .host
        .split_once('.')
        .map(|(account, _)| account)
        .unwrap_or(share.uri.host.as_str());
    (
        account.to_string(),
        share.uri.path.trim_matches('/').to_string(),
    )
}

fn api_error(share: &Share, error: &str, debug: String) -> StatsError {
    StatsError::AzureApi {
        error: error.to_string(),
        status_code: "400".to_string(),
        api: share.api(),
        debug,
    }
}

fn store_error(share: &Share, container: &str, err: &object_store::Error) -> StatsError {
    let text = error_text(err);
    let status = status_in(&text);
    if matches!(err, object_store::Error::NotFound { .. }) || status.as_deref() == Some("404") {
        return StatsError::ContainerNotFound {
            container: container.to_string(),
            debug: error_chain(err),
        };
    }
    match status {
        Some(_) => api_error(
            share,
            &error_code_in(&text).unwrap_or_else(|| "ConnectionError".to_string()),
            error_chain(err),
        ),
        None => store::transport_error(err),
    }
}

fn build_store(
    share: &Share,
    account: &str,
    container: &str,
    options: ClientOptions,
) -> StatsResult<Box<dyn ObjectStore>> {
    let store = MicrosoftAzureBuilder::new()
        .with_account(account)
        .with_container_name(container)
        .with_access_key(share.text("azure.key"))
        .with_endpoint(share.uri.base_url())
        .with_client_options(options)
        .with_retry(store::retry_config(share))
        .build()
        .map_err(|e| api_error(share, "ConnectionError", format!("Invalid account settings: {}", e)))?;
    Ok(Box::new(store))
}

async fn list_blobs(share: &Share, config: &ClientConfig, start: i64) -> StatsResult<Collected> {
    let (account, container) = account_and_container(share);
    debug!(
        "[{}] Listing blobs of container \"{}\" in account \"{}\"",
        share.id, container, account
    );

    let usage = store::list_usage(
        config,
        share,
        |options| build_store(share, &account, &container, options),
        |err| store_error(share, &container, err),
    )
    .await?;
    Ok(finalize_quota(share, start, usage, ReportedQuota::Missing))
}

#[async_trait]
impl ProtocolAdapter for AzureAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Azure
    }

    fn schema(&self) -> Schema {
        Schema::common("generic", &API_CHOICES).extend([SettingRule::required("azure.key", "010")])
    }

    async fn collect_stats(&self, share: &Share, client: &ClientConfig) -> StatsResult<Collected> {
        let start = now_unix();
        list_blobs(share, client, start).await
    }
}
