//! Plugin resolution and share construction

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::app::adapters::{AzureAdapter, DavAdapter, ProtocolAdapter, S3Adapter};
use crate::app::diagnostics::Diagnostic;
use crate::app::models::{CheckState, ProtocolKind, Share, ShareSpec};
use crate::app::validation::{validate, Schema};
use crate::constants::plugins;
use crate::errors::{ConfigResult, StatsError, StatsResult};

/// Map a plugin file name to the protocol it speaks
pub fn resolve(plugin: &str) -> StatsResult<ProtocolKind> {
    match plugin {
        plugins::DAV | plugins::HTTP => Ok(ProtocolKind::Dav),
        plugins::S3 => Ok(ProtocolKind::S3),
        plugins::AZURE => Ok(ProtocolKind::Azure),
        _ => Err(StatsError::UnsupportedPlugin {
            plugin: plugin.to_string(),
        }),
    }
}

/// Adapters available to a run, keyed by protocol
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<ProtocolKind, Arc<dyn ProtocolAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::empty()
            .register(Arc::new(S3Adapter))
            .register(Arc::new(DavAdapter))
            .register(Arc::new(AzureAdapter))
    }
}

impl AdapterRegistry {
    /// Registry with no adapters
    pub fn empty() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// Add or replace the adapter for its protocol
    pub fn register(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ProtocolKind) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Validate a declaration and bind it to its protocol
    ///
    /// Plugins without an adapter still yield a share, checked against the
    /// common settings and marked `UnsupportedPlugin`.
    ///
    /// # Errors
    ///
    /// Only a malformed quota literal fails.
    pub fn build_share(&self, spec: &ShareSpec, now: i64) -> ConfigResult<Share> {
        let adapter = resolve(&spec.plugin)
            .ok()
            .and_then(|kind| self.get(kind));

        let Some(adapter) = adapter else {
            let mut share = validate(spec, &Schema::common("generic", &["generic"]), now)?;
            let err = StatsError::UnsupportedPlugin {
                plugin: spec.plugin.clone(),
            };
            share.check = CheckState::UnsupportedPlugin;
            share.push_diagnostic(Diagnostic::from(&err));
            return Ok(share);
        };

        let mut share = validate(spec, &adapter.schema(), now)?;
        share.protocol = Some(adapter.kind());
        let tls = share.tls_verify();
        adapter.translate_scheme(&mut share.uri, &tls);

        debug!(
            "[{}] {} share at {}",
            share.id,
            share.protocol_name(),
            share.uri.base_url()
        );
        Ok(share)
    }

    /// Build shares for every declaration, in order
    pub fn build_shares<'a, I>(&self, specs: I, now: i64) -> ConfigResult<Vec<Share>>
    where
        I: IntoIterator<Item = &'a ShareSpec>,
    {
        specs
            .into_iter()
            .map(|spec| self.build_share(spec, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_plugins() {
        assert_eq!(resolve("libugrlocplugin_dav.so").unwrap(), ProtocolKind::Dav);
        assert_eq!(resolve("libugrlocplugin_http.so").unwrap(), ProtocolKind::Dav);
        assert_eq!(resolve("libugrlocplugin_s3.so").unwrap(), ProtocolKind::S3);
        assert_eq!(resolve("libugrlocplugin_azure.so").unwrap(), ProtocolKind::Azure);

        let err = resolve("libugrlocplugin_gcs.so").unwrap_err();
        assert_eq!(err.status_code(), "001");
    }

    #[test]
    fn test_build_share_translates_scheme() {
        let spec = ShareSpec::new("s", "s3://data.s3.example.org/", "libugrlocplugin_s3.so")
            .with_setting("s3.pub_key", "AK")
            .with_setting("s3.priv_key", "SK")
            .with_setting("ssl_check", "false");

        let share = AdapterRegistry::default().build_share(&spec, 0).unwrap();
        assert_eq!(share.protocol, Some(ProtocolKind::S3));
        assert_eq!(share.uri.scheme, "http");
        assert!(share.check.is_ok());
    }

    #[test]
    fn test_davs_maps_to_https() {
        let spec = ShareSpec::new("d", "davs://dav.example.org/data", "libugrlocplugin_dav.so")
            .with_setting("cli_certificate", "/tmp/cert.pem")
            .with_setting("cli_private_key", "/tmp/key.pem");
        let share = AdapterRegistry::default().build_share(&spec, 0).unwrap();
        assert_eq!(share.uri.scheme, "https");
        assert_eq!(share.protocol_name(), "DAV");
    }

    #[test]
    fn test_unknown_plugin_is_marked_unsupported() {
        let spec = ShareSpec::new("g", "https://gcs.example.org/", "libugrlocplugin_gcs.so");
        let share = AdapterRegistry::default().build_share(&spec, 0).unwrap();
        assert_eq!(share.check, CheckState::UnsupportedPlugin);
        assert_eq!(share.protocol_name(), "Undefined");
        assert!(share.status().contains("[ERROR][UnsupportedPlugin][001]"));
    }

    #[test]
    fn test_empty_registry_treats_every_plugin_as_unsupported() {
        let spec = ShareSpec::new("s", "https://a.example.org/", "libugrlocplugin_s3.so");
        let share = AdapterRegistry::empty().build_share(&spec, 0).unwrap();
        assert_eq!(share.check, CheckState::UnsupportedPlugin);
    }
}
