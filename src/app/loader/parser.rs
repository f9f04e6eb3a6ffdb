//! Line parser for share configuration files
//!
//! Two kinds of lines matter; everything else is ignored:
//!
//! ```text
//! glb.locplugin[]: /usr/lib64/ugr/libugrlocplugin_s3.so my-bucket 15 s3s://bucket.example.org
//! locplugin.my-bucket.s3.priv_key: secret
//! locplugin.*.conn_timeout: 30
//! ```
//!
//! A declaration makes its id the current one for the file. Setting lines must
//! name either the current id or `*` (a global default applied to every share
//! lacking that setting).

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::app::loader::LoaderConfig;
use crate::app::models::ShareSpec;
use crate::constants::config_files;
use crate::errors::{ConfigError, ConfigResult};

/// Accumulates share declarations and settings across files
#[derive(Debug, Default)]
pub struct ConfigParser {
    specs: BTreeMap<String, ShareSpec>,
    globals: BTreeMap<String, String>,
    filter: LoaderConfig,
}

impl ConfigParser {
    pub fn new(filter: LoaderConfig) -> Self {
        Self {
            specs: BTreeMap::new(),
            globals: BTreeMap::new(),
            filter,
        }
    }

    /// Parse one file's content
    ///
    /// `file` is only used for error reporting.
    pub fn parse_str(&mut self, file: &Path, content: &str) -> ConfigResult<()> {
        let mut current_id: Option<String> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.contains(config_files::DECLARATION_MARKER) {
                if let Some(id) = self.declare(line) {
                    current_id = Some(id);
                }
            } else if line.starts_with(config_files::SETTING_MARKER) {
                self.setting(file, index + 1, line, current_id.as_deref())?;
            }
        }

        Ok(())
    }

    fn declare(&mut self, line: &str) -> Option<String> {
        let fields: Vec<&str> = line.split_whitespace().skip(1).collect();
        let &[plugin_path, id, _concurrency, url] = fields.as_slice() else {
            warn!("Ignoring malformed share declaration: \"{}\"", line);
            return None;
        };

        let plugin = plugin_path.rsplit('/').next().unwrap_or(plugin_path);

        if self.filter.accepts(id) {
            debug!("[{}] Declared with plugin {} at {}", id, plugin, url);
            let spec = self
                .specs
                .entry(id.to_string())
                .or_insert_with(|| ShareSpec::new(id, url, plugin));
            spec.url = url.to_string();
            spec.plugin = plugin.to_string();
        }

        Some(id.to_string())
    }

    fn setting(
        &mut self,
        file: &Path,
        line_number: usize,
        line: &str,
        current_id: Option<&str>,
    ) -> ConfigResult<()> {
        let Some((key, value)) = line.split_once(':') else {
            return Ok(());
        };
        let key = key.trim();
        let value = value.trim();

        let mut parts = key.splitn(3, '.');
        let (Some(_), Some(id), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Ok(());
        };

        if id == config_files::GLOBAL_ID {
            self.globals.insert(name.to_string(), value.to_string());
            return Ok(());
        }

        if current_id != Some(id) {
            return Err(ConfigError::SettingIdMismatch {
                file: file.to_path_buf(),
                line_number,
                line: key.to_string(),
            });
        }

        if let Some(spec) = self.specs.get_mut(id) {
            spec.settings.insert(name.to_string(), value.to_string());
        }

        Ok(())
    }

    /// Apply global defaults and hand back the shares
    pub fn finish(self) -> BTreeMap<String, ShareSpec> {
        let Self {
            mut specs, globals, ..
        } = self;

        for spec in specs.values_mut() {
            for (name, value) in &globals {
                spec.settings
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        specs
    }
}
