//! Share configuration loading
//!
//! This module turns the federation's line-oriented configuration files into
//! raw [`ShareSpec`] records keyed by share id.
//!
//! # Key Features
//!
//! - **File discovery**: Paths may be files or directories of `*.conf` files,
//!   with the main federation config prepended when present
//! - **Strict id checking**: A setting naming a share other than the one being
//!   declared aborts the load with the offending file and line
//! - **Global defaults**: `locplugin.*.<setting>` lines fill in settings a
//!   share does not set itself
//! - **Id filtering**: Loads can be narrowed to a set of share ids
//!
//! # Module Organization
//!
//! - [`config`] - Loader configuration (paths, main config, id filter)
//! - [`files`] - File and directory discovery
//! - [`parser`] - Line grammar and global default handling

pub mod config;
pub mod files;
pub mod parser;

pub use config::LoaderConfig;
pub use files::discover;
pub use parser::ConfigParser;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::app::models::ShareSpec;
use crate::errors::{ConfigError, ConfigResult};

/// Discovers, reads and parses share configuration files
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config: LoaderConfig,
}

impl ConfigLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Files that would be parsed for the given paths
    ///
    /// Falls back to the configured default paths when `paths` is empty.
    pub async fn discover(&self, paths: &[PathBuf]) -> ConfigResult<Vec<PathBuf>> {
        let paths = if paths.is_empty() {
            self.config.config_paths.as_slice()
        } else {
            paths
        };
        discover(paths, self.config.main_config_file.as_deref()).await
    }

    /// Load every share declared under `paths`
    pub async fn load(&self, paths: &[PathBuf]) -> ConfigResult<BTreeMap<String, ShareSpec>> {
        let files = self.discover(paths).await?;
        let mut parser = ConfigParser::new(self.config.clone());

        for file in &files {
            match read_text(file).await? {
                Some(content) => parser.parse_str(file, &content)?,
                None => continue,
            }
        }

        let specs = parser.finish();
        if specs.is_empty() {
            return Err(ConfigError::NoEndpointsFound { files });
        }

        info!("Loaded {} share(s) from {} file(s)", specs.len(), files.len());
        Ok(specs)
    }
}

/// Read a config file as UTF-8, `None` when it is not valid UTF-8
async fn read_text(path: &Path) -> ConfigResult<Option<String>> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match String::from_utf8(bytes) {
        Ok(content) => Ok(Some(content)),
        Err(e) => {
            error!(
                "Skipping config file \"{}\", it is not valid UTF-8: {}",
                path.display(),
                e
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader() -> ConfigLoader {
        ConfigLoader::new(LoaderConfig::default().with_main_config_file(None))
    }

    #[tokio::test]
    async fn test_load_across_files_with_globals() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("00-globals.conf"),
            "locplugin.*.storagestats.frequency: 300\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("10-dav.conf"),
            "glb.locplugin[]: /usr/lib64/ugr/libugrlocplugin_dav.so site 10 davs://dav.example.org/store\n\
             locplugin.site.cli_certificate: /etc/grid-security/cert.pem\n",
        )
        .unwrap();

        let specs = loader().load(&[dir.path().to_path_buf()]).await.unwrap();
        let site = &specs["site"];
        assert_eq!(site.settings["storagestats.frequency"], "300");
        assert_eq!(site.settings["cli_certificate"], "/etc/grid-security/cert.pem");
    }

    #[tokio::test]
    async fn test_no_shares_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty.conf"), "# nothing here\n").unwrap();

        let result = loader().load(&[dir.path().to_path_buf()]).await;
        assert!(matches!(result, Err(ConfigError::NoEndpointsFound { .. })));
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.conf"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(
            dir.path().join("b.conf"),
            "glb.locplugin[]: /lib/libugrlocplugin_s3.so b 1 s3s://b.example.org/\n",
        )
        .unwrap();

        let specs = loader().load(&[dir.path().to_path_buf()]).await.unwrap();
        assert!(specs.contains_key("b"));
    }
}
