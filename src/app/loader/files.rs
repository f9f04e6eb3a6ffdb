//! Configuration file discovery

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::constants::config_files;
use crate::errors::{ConfigError, ConfigResult};

/// Expand files and directories into the ordered list of files to parse
///
/// Directories contribute their `*.conf` files in sorted order. The main
/// config file, when given and present, comes first. Invalid paths are logged
/// and skipped.
pub async fn discover(paths: &[PathBuf], main_config: Option<&Path>) -> ConfigResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    if let Some(main) = main_config {
        if is_file(main).await {
            files.push(main.to_path_buf());
        } else {
            warn!(
                "Main config file \"{}\" could not be found. Proceeding without it.",
                main.display()
            );
        }
    }

    for path in paths {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                let found = conf_files_in(path).await?;
                debug!("Found {} config files in {}", found.len(), path.display());
                files.extend(found);
            }
            Ok(meta) if meta.is_file() => files.push(path.clone()),
            _ => error!("Invalid path: {}", path.display()),
        }
    }

    if files.is_empty() {
        return Err(ConfigError::NoConfigFilesFound {
            paths: paths.to_vec(),
        });
    }

    Ok(files)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn conf_files_in(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_conf = path
            .extension()
            .map(|ext| ext == config_files::CONFIG_EXTENSION)
            .unwrap_or(false);
        if is_conf && is_file(&path).await {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}
