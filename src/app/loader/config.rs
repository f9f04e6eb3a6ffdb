//! Loader configuration types and defaults

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::config_files;

/// Where share configuration comes from and which shares to keep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Main federation config, prepended to the file list when it exists
    pub main_config_file: Option<PathBuf>,
    /// Files or directories searched when none are given on the command line
    pub config_paths: Vec<PathBuf>,
    /// Share ids to keep; empty keeps all
    pub id_filter: BTreeSet<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            main_config_file: Some(PathBuf::from(config_files::MAIN_CONFIG_FILE)),
            config_paths: vec![PathBuf::from(config_files::DEFAULT_CONFIG_DIR)],
            id_filter: BTreeSet::new(),
        }
    }
}

impl LoaderConfig {
    /// Set the main config file, `None` disables it
    pub fn with_main_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.main_config_file = path;
        self
    }

    /// Replace the search paths
    pub fn with_config_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.config_paths = paths;
        self
    }

    /// Keep only the given share ids
    pub fn with_id_filter<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_filter = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a share id passes the filter
    pub fn accepts(&self, id: &str) -> bool {
        self.id_filter.is_empty() || self.id_filter.contains(id)
    }
}
