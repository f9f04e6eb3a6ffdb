//! Command-line argument parsing for share_stats
//!
//! This module defines the CLI structure using clap derive macros: a `stats`
//! command that polls the configured shares and a `config` command that
//! manages the application settings file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// share_stats - Storage usage poller for federated shares
#[derive(Parser, Debug)]
#[command(
    name = "share_stats",
    version,
    about = "Poll federated storage shares for usage and quota",
    long_about = "Reads UGR share declarations, polls each S3, WebDAV and Azure endpoint once for its
usage and quota, and publishes the results to memcached, stdout or report files."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - errors only, no progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Application settings file
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub logfile: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Obtain and output storage stats
    Stats(StatsArgs),

    /// Manage the application settings file
    Config(ConfigArgs),
}

/// Arguments for the stats command
#[derive(Args, Debug, Clone, Default)]
pub struct StatsArgs {
    /// Share .conf files or directories (default from settings: /etc/ugr/conf.d)
    #[arg(short = 'c', long = "config", value_name = "PATH", num_args = 1..)]
    pub config_paths: Vec<PathBuf>,

    /// Only check these share ids
    #[arg(short = 'e', long = "endpoint", value_name = "ID", num_args = 1..)]
    pub endpoints: Vec<String>,

    /// Memcached host
    #[arg(long, value_name = "HOST")]
    pub memhost: Option<String>,

    /// Memcached port
    #[arg(long, value_name = "PORT")]
    pub memport: Option<u16>,

    /// Upload the stats to memcached
    #[arg(short = 'm', long = "memcached")]
    pub to_memcached: bool,

    /// Do not use memcached at all (no freshness check, no upload)
    #[arg(long, conflicts_with = "to_memcached")]
    pub no_cache: bool,

    /// Write a WLCG-style JSON report, optionally naming the file
    #[arg(
        short = 'j',
        long = "json",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "share_stats.json"
    )]
    pub json: Option<PathBuf>,

    /// Write a plain text report, optionally naming the file
    #[arg(
        short = 'p',
        long = "plain",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "share_stats.txt"
    )]
    pub plaintext: Option<PathBuf>,

    /// Directory for relative --json and --plain file names
    #[arg(short = 'o', long = "output-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Print the stats on stdout
    #[arg(long)]
    pub stdout: bool,

    /// Include diagnostics in the stdout output
    #[arg(long)]
    pub debug: bool,

    /// Maximum endpoints polled at once
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Give up on an endpoint after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,
}

/// Arguments for settings management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Settings management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,

    /// Write a commented default settings file
    Init {
        /// Destination (default: user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the path of the user settings file
    Path,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl StatsArgs {
    /// Check argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == Some(0) {
            return Err("--max-concurrency must be greater than 0".to_string());
        }
        if self.deadline == Some(0) {
            return Err("--deadline must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        self.deadline.map(Duration::from_secs)
    }

    /// Resolve a report file name against `--output-dir`
    pub fn output_path(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.output_dir.join(file)
        }
    }

    /// Whether any report destination was requested
    pub fn has_output(&self) -> bool {
        self.stdout || self.json.is_some() || self.plaintext.is_some() || self.to_memcached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_flags_parse() {
        let cli = Cli::try_parse_from([
            "share_stats",
            "stats",
            "-c",
            "/etc/ugr/conf.d",
            "/tmp/extra.conf",
            "-e",
            "s3-a",
            "--memhost",
            "10.0.0.5",
            "-m",
            "-j",
            "--stdout",
        ])
        .unwrap();

        let Commands::Stats(args) = cli.command else {
            panic!("expected stats command");
        };
        assert_eq!(args.config_paths.len(), 2);
        assert_eq!(args.endpoints, vec!["s3-a".to_string()]);
        assert_eq!(args.memhost.as_deref(), Some("10.0.0.5"));
        assert!(args.to_memcached);
        assert_eq!(args.json, Some(PathBuf::from("share_stats.json")));
        assert!(args.plaintext.is_none());
        assert!(args.has_output());
    }

    #[test]
    fn test_no_cache_conflicts_with_upload() {
        let result = Cli::try_parse_from(["share_stats", "stats", "-m", "--no-cache"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_stats_args_validation() {
        let args = StatsArgs {
            max_concurrency: Some(0),
            ..Default::default()
        };
        assert!(args.validate().is_err());

        let args = StatsArgs {
            deadline: Some(30),
            ..Default::default()
        };
        assert!(args.validate().is_ok());
        assert_eq!(args.poll_deadline(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_output_path_resolution() {
        let args = StatsArgs {
            output_dir: PathBuf::from("/var/www"),
            ..Default::default()
        };
        assert_eq!(
            args.output_path(Path::new("stats.json")),
            PathBuf::from("/var/www/stats.json")
        );
        assert_eq!(
            args.output_path(Path::new("/tmp/stats.json")),
            PathBuf::from("/tmp/stats.json")
        );
    }

    #[test]
    fn test_log_level() {
        let quiet = Cli {
            global: GlobalArgs {
                quiet: true,
                ..Default::default()
            },
            command: Commands::Config(ConfigArgs {
                action: ConfigAction::Show,
            }),
        };
        let verbose = Cli {
            global: GlobalArgs {
                verbose: true,
                ..Default::default()
            },
            command: Commands::Config(ConfigArgs {
                action: ConfigAction::Path,
            }),
        };

        assert_eq!(quiet.log_level(), Some(tracing::Level::ERROR));
        assert_eq!(verbose.log_level(), Some(tracing::Level::INFO));
    }
}
