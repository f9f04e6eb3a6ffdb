//! Command-line interface components
//!
//! This module contains CLI-specific code for the share_stats application,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, StatsArgs};
pub use commands::{handle_config, handle_stats};
pub use progress::{ProgressDisplay, ProgressTally};
