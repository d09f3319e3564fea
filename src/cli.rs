//! Command-line interface definitions for flashback.
//!
//! Shared between the main binary and xtask (man page generation).
//!
//! Note: Field-level documentation is provided via clap attributes, so we
//! allow missing_docs for this module.

#![allow(missing_docs)]

use clap::{ArgGroup, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for flashback.
#[derive(Parser)]
#[command(
    name = "flashback",
    version = crate::VERSION,
    about = "Mirror hand-picked files onto a removable drive",
    long_about = "Keeps a manifest of individual files and copies the new or changed ones \
                  to a removable drive when it is plugged in"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest file to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Destination root to use instead of searching for a mounted drive
    #[arg(long, global = true, value_name = "PATH")]
    pub dest: Option<PathBuf>,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a manifest that tracks only itself
    Init {
        /// Overwrite an existing manifest
        #[arg(short, long)]
        force: bool,
    },

    /// Show what a sync would do
    Status {
        /// One line per entry: status code and name
        #[arg(short, long)]
        short: bool,
    },

    /// Print every tracked file with its recorded metadata
    List,

    /// Start tracking files (opens the file picker when no path is given)
    Add {
        /// Files to track
        paths: Vec<String>,
    },

    /// Stop tracking the entry at a 1-based index
    Rm {
        /// Index as shown by `list` or `status`
        index: usize,
    },

    /// Copy new and changed files to the drive
    #[command(group(ArgGroup::new("mode").args(["all", "select"])))]
    Sync {
        /// Copy everything that needs it, without prompting
        #[arg(short, long)]
        all: bool,

        /// Copy these indices without prompting, e.g. "1 3,4"
        #[arg(short, long, value_name = "LIST")]
        select: Option<String>,
    },

    /// Get and set configuration values
    Config {
        /// Configuration key (e.g. destination.root)
        key: Option<String>,

        /// Value to set
        value: Option<String>,

        /// Remove the value
        #[arg(long, conflicts_with = "value")]
        unset: bool,

        /// Show all configuration values
        #[arg(short, long)]
        list: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_modes_conflict() {
        assert!(Cli::try_parse_from(["flashback", "sync", "--all", "--select", "1"]).is_err());
        assert!(Cli::try_parse_from(["flashback", "sync", "--select", "1 2"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["flashback", "status", "--dest", "/mnt/usb", "-q"])
            .expect("valid arguments");
        assert!(cli.quiet);
        assert_eq!(cli.dest, Some(PathBuf::from("/mnt/usb")));
    }
}
