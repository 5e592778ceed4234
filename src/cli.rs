//! Command-line interface definitions for dupescan.
//!
//! Global options (verbosity, color, database location) apply to every
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Record partial hashes for a media library
//! dupescan scan --partial ~/Videos
//!
//! # Escalate everything to full hashes
//! dupescan scan ~/Videos
//!
//! # See what the cache knows about a tree
//! dupescan check ~/Videos/2024
//!
//! # Drop records of deleted files
//! dupescan prune
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::cache::ScanMode;

/// Incremental content-hash cache for large file trees.
///
/// dupescan records a BLAKE3 hash per file in a SQLite database so that
/// repeated scans only hash what changed, and cheap partial hashes can later
/// be escalated to full ones.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Path to the hash database
    ///
    /// Defaults to a platform-specific data directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Path to a configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash new files under a path and record the results
    Scan(ScanArgs),
    /// Report which files under a path have cached hashes
    Check(CheckArgs),
    /// Remove records of files that no longer exist
    Prune,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// File or directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Record partial hashes only (first --limit MiB of each file)
    #[arg(short, long)]
    pub partial: bool,

    /// Partial hash size in MiB
    ///
    /// Files smaller than this are always fully hashed.
    #[arg(long, value_name = "MiB", value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Number of I/O threads for hashing
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub io_threads: Option<u64>,

    /// Visit every directory even when all its files are already recorded
    #[arg(long)]
    pub no_dir_skip: bool,

    /// Follow symbolic links during scan
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,
}

impl ScanArgs {
    /// Scan mode selected by the flags.
    #[must_use]
    pub fn mode(&self) -> ScanMode {
        if self.partial {
            ScanMode::Partial
        } else {
            ScanMode::Full
        }
    }
}

/// Arguments for the check subcommand.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// File or directory to check (zero-byte files are never recorded and show as not found)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,
}
