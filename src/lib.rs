//! dupescan - incremental content-hash cache
//!
//! Walks file trees, records BLAKE3 hashes per path in SQLite and avoids
//! rehashing anything already recorded. Partial (prefix) hashes give a cheap
//! first pass over large media trees; a later full scan escalates them.

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;
use yansi::Paint;

use crate::cache::{HashState, HashStore};
use crate::cli::{CheckArgs, Cli, Commands, ScanArgs};
use crate::config::Config;
use crate::engine::{check_tree, Reconciler, ScanSummary, Scanner};
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};
use crate::signal::ShutdownHandler;

/// Run the command described by `cli`.
///
/// Logging is expected to be initialized by the caller.
///
/// # Errors
///
/// Returns an error when configuration, the database or a scan root is
/// unusable. Per-file problems are reflected in the returned [`ExitCode`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }

    let mut config = match cli.config {
        Some(ref path) => Config::load_from_path(path)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        None => Config::load().context("Invalid configuration")?,
    };
    config.merge_cli(&cli);

    let db_path = config
        .database_path()
        .context("Cannot determine a data directory for the hash database; pass --db")?;
    let store = Arc::new(
        HashStore::open(&db_path)
            .with_context(|| format!("Cannot open hash database {}", db_path.display()))?,
    );
    log::debug!("Using hash database {}", db_path.display());

    let shutdown = signal::install_handler()?;

    match cli.command {
        Commands::Scan(ref args) => {
            config.merge_scan_args(args);
            run_scan(&cli, &config, store, &shutdown, args)
        }
        Commands::Check(ref args) => run_check(&store, &shutdown, args),
        Commands::Prune => run_prune(&cli, &store, &shutdown),
    }
}

fn run_scan(
    cli: &Cli,
    config: &Config,
    store: Arc<HashStore>,
    shutdown: &ShutdownHandler,
    args: &ScanArgs,
) -> anyhow::Result<ExitCode> {
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));
    let scan_config = config
        .scan_config(args.mode())
        .with_shutdown_flag(shutdown.get_flag())
        .with_progress_callback(progress);

    let scanner = Scanner::new(Arc::clone(&store), scan_config);
    let summary = scanner
        .scan(&args.path)
        .with_context(|| format!("Scan of {} failed", args.path.display()))?;

    match store.count() {
        Ok(records) => log::info!("Hash database now holds {records} records"),
        Err(e) => log::warn!("Cannot count records: {e}"),
    }
    if !cli.quiet {
        print_scan_summary(&summary);
    }
    Ok(ExitCode::from_outcome(summary.interrupted))
}

fn print_scan_summary(summary: &ScanSummary) {
    println!(
        "{} {} files in {:.2?} ({} mode)",
        "Scanned".bold(),
        summary.files_seen,
        summary.duration,
        summary.mode
    );
    println!(
        "  hashed:  {} ({} full, {} partial, {} escalated), {}",
        summary.hashed().green(),
        summary.hashed_full,
        summary.hashed_partial,
        summary.escalated,
        ByteSize::b(summary.bytes_hashed)
    );
    println!(
        "  skipped: {} files, {} directories, {} empty",
        summary.skipped, summary.dirs_skipped, summary.empty_files
    );
    if summary.errored() > 0 {
        println!("  errors:  {}", summary.errored().red());
    }
    if summary.interrupted {
        println!("{}", "Interrupted; completed work was saved.".yellow());
    }
}

fn run_check(
    store: &HashStore,
    shutdown: &ShutdownHandler,
    args: &CheckArgs,
) -> anyhow::Result<ExitCode> {
    let flag = shutdown.get_flag();
    let report = check_tree(
        store,
        &args.path,
        args.follow_symlinks,
        Some(&flag),
        |entry| match entry.state {
            HashState::NotFound => {
                println!("{} {}", "Not found:".red(), entry.path.display());
            }
            state => {
                println!(
                    "{} {} [{}]",
                    "Found:".green(),
                    entry.path.display(),
                    state
                );
            }
        },
    )
    .with_context(|| format!("Check of {} failed", args.path.display()))?;

    log::info!(
        "{} recorded, {} not recorded, {} errors",
        report.found,
        report.not_found,
        report.errors.len()
    );
    Ok(ExitCode::from_outcome(report.interrupted))
}

fn run_prune(cli: &Cli, store: &HashStore, shutdown: &ShutdownHandler) -> anyhow::Result<ExitCode> {
    let summary = Reconciler::new(store)
        .with_shutdown_flag(shutdown.get_flag())
        .run()
        .context("Prune failed")?;

    for path in &summary.removed {
        log::info!("pruned: {}", path.display());
        if !cli.quiet {
            println!("{} {}", "Pruned:".yellow(), path.display());
        }
    }
    if summary.kept_unverifiable > 0 {
        log::warn!(
            "{} records kept because their paths could not be checked",
            summary.kept_unverifiable
        );
    }
    Ok(ExitCode::from_outcome(summary.interrupted))
}
