//! Read-only report of recorded hash states under a tree.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{HashState, HashStore};
use crate::scanner::{ScanError, WalkEvent, Walker};

use super::orchestrator::ScanRunError;

/// One file and what the store knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEntry {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Recorded state
    pub state: HashState,
}

/// Totals from [`check_tree`].
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Files with a record (any state other than not found)
    pub found: usize,
    /// Files with no record
    pub not_found: usize,
    /// Entries that could not be read or looked up
    pub errors: Vec<ScanError>,
    /// Whether a shutdown request stopped the walk early
    pub interrupted: bool,
}

/// Walk `root` and report the recorded state of every regular file.
///
/// Nothing is hashed and nothing is written. Zero-byte files are looked up
/// like any other file; a scan never records them, so they report as not
/// found. `on_entry` is called once per file in traversal order.
///
/// # Errors
///
/// Returns [`ScanRunError`] if the root is missing or the store fails.
pub fn check_tree<F>(
    store: &HashStore,
    root: &Path,
    follow_symlinks: bool,
    shutdown: Option<&Arc<AtomicBool>>,
    mut on_entry: F,
) -> Result<CheckReport, ScanRunError>
where
    F: FnMut(&CheckEntry),
{
    if let Err(e) = std::fs::symlink_metadata(root) {
        if e.kind() == std::io::ErrorKind::NotFound {
            return Err(ScanRunError::PathNotFound(root.to_path_buf()));
        }
    }
    let walker = Walker::new(root, follow_symlinks).map_err(ScanRunError::Start)?;
    let mut report = CheckReport::default();

    for event in walker {
        if shutdown.is_some_and(|f| f.load(Ordering::SeqCst)) {
            report.interrupted = true;
            break;
        }
        match event {
            WalkEvent::Directory(_) => {}
            WalkEvent::File { path, .. } => {
                let state = match store.lookup(&path) {
                    Ok(state) => state,
                    Err(e) if !e.is_fatal() => {
                        report.errors.push(ScanError::from_store(path, e));
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                if state == HashState::NotFound {
                    report.not_found += 1;
                } else {
                    report.found += 1;
                }
                on_entry(&CheckEntry { path, state });
            }
            WalkEvent::Error(err) => {
                log::warn!("Skipping unreadable entry: {err}");
                report.errors.push(err);
            }
        }
    }
    Ok(report)
}
