//! Removal of records whose files no longer exist.
//!
//! Pruning runs in two phases. First every stored path is checked against
//! the filesystem, then the gone ones are deleted in a single transaction.
//! A shutdown request during the first phase leaves the store untouched.
//!
//! A record is only removed when the filesystem says the path is gone
//! (`NotFound`, or a parent component is no longer a directory). Paths that
//! cannot be checked for any other reason are kept.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{HashStore, StoreError};

/// Outcome of a prune pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneSummary {
    /// Records looked at
    pub examined: usize,
    /// Paths whose records were deleted, in sorted order
    pub removed: Vec<PathBuf>,
    /// Records kept because their path could not be checked
    pub kept_unverifiable: usize,
    /// Whether a shutdown request stopped the pass early
    pub interrupted: bool,
}

/// Reconciles the hash store with the filesystem.
#[derive(Debug)]
pub struct Reconciler<'a> {
    store: &'a HashStore,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Liveness {
    Live,
    Gone,
    Unknown,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for `store`.
    #[must_use]
    pub fn new(store: &'a HashStore) -> Self {
        Self {
            store,
            shutdown_flag: None,
        }
    }

    /// Stop early when `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Delete every record whose path no longer refers to a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if listing or deleting records fails. No
    /// records are deleted in that case.
    pub fn run(&self) -> Result<PruneSummary, StoreError> {
        let paths = self.store.list_paths()?;
        log::info!("Checking {} records against the filesystem", paths.len());

        let mut summary = PruneSummary::default();
        let mut gone = Vec::new();
        for path in paths {
            if self.is_shutdown_requested() {
                log::info!("Prune interrupted, no records removed");
                summary.interrupted = true;
                return Ok(summary);
            }
            summary.examined += 1;
            match liveness(&path) {
                Liveness::Live => {}
                Liveness::Gone => gone.push(path),
                Liveness::Unknown => summary.kept_unverifiable += 1,
            }
        }

        if !gone.is_empty() {
            let deleted = self.store.delete_many(&gone)?;
            log::debug!("Deleted {} of {} stale records", deleted, gone.len());
        }
        log::info!(
            "Prune complete: {} examined, {} removed, {} unverifiable",
            summary.examined,
            gone.len(),
            summary.kept_unverifiable
        );
        summary.removed = gone;
        Ok(summary)
    }
}

fn liveness(path: &Path) -> Liveness {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Liveness::Live,
        Ok(_) => Liveness::Gone,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            Liveness::Gone
        }
        Err(e) => {
            log::warn!("Cannot check {}, keeping record: {}", path.display(), e);
            Liveness::Unknown
        }
    }
}
