//! Scan orchestration over the hash cache.
//!
//! # Overview
//!
//! [`Scanner::scan`] walks a tree and, for every regular file, looks up its
//! recorded [`HashState`], asks [`decide`] what to do, hashes when needed and
//! writes the outcome back through the [`HashStore`].
//!
//! Files that need hashing are buffered and hashed in batches on a bounded
//! rayon pool; each worker writes its own result through the store's single
//! writer. Lookups and directory checks happen on the walking thread.
//!
//! # Directory short-circuit
//!
//! Before descending into a directory, its immediate non-empty files are
//! checked in one batch query. The check is mode-aware: a partial scan
//! accepts any recorded hash, a full scan accepts only full hashes, so a
//! directory of partial records is always revisited for escalation.
//!
//! - Leaf directories whose files all qualify are skipped entirely.
//! - Directories with subdirectories are never pruned; their own files are
//!   counted as skipped without per-file lookups and traversal continues
//!   into the subdirectories.
//!
//! # Failure model
//!
//! Per-entry problems (unreadable files, vanished paths, undecodable names)
//! are logged, collected in [`ScanSummary::errors`] and the scan moves on.
//! Store failures abort the scan with [`ScanRunError::Store`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::cache::{HashState, HashStore, ScanMode, StoreError};
use crate::progress::ProgressCallback;
use crate::scanner::{
    list_dir, DigestMode, Hasher, ScanError, WalkEvent, Walker, DEFAULT_MMAP_THRESHOLD,
    DEFAULT_PARTIAL_THRESHOLD,
};

use super::resolver::decide;

/// Default number of hashing threads.
pub const DEFAULT_IO_THREADS: usize = 4;

/// Default number of files hashed per parallel batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Settings for one scan invocation.
#[derive(Clone)]
pub struct ScanConfig {
    /// Which hash the scan asks for.
    pub mode: ScanMode,
    /// Prefix length for partial hashes, and the small-file cutoff.
    pub partial_threshold: u64,
    /// Number of concurrent digest workers.
    pub io_threads: usize,
    /// Files buffered before a parallel hashing batch runs.
    pub batch_size: usize,
    /// Enable the directory short-circuit.
    pub skip_known_dirs: bool,
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,
    /// Use memory-mapped full hashing for large files.
    pub use_mmap: bool,
    /// Minimum size for memory-mapped full hashing.
    pub mmap_threshold: u64,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("mode", &self.mode)
            .field("partial_threshold", &self.partial_threshold)
            .field("io_threads", &self.io_threads)
            .field("batch_size", &self.batch_size)
            .field("skip_known_dirs", &self.skip_known_dirs)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("use_mmap", &self.use_mmap)
            .field("mmap_threshold", &self.mmap_threshold)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            partial_threshold: DEFAULT_PARTIAL_THRESHOLD,
            io_threads: DEFAULT_IO_THREADS,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_known_dirs: true,
            follow_symlinks: false,
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ScanConfig {
    /// Set the scan mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the partial hash threshold in bytes.
    #[must_use]
    pub fn with_partial_threshold(mut self, bytes: u64) -> Self {
        self.partial_threshold = bytes;
        self
    }

    /// Set the number of hashing threads (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the hashing batch size (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Enable or disable the directory short-circuit.
    #[must_use]
    pub fn with_skip_known_dirs(mut self, enabled: bool) -> Self {
        self.skip_known_dirs = enabled;
        self
    }

    /// Follow symbolic links during traversal.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set the memory-map threshold; `None` disables memory mapping.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: Option<u64>) -> Self {
        match threshold {
            Some(bytes) => {
                self.use_mmap = true;
                self.mmap_threshold = bytes;
            }
            None => self.use_mmap = false,
        }
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Counters and collected errors from one scan.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Mode the scan ran in
    pub mode: ScanMode,
    /// Regular files visited by the traversal
    pub files_seen: usize,
    /// Files whose full hash was computed and recorded
    pub hashed_full: usize,
    /// Files whose partial hash was computed and recorded
    pub hashed_partial: usize,
    /// Of `hashed_full`, files that went from partial to full
    pub escalated: usize,
    /// Files left alone because their record already sufficed
    pub skipped: usize,
    /// Zero-byte files, never recorded
    pub empty_files: usize,
    /// Directories pruned by the short-circuit
    pub dirs_skipped: usize,
    /// Bytes read by the digest engine
    pub bytes_hashed: u64,
    /// Entries that could not be processed
    pub errors: Vec<ScanError>,
    /// Whether the scan stopped early on a shutdown request
    pub interrupted: bool,
    /// Wall-clock duration
    pub duration: Duration,
}

impl ScanSummary {
    /// Files hashed in either mode.
    #[must_use]
    pub fn hashed(&self) -> usize {
        self.hashed_full + self.hashed_partial
    }

    /// Number of entries that failed.
    #[must_use]
    pub fn errored(&self) -> usize {
        self.errors.len()
    }

    fn record_error(&mut self, err: ScanError) {
        log::warn!("Skipping unreadable entry: {err}");
        self.errors.push(err);
    }

    fn absorb(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Hashed {
                mode,
                escalated,
                bytes,
            } => {
                match mode {
                    ScanMode::Full => self.hashed_full += 1,
                    ScanMode::Partial => self.hashed_partial += 1,
                }
                if escalated {
                    self.escalated += 1;
                }
                self.bytes_hashed += bytes;
            }
            Outcome::Empty => self.empty_files += 1,
            Outcome::Failed(err) => self.record_error(err),
            Outcome::Cancelled => self.interrupted = true,
        }
    }
}

/// Errors that abort a scan.
#[derive(thiserror::Error, Debug)]
pub enum ScanRunError {
    /// The scan root does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The scan root could not be resolved.
    #[error("Cannot start scan: {0}")]
    Start(#[source] ScanError),

    /// The hash store failed; later decisions would be unreliable.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The hashing thread pool could not be created.
    #[error("Failed to build hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A file waiting to be hashed.
struct Job {
    path: PathBuf,
    scan_mode: ScanMode,
    digest_mode: DigestMode,
    escalation: bool,
}

enum Outcome {
    Hashed {
        mode: ScanMode,
        escalated: bool,
        bytes: u64,
    },
    Empty,
    Failed(ScanError),
    Cancelled,
}

/// Drives scans against a shared [`HashStore`].
pub struct Scanner {
    store: Arc<HashStore>,
    config: ScanConfig,
    hasher: Hasher,
}

impl Scanner {
    /// Create a scanner writing to `store`.
    #[must_use]
    pub fn new(store: Arc<HashStore>, config: ScanConfig) -> Self {
        let mut hasher = Hasher::new()
            .with_mmap(config.use_mmap)
            .with_mmap_threshold(config.mmap_threshold);
        if let Some(ref callback) = config.progress_callback {
            hasher = hasher.with_progress(Arc::clone(callback));
        }
        Self {
            store,
            config,
            hasher,
        }
    }

    /// The configuration this scanner runs with.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `root`, hashing and recording files as the scan mode requires.
    ///
    /// `root` may be a directory or a single file.
    ///
    /// # Errors
    ///
    /// Returns [`ScanRunError`] if the root is missing or the store fails.
    /// Per-file problems are reported in [`ScanSummary::errors`] instead.
    pub fn scan(&self, root: &Path) -> Result<ScanSummary, ScanRunError> {
        let start = Instant::now();
        match std::fs::symlink_metadata(root) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanRunError::PathNotFound(root.to_path_buf()));
            }
            _ => {}
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .thread_name(|i| format!("dupescan-hash-{i}"))
            .build()?;
        let mut walker =
            Walker::new(root, self.config.follow_symlinks).map_err(ScanRunError::Start)?;

        log::info!(
            "Scanning {} ({} mode, partial limit {} bytes)",
            walker.root().display(),
            self.config.mode,
            self.config.partial_threshold
        );
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_scan_start(walker.root().to_string_lossy().as_ref());
        }

        let mut summary = ScanSummary {
            mode: self.config.mode,
            ..Default::default()
        };
        let result = self.drive(&pool, &mut walker, &mut summary);

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_scan_end();
        }
        result?;

        summary.duration = start.elapsed();
        if summary.interrupted {
            log::info!("Scan interrupted by shutdown signal");
        }
        log::info!(
            "Scan complete: {} hashed ({} full, {} partial, {} escalated), {} skipped, \
             {} empty, {} errors, {} directories pruned in {:.2?}",
            summary.hashed(),
            summary.hashed_full,
            summary.hashed_partial,
            summary.escalated,
            summary.skipped,
            summary.empty_files,
            summary.errored(),
            summary.dirs_skipped,
            summary.duration
        );
        Ok(summary)
    }

    fn drive(
        &self,
        pool: &ThreadPool,
        walker: &mut Walker,
        summary: &mut ScanSummary,
    ) -> Result<(), ScanRunError> {
        let mut pending: Vec<Job> = Vec::with_capacity(self.config.batch_size);
        // Directories whose own files are all known but which still have
        // subdirectories to visit.
        let mut known_dirs: HashSet<PathBuf> = HashSet::new();

        while let Some(event) = walker.next() {
            if self.config.is_shutdown_requested() {
                summary.interrupted = true;
                break;
            }

            match event {
                WalkEvent::Directory(dir) => match self.check_directory(&dir)? {
                    DirVerdict::Prune => {
                        log::debug!("-> skip {} (already processed)", dir.display());
                        summary.dirs_skipped += 1;
                        walker.skip_subtree();
                    }
                    DirVerdict::FilesKnown => {
                        log::debug!("-> files of {} already processed", dir.display());
                        known_dirs.insert(dir);
                    }
                    DirVerdict::Visit => {}
                },
                WalkEvent::File { path, size } => {
                    summary.files_seen += 1;
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_file_visited(path.to_string_lossy().as_ref());
                    }

                    if size == 0 {
                        log::debug!("skipping empty file: {}", path.display());
                        summary.empty_files += 1;
                        continue;
                    }
                    if path.parent().is_some_and(|p| known_dirs.contains(p)) {
                        log::trace!("skipping: {}", path.display());
                        summary.skipped += 1;
                        continue;
                    }

                    if let Some(job) = self.plan(path, summary)? {
                        pending.push(job);
                        if pending.len() >= self.config.batch_size {
                            self.flush(pool, &mut pending, summary)?;
                        }
                    }
                }
                WalkEvent::Error(err) => summary.record_error(err),
            }
        }

        // Finish whatever was queued; workers observe the shutdown flag
        // themselves, so nothing new starts after a stop request.
        self.flush(pool, &mut pending, summary)?;
        if self.config.is_shutdown_requested() {
            summary.interrupted = true;
        }
        Ok(())
    }

    fn check_directory(&self, dir: &Path) -> Result<DirVerdict, StoreError> {
        if !self.config.skip_known_dirs {
            return Ok(DirVerdict::Visit);
        }

        let listing = match list_dir(dir, self.config.follow_symlinks) {
            Ok(listing) => listing,
            Err(e) => {
                log::debug!("Cannot list {}, visiting normally: {}", dir.display(), e);
                return Ok(DirVerdict::Visit);
            }
        };
        log::info!(
            "processing: {} [{} files]",
            dir.display(),
            listing.files.len()
        );
        if listing.files.is_empty() {
            return Ok(DirVerdict::Visit);
        }

        if !self
            .store
            .batch_satisfies(&listing.files, self.config.mode)?
        {
            return Ok(DirVerdict::Visit);
        }
        Ok(if listing.has_subdirs {
            DirVerdict::FilesKnown
        } else {
            DirVerdict::Prune
        })
    }

    /// Look up `path` and turn the decision into a job, or count a skip.
    fn plan(&self, path: PathBuf, summary: &mut ScanSummary) -> Result<Option<Job>, StoreError> {
        let state = match self.store.lookup(&path) {
            Ok(state) => state,
            Err(e) if !e.is_fatal() => {
                summary.record_error(ScanError::from_store(path, e));
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let action = decide(state, self.config.mode);
        match (
            action.scan_mode(),
            action.digest_mode(self.config.partial_threshold),
        ) {
            (Some(scan_mode), Some(digest_mode)) => Ok(Some(Job {
                path,
                scan_mode,
                digest_mode,
                escalation: state == HashState::Partial,
            })),
            _ => {
                log::trace!("skipping: {} ({})", path.display(), state);
                summary.skipped += 1;
                Ok(None)
            }
        }
    }

    /// Hash every pending job on the pool and fold the outcomes in.
    ///
    /// All jobs run to completion before this returns, even when one of
    /// them hit a store failure; the first such failure is then returned.
    fn flush(
        &self,
        pool: &ThreadPool,
        pending: &mut Vec<Job>,
        summary: &mut ScanSummary,
    ) -> Result<(), StoreError> {
        if pending.is_empty() {
            return Ok(());
        }
        let jobs = std::mem::take(pending);
        log::debug!("Hashing batch of {} files", jobs.len());

        let outcomes: Vec<Result<Outcome, StoreError>> =
            pool.install(|| jobs.into_par_iter().map(|job| self.run_job(job)).collect());

        let mut fatal = None;
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    log::error!("Hash store failure: {e}");
                    fatal.get_or_insert(e);
                }
            }
        }
        fatal.map_or(Ok(()), Err)
    }

    fn run_job(&self, job: Job) -> Result<Outcome, StoreError> {
        if self.config.is_shutdown_requested() {
            return Ok(Outcome::Cancelled);
        }

        match job.digest_mode {
            DigestMode::Full => log::debug!("hashing: {}", job.path.display()),
            DigestMode::Partial(_) => log::debug!("hashing (partial): {}", job.path.display()),
        }

        let digest = match self.hasher.digest(&job.path, job.digest_mode) {
            Ok(digest) => digest,
            Err(e) => return Ok(Outcome::Failed(e.into())),
        };
        if digest.size == 0 {
            log::debug!("skipping empty file: {}", digest.path.display());
            return Ok(Outcome::Empty);
        }

        let threshold = self.config.partial_threshold;
        match self.store.upsert(
            &digest.path,
            digest.size,
            &digest.hex,
            job.scan_mode,
            threshold,
        ) {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                return Ok(Outcome::Failed(ScanError::from_store(digest.path, e)));
            }
            Err(e) => return Err(e),
        }

        let bytes = match job.digest_mode {
            DigestMode::Full => digest.size,
            DigestMode::Partial(limit) => digest.size.min(limit),
        };
        Ok(Outcome::Hashed {
            mode: job.scan_mode,
            escalated: job.escalation && job.scan_mode == ScanMode::Full,
            bytes,
        })
    }
}

enum DirVerdict {
    Visit,
    FilesKnown,
    Prune,
}
