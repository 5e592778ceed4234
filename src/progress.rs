//! Progress reporting utilities using indicatif.
//!
//! The [`Progress`] struct implements [`ProgressCallback`] and shows two
//! lines while a scan runs: a spinner counting visited files and a byte
//! counter with hashing throughput.
//!
//! Progress is purely observational. Digests and scan decisions never
//! depend on it.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Receives progress updates from the scanner and the digest engine.
pub trait ProgressCallback: Send + Sync {
    /// Called once when a scan starts.
    fn on_scan_start(&self, root: &str);

    /// Called for each file the traversal visits.
    fn on_file_visited(&self, path: &str);

    /// Called as file content is read for hashing.
    fn on_bytes_hashed(&self, _bytes: u64) {}

    /// Called once when a scan completes or stops.
    fn on_scan_end(&self);
}

/// Terminal progress reporter.
pub struct Progress {
    multi: MultiProgress,
    files: Mutex<Option<ProgressBar>>,
    bytes: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupescan::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            files: Mutex::new(None),
            bytes: Mutex::new(None),
            quiet,
        }
    }

    fn files_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bytes_style() -> ProgressStyle {
        ProgressStyle::with_template("  hashed {bytes} ({binary_bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl ProgressCallback for Progress {
    fn on_scan_start(&self, root: &str) {
        if self.quiet {
            return;
        }

        let files = self.multi.add(ProgressBar::new_spinner());
        files.set_style(Self::files_style());
        files.set_message(truncate_path(root, 40));
        files.enable_steady_tick(Duration::from_millis(100));

        let bytes = self.multi.add(ProgressBar::new_spinner());
        bytes.set_style(Self::bytes_style());

        if let Ok(mut slot) = self.files.lock() {
            *slot = Some(files);
        }
        if let Ok(mut slot) = self.bytes.lock() {
            *slot = Some(bytes);
        }
    }

    fn on_file_visited(&self, path: &str) {
        if self.quiet {
            return;
        }
        if let Ok(slot) = self.files.lock() {
            if let Some(ref pb) = *slot {
                pb.inc(1);
                pb.set_message(truncate_path(path, 40));
            }
        }
    }

    fn on_bytes_hashed(&self, bytes: u64) {
        if self.quiet {
            return;
        }
        if let Ok(slot) = self.bytes.lock() {
            if let Some(ref pb) = *slot {
                pb.inc(bytes);
            }
        }
    }

    fn on_scan_end(&self) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.files.lock().ok().and_then(|mut slot| slot.take()) {
            pb.finish_with_message("done");
        }
        if let Some(pb) = self.bytes.lock().ok().and_then(|mut slot| slot.take()) {
            pb.finish();
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
