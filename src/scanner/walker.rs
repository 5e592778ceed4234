//! Directory walker built on walkdir.
//!
//! # Overview
//!
//! [`Walker`] yields a [`WalkEvent`] for every directory and regular file
//! under a root, in sorted depth-first order. Directories are reported
//! before their contents, which lets the caller inspect a directory and call
//! [`Walker::skip_subtree`] to avoid descending into it.
//!
//! Entries are keyed downstream by absolute path, so the root is made
//! absolute and lexically normalized up front and every yielded path
//! inherits that.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{WalkEvent, Walker};
//! use std::path::Path;
//!
//! let mut walker = Walker::new(Path::new("/srv/media"), false)?;
//! while let Some(event) = walker.next() {
//!     match event {
//!         WalkEvent::Directory(dir) if dir.ends_with(".cache") => walker.skip_subtree(),
//!         WalkEvent::File { path, size } => println!("{}: {size}", path.display()),
//!         _ => {}
//!     }
//! }
//! # Ok::<(), dupescan::scanner::ScanError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{normalize_path, ScanError};

/// One step of a traversal.
#[derive(Debug)]
pub enum WalkEvent {
    /// A directory, reported before any of its contents.
    Directory(PathBuf),
    /// A regular file with its size in bytes.
    File {
        /// Absolute path to the file
        path: PathBuf,
        /// File size in bytes
        size: u64,
    },
    /// An entry that could not be read. Traversal continues past it.
    Error(ScanError),
}

/// Depth-first walker that supports pruning.
pub struct Walker {
    root: PathBuf,
    follow_symlinks: bool,
    inner: walkdir::IntoIter,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("follow_symlinks", &self.follow_symlinks)
            .finish_non_exhaustive()
    }
}

impl Walker {
    /// Create a walker rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory is needed to absolutize
    /// `root` and cannot be read.
    pub fn new(root: &Path, follow_symlinks: bool) -> Result<Self, ScanError> {
        let root = std::path::absolute(root)
            .map(|p| normalize_path(&p))
            .map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;
        let inner = WalkDir::new(&root)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
            .into_iter();
        Ok(Self {
            root,
            follow_symlinks,
            inner,
        })
    }

    /// Absolute root of the traversal.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Skip the contents of the most recently yielded directory.
    pub fn skip_subtree(&mut self) {
        self.inner.skip_current_dir();
    }

    fn classify(&self, entry: walkdir::DirEntry) -> Option<WalkEvent> {
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return Some(WalkEvent::Directory(entry.into_path()));
        }
        if file_type.is_symlink() && !self.follow_symlinks {
            log::trace!("Skipping symlink: {}", entry.path().display());
            return None;
        }
        if !file_type.is_file() {
            log::trace!("Skipping special file: {}", entry.path().display());
            return None;
        }

        match entry.metadata() {
            Ok(metadata) => Some(WalkEvent::File {
                size: metadata.len(),
                path: entry.into_path(),
            }),
            Err(e) => {
                let path = entry.into_path();
                Some(WalkEvent::Error(walk_error(path, e)))
            }
        }
    }
}

impl Iterator for Walker {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    return Some(WalkEvent::Error(walk_error(path, e)));
                }
            };
            if let Some(event) = self.classify(entry) {
                return Some(event);
            }
        }
    }
}

fn walk_error(path: PathBuf, err: walkdir::Error) -> ScanError {
    match err.into_io_error() {
        Some(io) => ScanError::from_io(path, io),
        None => ScanError::Io {
            path,
            source: std::io::Error::other("filesystem loop detected"),
        },
    }
}

/// Immediate contents of a directory relevant to the skip check.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Non-empty regular files directly inside the directory.
    pub files: Vec<PathBuf>,
    /// Whether the directory has at least one subdirectory.
    pub has_subdirs: bool,
}

/// List the non-empty regular files directly inside `dir`.
///
/// These are the files whose records decide whether the directory can be
/// skipped. Empty files are left out because they never get a record.
///
/// # Errors
///
/// Returns an error if the directory or one of its entries cannot be read.
pub fn list_dir(dir: &Path, follow_symlinks: bool) -> Result<DirListing, ScanError> {
    let read_dir = fs::read_dir(dir).map_err(|e| ScanError::from_io(dir.to_path_buf(), e))?;
    let mut listing = DirListing::default();
    for entry in read_dir {
        let entry = entry.map_err(|e| ScanError::from_io(dir.to_path_buf(), e))?;
        let path = entry.path();
        let metadata = if follow_symlinks {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };
        let metadata = metadata.map_err(|e| ScanError::from_io(path.clone(), e))?;
        if metadata.is_dir() {
            listing.has_subdirs = true;
        } else if metadata.is_file() && metadata.len() > 0 {
            listing.files.push(path);
        }
    }
    Ok(listing)
}
