//! Scanner module for directory traversal and file hashing.
//!
//! This module provides:
//! - The digest engine ([`Hasher`]) computing full or prefix BLAKE3 digests
//! - Directory traversal ([`Walker`]) that can prune whole subtrees
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{DigestMode, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let digest = hasher.digest(Path::new("movie.mkv"), DigestMode::Partial(2 * 1024 * 1024))?;
//! println!("{} ({} bytes): {}", digest.path.display(), digest.size, digest.hex);
//! # Ok::<(), dupescan::scanner::HashError>(())
//! ```

pub mod hasher;
pub mod walker;

use std::path::{Component, Path, PathBuf};

use crate::cache::StoreError;

pub use hasher::{Hasher, DEFAULT_MMAP_THRESHOLD};
pub use walker::{list_dir, DirListing, WalkEvent, Walker};

/// Default number of bytes read for a partial hash (2 MiB).
pub const DEFAULT_PARTIAL_THRESHOLD: u64 = 2 * 1024 * 1024;

/// How much of a file the digest engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMode {
    /// The entire content.
    Full,
    /// At most this many bytes from the start of the file.
    Partial(u64),
}

/// Result of hashing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    /// Absolute path of the hashed file
    pub path: PathBuf,
    /// Size of the file in bytes
    pub size: u64,
    /// Lowercase hex digest of the bytes that were read
    pub hex: String,
}

/// Lexically normalize an absolute path.
///
/// `.` components are dropped and `..` removes the preceding component,
/// never climbing past the root. Symlinks are not resolved, so this never
/// touches the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Errors that can occur while visiting a single entry during a scan.
///
/// None of these abort a scan; they are logged and counted.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path vanished between discovery and use.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file name cannot be stored as a cache key.
    #[error("Unreadable file name: {}", .0.display())]
    InvalidName(PathBuf),

    /// Hashing the file failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ScanError {
    /// Build a scan error from an I/O error, classifying common kinds.
    #[must_use]
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path),
            std::io::ErrorKind::NotFound => ScanError::NotFound(path),
            _ => ScanError::Io { path, source: err },
        }
    }

    /// Convert a per-entry store error. Fatal store errors must not reach here.
    pub(crate) fn from_store(path: PathBuf, err: StoreError) -> Self {
        match err {
            StoreError::InvalidPath(p) => ScanError::InvalidName(p),
            other => ScanError::Io {
                path,
                source: std::io::Error::other(other.to_string()),
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => HashError::NotFound(path),
            std::io::ErrorKind::PermissionDenied => HashError::PermissionDenied(path),
            _ => HashError::Io { path, source: err },
        }
    }
}
