//! BLAKE3 digest engine with streaming and memory-mapped paths.
//!
//! # Overview
//!
//! [`Hasher::digest`] hashes either a whole file or a bounded prefix of it.
//! Prefix hashes always stream through a fixed buffer. Full hashes of files
//! at or above the mmap threshold are memory-mapped and hashed on the rayon
//! pool; smaller files stream.
//!
//! Digests are returned as lowercase hex, 64 characters long.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::progress::ProgressCallback;

use super::{normalize_path, Digest, DigestMode, HashError};

/// Raw BLAKE3 output.
type Hash = [u8; 32];

/// Files at or above this size are memory-mapped for full hashing (64 MiB).
pub const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Read buffer size for streaming (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Content digest engine.
#[derive(Clone)]
pub struct Hasher {
    buffer_size: usize,
    use_mmap: bool,
    mmap_threshold: u64,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("buffer_size", &self.buffer_size)
            .field("use_mmap", &self.use_mmap)
            .field("mmap_threshold", &self.mmap_threshold)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with streaming buffers and mmap for large files.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            progress: None,
        }
    }

    /// Enable or disable memory-mapped full hashing.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Minimum file size for memory-mapped full hashing.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Report bytes read to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Hash `path` according to `mode`.
    ///
    /// The path is made absolute and lexically normalized first; the returned
    /// [`Digest`] carries that path. For a partial digest of a file shorter than the
    /// limit, the returned size is the number of bytes actually read, so
    /// `size < limit` always means the whole file was covered.
    ///
    /// Zero-length files hash successfully with `size == 0`; callers decide
    /// what to do with them.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn digest(&self, path: &Path, mode: DigestMode) -> Result<Digest, HashError> {
        let path = absolute(path)?;
        let (size, hash) = match mode {
            DigestMode::Full => self.hash_full(&path)?,
            DigestMode::Partial(limit) => self.hash_prefix(&path, limit)?,
        };
        Ok(Digest {
            path,
            size,
            hex: hash_to_hex(&hash),
        })
    }

    fn hash_full(&self, path: &Path) -> Result<(u64, Hash), HashError> {
        let file = open(path)?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?
            .len();

        if self.use_mmap && len > 0 && len >= self.mmap_threshold {
            log::trace!("Hashing {} via mmap ({} bytes)", path.display(), len);
            let mut hasher = blake3::Hasher::new();
            hasher
                .update_mmap_rayon(path)
                .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
            self.report(len);
            return Ok((len, *hasher.finalize().as_bytes()));
        }

        self.stream(path, file)
    }

    fn hash_prefix(&self, path: &Path, limit: u64) -> Result<(u64, Hash), HashError> {
        let file = open(path)?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?
            .len();

        let (read, hash) = self.stream(path, file.take(limit))?;
        // A short read means the prefix is the whole file.
        let size = if read < limit { read } else { len.max(read) };
        Ok((size, hash))
    }

    /// Hash everything `reader` yields. Returns the byte count and hash.
    fn stream<R: Read>(&self, path: &Path, mut reader: R) -> Result<(u64, Hash), HashError> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path.to_path_buf(), e)),
            };
            hasher.update(&buffer[..n]);
            total += n as u64;
            self.report(n as u64);
        }

        Ok((total, *hasher.finalize().as_bytes()))
    }

    fn report(&self, bytes: u64) {
        if let Some(ref progress) = self.progress {
            progress.on_bytes_hashed(bytes);
        }
    }
}

fn open(path: &Path) -> Result<File, HashError> {
    File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))
}

fn absolute(path: &Path) -> Result<PathBuf, HashError> {
    std::path::absolute(path)
        .map(|p| normalize_path(&p))
        .map_err(|e| HashError::from_io(path.to_path_buf(), e))
}

fn hash_to_hex(hash: &Hash) -> String {
    use std::fmt::Write;
    hash.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
