//! Round-robin pool of read-only SQLite connections.
//!
//! Readers never block the writer in WAL mode, so lookups issued from
//! several hashing threads proceed concurrently.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use super::database::{StoreError, StoreResult, BUSY_TIMEOUT};

/// Default number of read connections.
pub const DEFAULT_READERS: usize = 4;

/// Upper bound on read connections.
const MAX_READERS: usize = 8;

pub(crate) struct ReadPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Open `size` read-only connections (clamped to `1..=8`).
    ///
    /// The database file and its schema must already exist.
    pub(crate) fn open(path: &Path, size: usize) -> StoreResult<Self> {
        let size = size.clamp(1, MAX_READERS);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            connections.push(Mutex::new(conn));
        }
        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Run `f` against the next connection in round-robin order.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let guard = self.connections[idx]
            .lock()
            .map_err(|_| StoreError::LockPoisoned("reader"))?;
        f(&guard)
    }

    pub(crate) fn size(&self) -> usize {
        self.connections.len()
    }
}
