//! SQLite-backed hash record store.
//!
//! All writes funnel through a single connection guarded by a mutex, since
//! SQLite tolerates many readers but only one writer. Reads are served by a
//! small pool of read-only connections (see [`super::pool`]). Every write is
//! a single `INSERT ... ON CONFLICT` statement or one transaction, so readers
//! observe either the old or the new row, never a mix.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::entry::{HashRecord, HashState, ScanMode};
use super::pool::{ReadPool, DEFAULT_READERS};

/// How long a connection waits on a locked database before failing.
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum bound parameters per `IN (...)` query.
///
/// Older SQLite builds cap host parameters at 999; stay well below it.
pub const MAX_BATCH_PARAMS: usize = 500;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dupes (
        path TEXT NOT NULL PRIMARY KEY,
        hash TEXT,
        partialhash TEXT,
        date TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS dupes_path ON dupes(path);
";

const UPSERT_FULL: &str = "
    INSERT INTO dupes (path, hash, partialhash, date) VALUES (?1, ?2, NULL, ?3)
    ON CONFLICT(path) DO UPDATE SET hash = excluded.hash, date = excluded.date";

const UPSERT_PARTIAL: &str = "
    INSERT INTO dupes (path, hash, partialhash, date) VALUES (?1, NULL, ?2, ?3)
    ON CONFLICT(path) DO UPDATE SET partialhash = excluded.partialhash, date = excluded.date";

const UPSERT_BOTH: &str = "
    INSERT INTO dupes (path, hash, partialhash, date) VALUES (?1, ?2, ?2, ?3)
    ON CONFLICT(path) DO UPDATE SET
        hash = excluded.hash, partialhash = excluded.partialhash, date = excluded.date";

const SELECT_RECORD: &str = "SELECT path, hash, partialhash, date FROM dupes WHERE path = ?1";

/// Errors raised by the hash store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened or is not a SQLite database.
    #[error("Cannot open hash database {path}: {source}")]
    Open {
        /// Database path
        path: PathBuf,
        /// Underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The directory holding the database could not be created.
    #[error("Cannot create database directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A statement failed to prepare or execute.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A connection mutex was poisoned by a panicking thread.
    #[error("Database {0} connection lock poisoned")]
    LockPoisoned(&'static str),

    /// The path cannot be used as a key because it is not valid UTF-8.
    #[error("Path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl StoreError {
    /// Whether the error means the store itself is unusable.
    ///
    /// Only [`StoreError::InvalidPath`] is scoped to a single entry.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StoreError::InvalidPath(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent table of per-path hash records.
pub struct HashStore {
    writer: Mutex<Connection>,
    readers: ReadPool,
    path: PathBuf,
}

impl std::fmt::Debug for HashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore")
            .field("path", &self.path)
            .field("readers", &self.readers.size())
            .finish_non_exhaustive()
    }
}

impl HashStore {
    /// Open or create the store at `path` with the default reader count.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created or is not a valid database.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_readers(path, DEFAULT_READERS)
    }

    /// Open or create the store at `path` with `readers` read connections.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created or is not a valid database.
    pub fn open_with_readers(path: &Path, readers: usize) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(open_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        migrate(&conn).map_err(open_err)?;

        let readers = ReadPool::open(path, readers)?;
        log::debug!(
            "Opened hash store {} ({} readers)",
            path.display(),
            readers.size()
        );

        Ok(Self {
            writer: Mutex::new(conn),
            readers,
            path: path.to_path_buf(),
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current hash state of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the path is not UTF-8.
    pub fn lookup(&self, path: &Path) -> StoreResult<HashState> {
        Ok(HashState::of(self.record(path)?.as_ref()))
    }

    /// Full record for `path`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the path is not UTF-8.
    pub fn record(&self, path: &Path) -> StoreResult<Option<HashRecord>> {
        let key = key(path)?;
        self.readers.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SELECT_RECORD)?;
            Ok(stmt.query_row([key], row_to_record).optional()?)
        })
    }

    /// Write the outcome of hashing `path`.
    ///
    /// A `Full` write sets the full hash and leaves the partial hash alone; a
    /// `Partial` write sets the partial hash and never clears the full hash.
    /// When `size < partial_threshold` the digest covered the whole file, so
    /// both fields receive `hash` and the record is immediately `Full`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing is written in that case.
    pub fn upsert(
        &self,
        path: &Path,
        size: u64,
        hash: &str,
        mode: ScanMode,
        partial_threshold: u64,
    ) -> StoreResult<()> {
        let key = key(path)?;
        let sql = if size < partial_threshold {
            UPSERT_BOTH
        } else {
            match mode {
                ScanMode::Full => UPSERT_FULL,
                ScanMode::Partial => UPSERT_PARTIAL,
            }
        };
        let now = Utc::now().to_rfc3339();

        let conn = self.writer()?;
        conn.prepare_cached(sql)?.execute(params![key, hash, now])?;
        log::trace!("Recorded {} hash for {}", mode, path.display());
        Ok(())
    }

    /// Remove the record for `path`. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, path: &Path) -> StoreResult<bool> {
        let key = key(path)?;
        let conn = self.writer()?;
        let removed = conn
            .prepare_cached("DELETE FROM dupes WHERE path = ?1")?
            .execute([key])?;
        Ok(removed > 0)
    }

    /// Remove every record in `paths` in one transaction.
    ///
    /// Returns the number of rows actually deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails; the transaction is rolled back.
    pub fn delete_many(&self, paths: &[PathBuf]) -> StoreResult<usize> {
        let keys = paths.iter().map(|p| key(p)).collect::<StoreResult<Vec<_>>>()?;

        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM dupes WHERE path = ?1")?;
            for key in keys {
                removed += stmt.execute([key])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Every recorded path, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_paths(&self) -> StoreResult<Vec<PathBuf>> {
        self.readers.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path FROM dupes ORDER BY path")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut paths = Vec::new();
            for row in rows {
                paths.push(PathBuf::from(row?));
            }
            Ok(paths)
        })
    }

    /// Number of records in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> StoreResult<u64> {
        self.readers.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM dupes", [], |row| row.get(0))?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }

    /// True only if every path in `paths` has a partial or full hash.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn batch_exists(&self, paths: &[PathBuf]) -> StoreResult<bool> {
        self.batch_satisfies(paths, ScanMode::Partial)
    }

    /// True only if every path in `paths` already answers a `mode` request.
    ///
    /// For [`ScanMode::Partial`] any recorded hash counts; for
    /// [`ScanMode::Full`] only a full hash does. Queries run in chunks of
    /// [`MAX_BATCH_PARAMS`]; the answer is the same as checking each path on
    /// its own. An empty slice is vacuously satisfied.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn batch_satisfies(&self, paths: &[PathBuf], mode: ScanMode) -> StoreResult<bool> {
        let mut unique: HashSet<&str> = HashSet::with_capacity(paths.len());
        for path in paths {
            match path.to_str() {
                Some(key) => {
                    unique.insert(key);
                }
                // Such a path can never have been recorded.
                None => return Ok(false),
            }
        }
        let keys: Vec<&str> = unique.into_iter().collect();

        let condition = match mode {
            ScanMode::Full => "COALESCE(hash, '') <> ''",
            ScanMode::Partial => "(COALESCE(hash, '') <> '' OR COALESCE(partialhash, '') <> '')",
        };

        self.readers.with_conn(|conn| {
            for chunk in keys.chunks(MAX_BATCH_PARAMS) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let sql = format!(
                    "SELECT COUNT(*) FROM dupes WHERE path IN ({placeholders}) AND {condition}"
                );
                let found: i64 =
                    conn.query_row(&sql, params_from_iter(chunk.iter()), |row| row.get(0))?;
                if usize::try_from(found).unwrap_or(0) != chunk.len() {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    fn writer(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::LockPoisoned("writer"))
    }
}

fn key(path: &Path) -> StoreResult<&str> {
    path.to_str()
        .ok_or_else(|| StoreError::InvalidPath(path.to_path_buf()))
}

/// Bring databases created by older releases up to the current schema.
fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(dupes)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if !columns.iter().any(|c| c == "partialhash") {
        log::info!("Upgrading hash database: adding partialhash column");
        conn.execute_batch("ALTER TABLE dupes ADD COLUMN partialhash TEXT")?;
    }
    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<HashRecord> {
    let path: String = row.get(0)?;
    let full_hash: Option<String> = row.get(1)?;
    let partial_hash: Option<String> = row.get(2)?;
    let date: Option<String> = row.get(3).ok().flatten();

    Ok(HashRecord {
        path: PathBuf::from(path),
        full_hash: full_hash.filter(|h| !h.is_empty()),
        partial_hash: partial_hash.filter(|h| !h.is_empty()),
        last_updated: date.as_deref().and_then(parse_timestamp),
    })
}

/// Accepts RFC 3339 and SQLite's `CURRENT_TIMESTAMP` layout.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
