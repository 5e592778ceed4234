//! Hash record definitions and the derived hash state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of hash a scan asks for.
///
/// Chosen once per scan invocation, never per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Hash the entire content of every file.
    #[default]
    Full,
    /// Hash only a bounded prefix of every file.
    Partial,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Full => write!(f, "full"),
            ScanMode::Partial => write!(f, "partial"),
        }
    }
}

/// Hashing progress of a single path, derived from its [`HashRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HashState {
    /// No record exists for the path.
    NotFound,
    /// A record exists but carries neither hash.
    None,
    /// Only a prefix hash is recorded.
    Partial,
    /// The full-content hash is recorded.
    Full,
}

impl HashState {
    /// Derive the state of an optional record.
    #[must_use]
    pub fn of(record: Option<&HashRecord>) -> Self {
        record.map_or(HashState::NotFound, HashRecord::state)
    }

    /// Whether any hash at all is recorded.
    #[must_use]
    pub fn has_hash(self) -> bool {
        matches!(self, HashState::Partial | HashState::Full)
    }

    /// Whether this state already answers a request made in `mode`.
    ///
    /// `Full` satisfies every request; `Partial` only satisfies partial scans.
    #[must_use]
    pub fn satisfies(self, mode: ScanMode) -> bool {
        match mode {
            ScanMode::Full => self == HashState::Full,
            ScanMode::Partial => self.has_hash(),
        }
    }
}

impl fmt::Display for HashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashState::NotFound => "not found",
            HashState::None => "none",
            HashState::Partial => "partial",
            HashState::Full => "full",
        };
        f.write_str(name)
    }
}

/// One row of the hash cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    /// Absolute path, exactly as it was keyed.
    pub path: PathBuf,
    /// Digest of the entire content.
    pub full_hash: Option<String>,
    /// Digest of the bounded prefix.
    pub partial_hash: Option<String>,
    /// Time of the last write. Advisory only.
    pub last_updated: Option<DateTime<Utc>>,
}

impl HashRecord {
    /// Derive the hash state. A set `full_hash` wins regardless of `partial_hash`.
    #[must_use]
    pub fn state(&self) -> HashState {
        match (&self.full_hash, &self.partial_hash) {
            (Some(_), _) => HashState::Full,
            (None, Some(_)) => HashState::Partial,
            (None, None) => HashState::None,
        }
    }
}
