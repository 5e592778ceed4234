//! Persistent hash cache for dupescan.
//!
//! This module stores how far each file has been hashed so that repeated
//! scans skip work that has already been done.
//!
//! # Architecture
//!
//! * [`database`]: SQLite persistence, schema migration and the single-writer
//!   discipline around the shared table.
//! * [`entry`]: the [`HashRecord`] row, the derived [`HashState`] and the
//!   [`ScanMode`] a scan asks for.
//! * `pool`: read-only connections serving concurrent lookups.
//!
//! # Freshness
//!
//! Records are keyed by absolute path only. A recorded hash is trusted until
//! the record is pruned; file size and modification time are not consulted.

pub mod database;
pub mod entry;
mod pool;

pub use database::{HashStore, StoreError, StoreResult, MAX_BATCH_PARAMS};
pub use entry::{HashRecord, HashState, ScanMode};
pub use pool::DEFAULT_READERS;
