//! Hash-state engine: decides, hashes and records.
//!
//! - [`resolver`]: pure skip / hash / escalate decisions
//! - [`orchestrator`]: drives a traversal through the resolver, the digest
//!   engine and the store
//! - [`prune`]: removes records of files that no longer exist
//! - [`check`]: read-only report of what the cache knows about a tree

pub mod check;
pub mod orchestrator;
pub mod prune;
pub mod resolver;

pub use check::{check_tree, CheckEntry, CheckReport};
pub use orchestrator::{ScanConfig, ScanRunError, ScanSummary, Scanner};
pub use prune::{PruneSummary, Reconciler};
pub use resolver::{decide, Action};
