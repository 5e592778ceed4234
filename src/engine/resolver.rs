//! Skip / hash / escalate decisions.
//!
//! [`decide`] is the single source of truth for whether a file is hashed
//! during a scan. It is a pure function of the recorded state and the scan
//! mode:
//!
//! | state     | `Full` scan          | `Partial` scan |
//! |-----------|----------------------|----------------|
//! | NotFound  | HashFull             | HashPartial    |
//! | None      | HashFull             | HashPartial    |
//! | Partial   | HashFull (escalate)  | Skip           |
//! | Full      | Skip                 | Skip           |

use crate::cache::{HashState, ScanMode};
use crate::scanner::DigestMode;

/// What to do with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// The recorded state already answers the request.
    Skip,
    /// Hash the entire content.
    HashFull,
    /// Hash the bounded prefix.
    HashPartial,
}

impl Action {
    /// Digest mode for this action, or `None` for [`Action::Skip`].
    #[must_use]
    pub fn digest_mode(self, partial_threshold: u64) -> Option<DigestMode> {
        match self {
            Action::Skip => None,
            Action::HashFull => Some(DigestMode::Full),
            Action::HashPartial => Some(DigestMode::Partial(partial_threshold)),
        }
    }

    /// Which hash field a successful digest fills.
    #[must_use]
    pub fn scan_mode(self) -> Option<ScanMode> {
        match self {
            Action::Skip => None,
            Action::HashFull => Some(ScanMode::Full),
            Action::HashPartial => Some(ScanMode::Partial),
        }
    }
}

/// Decide what a scan in `mode` does with a file in `state`.
#[must_use]
pub fn decide(state: HashState, mode: ScanMode) -> Action {
    match (state, mode) {
        (HashState::Full, _) => Action::Skip,
        (HashState::Partial, ScanMode::Partial) => Action::Skip,
        (HashState::Partial, ScanMode::Full) => Action::HashFull,
        (HashState::NotFound | HashState::None, ScanMode::Full) => Action::HashFull,
        (HashState::NotFound | HashState::None, ScanMode::Partial) => Action::HashPartial,
    }
}
