#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic store version.
///
/// Starts at [`Version::ZERO`] and advances by exactly 1 on every
/// successful write. Never decremented, never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub const ZERO: Self = Self(0);

    /// The version produced by one successful write on top of `self`.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier for a worker task participating in the commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// An immutable copy of store state paired with the version it was
/// read at.
///
/// The pair is mutually consistent: `version` is exactly the version
/// current at the instant `state` was copied. A snapshot is always a
/// deep copy of the store's state, never an alias into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub state: S,
    pub version: Version,
}
