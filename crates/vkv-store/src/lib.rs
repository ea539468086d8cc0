#![forbid(unsafe_code)]
//! Versioned in-memory repository with optimistic-concurrency writes.
//!
//! [`VersionedStore`] holds one shared state value behind a single
//! [`parking_lot::Mutex`] and a monotonic [`Version`] counter. Workers
//! call [`VersionedStore::read`] to obtain a consistent snapshot, do
//! arbitrarily long work without holding any lock, and call
//! [`VersionedStore::write`] with the version they read. The write is
//! applied only if that version is still current; otherwise it is
//! rejected with no state change and the worker retries against a
//! fresh read (see [`retry`]).
//!
//! # Concurrency
//!
//! `read` and `write` are mutually exclusive with every other `read`
//! and `write` — the mutex is the only serialization point. Lock hold
//! time is O(state size) for the snapshot copy or the merge, never
//! O(work size). The version check and increment inside `write` form
//! the linearization point: version N's state is exactly the result of
//! the writes that produced versions 1..=N, in commit order.

use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, trace};
use vkv_error::{Result, StoreError};
use vkv_types::{Snapshot, Version};

pub mod demo;
pub mod retry;

pub use retry::{CommitReceipt, RetryPolicy};

/// State that can absorb caller-defined deltas.
///
/// The store core stays neutral to merge semantics: `merge` is the
/// caller-supplied pure operation `old state x delta -> new state`,
/// applied inside the write critical section. The demo workload uses
/// an additive counter merge; replace-style merges are equally valid.
///
/// `Clone` must produce a deep copy — snapshots are copies, never
/// aliases of live store state.
pub trait Mergeable: Clone {
    type Delta;

    fn merge(&mut self, delta: Self::Delta);
}

/// Outcome of a [`VersionedStore::write`] attempt.
///
/// Conflict is an expected, common result of the optimistic protocol,
/// so it is carried as a value rather than an error. The type is
/// `#[must_use]`: every caller has to branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The version matched; the delta was merged and the version
    /// advanced to the carried value.
    Committed(Version),
    /// The store moved on since the caller's read. Nothing changed.
    Conflict {
        expected: Version,
        current: Version,
    },
}

impl WriteOutcome {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// The new store version, if the write committed.
    #[must_use]
    pub fn committed_version(&self) -> Option<Version> {
        match self {
            Self::Committed(version) => Some(*version),
            Self::Conflict { .. } => None,
        }
    }
}

/// Store tuning knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreConfig {
    /// Upper bound on lock acquisition. `None` blocks indefinitely.
    /// When set, `read`/`write` surface [`StoreError::LockTimeout`]
    /// instead of waiting past the bound.
    pub lock_timeout: Option<Duration>,
}

#[derive(Debug)]
struct StoreInner<S> {
    state: S,
    version: Version,
}

/// Shared, versioned repository guarded by a single mutex.
///
/// Create once with the initial state (at [`Version::ZERO`]), share
/// via `Arc`, mutate only through [`write`](Self::write).
#[derive(Debug)]
pub struct VersionedStore<S> {
    inner: Mutex<StoreInner<S>>,
    config: StoreConfig,
}

impl<S: Mergeable> VersionedStore<S> {
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    #[must_use]
    pub fn with_config(initial: S, config: StoreConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                state: initial,
                version: Version::ZERO,
            }),
            config,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner<S>>> {
        match self.config.lock_timeout {
            None => Ok(self.inner.lock()),
            Some(timeout) => self.inner.try_lock_for(timeout).ok_or_else(|| {
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                StoreError::LockTimeout { waited_ms }
            }),
        }
    }

    /// Copy the current state and version as one atomic step.
    ///
    /// The returned pair is mutually consistent: the version matches
    /// the exact state observed. No partially merged state is ever
    /// visible.
    pub fn read(&self) -> Result<Snapshot<S>> {
        let guard = self.lock()?;
        let snapshot = Snapshot {
            state: guard.state.clone(),
            version: guard.version,
        };
        drop(guard);
        trace!(version = snapshot.version.0, "store_read");
        Ok(snapshot)
    }

    /// The current version, without copying state.
    pub fn current_version(&self) -> Result<Version> {
        Ok(self.lock()?.version)
    }

    /// Merge `delta` into the state iff `expected` is still the
    /// current version.
    ///
    /// The check and the merge happen atomically under the same
    /// critical section `read` uses. A mismatch changes nothing and
    /// reports [`WriteOutcome::Conflict`]; callers obtained `expected`
    /// from a prior `read` and must retry from a fresh one.
    pub fn write(&self, delta: S::Delta, expected: Version) -> Result<WriteOutcome> {
        let mut guard = self.lock()?;
        if guard.version != expected {
            let current = guard.version;
            drop(guard);
            debug!(
                expected = expected.0,
                current = current.0,
                "store_conflict"
            );
            return Ok(WriteOutcome::Conflict { expected, current });
        }

        guard.state.merge(delta);
        guard.version = guard.version.next();
        let committed = guard.version;
        drop(guard);
        info!(version = committed.0, "store_commit");
        Ok(WriteOutcome::Committed(committed))
    }
}
