#![forbid(unsafe_code)]
//! Error types for VerKV.
//!
//! # Error Taxonomy
//!
//! VerKV distinguishes expected commit-protocol outcomes from genuine
//! failures:
//!
//! | Kind | Type | Expected? | Caller obligation |
//! |------|------|-----------|-------------------|
//! | Version conflict | `WriteOutcome::Conflict` (`vkv-store`) | Yes — common under contention | Branch and retry |
//! | Retry exhaustion | [`StoreError::RetryExhausted`] | Caller-policy | Treat as failure, never success |
//! | Lock timeout | [`StoreError::LockTimeout`] | No — resource failure | Propagate; do not auto-retry |
//! | I/O | [`StoreError::Io`] | No | Propagate |
//!
//! A version conflict is deliberately **not** an error: it is the
//! normal signal of the optimistic-concurrency protocol and is carried
//! as a value (`WriteOutcome`) so the type system forces callers to
//! branch on it. `StoreError` covers only the outcomes that terminate
//! an operation.
//!
//! ## Design Constraints
//!
//! - `vkv-error` MUST NOT depend on `vkv-types` or `vkv-store` (no
//!   cyclic deps); payloads use plain integers.
//! - All variants carry owned data only.

use thiserror::Error;

/// Unified failure type for store operations.
///
/// Returned by `VersionedStore` accessors and the retry protocol.
/// Conflicts are not represented here — see the crate-level taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lock acquisition exceeded the configured timeout.
    ///
    /// Only produced when a `lock_timeout` is configured; the default
    /// configuration blocks indefinitely and never returns this.
    #[error("lock acquisition timed out after {waited_ms} ms")]
    LockTimeout { waited_ms: u64 },

    /// The bounded retry budget was spent without a successful commit.
    ///
    /// `attempts` counts every write attempt including the first;
    /// `last_seen_version` is the store version observed at the final
    /// conflict, for diagnostics.
    #[error("retries exhausted after {attempts} attempts (store at version {last_seen_version})")]
    RetryExhausted {
        attempts: u32,
        last_seen_version: u64,
    },

    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;
