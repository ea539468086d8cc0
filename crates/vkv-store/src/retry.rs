//! Bounded, observable retry loop for the optimistic commit protocol.
//!
//! The caller-side protocol around [`VersionedStore`]:
//!
//! 1. `read` a snapshot, do the long work off-lock.
//! 2. Attempt `write` with the version from that original read — the
//!    staleness check. If any other worker committed in between, the
//!    write conflicts.
//! 3. On conflict: re-read, recompute the delta from the fresh state,
//!    wait a randomized backoff delay, and try again with the fresh
//!    version — up to a bounded number of attempts.
//!
//! Exhausting the budget surfaces [`StoreError::RetryExhausted`], a
//! distinct failure that calling code cannot mistake for success.
//!
//! Backoff is `base * attempt` plus a uniform random jitter, so
//! repeatedly conflicting workers spread out instead of stampeding the
//! lock together.

use crate::{Mergeable, VersionedStore, WriteOutcome};
use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use vkv_error::{Result, StoreError};
use vkv_types::{Snapshot, Version};

/// Retry budget and backoff shape for [`commit_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total write attempts, including the first. At least one attempt
    /// is always made.
    pub max_attempts: u32,
    /// Base delay; the wait before retry N is `backoff * N`.
    pub backoff: Duration,
    /// Uniform random extra delay in `0..=jitter` added to each wait.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            backoff: Duration::from_millis(1),
            jitter: Duration::from_millis(4),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps. Retries remain bounded.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// The wait before the retry following attempt number `attempt`.
    #[must_use]
    pub fn delay_before_retry(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        base.saturating_add(Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
    }
}

/// What a successful [`commit_with_retry`] cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// The store version this commit produced.
    pub version: Version,
    /// Write attempts made, including the successful one.
    pub attempts: u32,
    /// Conflicts observed before succeeding.
    pub conflicts: u32,
}

/// Commit a contribution, retrying on version conflicts.
///
/// `first_read` is the snapshot the caller's work was based on; the
/// first attempt uses its version, so staleness accumulated during the
/// work is detected. `produce` maps observed state to the delta to
/// merge and is re-invoked with the fresh state after every conflict;
/// keep it cheap — the expensive work belongs before this call.
///
/// Blocks the calling thread during backoff waits.
///
/// # Errors
///
/// [`StoreError::RetryExhausted`] once the attempt budget is spent,
/// plus any resource failure from the underlying store operations.
pub fn commit_with_retry<S, F>(
    store: &VersionedStore<S>,
    policy: RetryPolicy,
    first_read: Snapshot<S>,
    mut produce: F,
) -> Result<CommitReceipt>
where
    S: Mergeable,
    F: FnMut(&S) -> S::Delta,
{
    let mut snapshot = first_read;
    let mut attempts = 0_u32;
    let mut conflicts = 0_u32;

    loop {
        attempts = attempts.saturating_add(1);
        let delta = produce(&snapshot.state);
        match store.write(delta, snapshot.version)? {
            WriteOutcome::Committed(version) => {
                return Ok(CommitReceipt {
                    version,
                    attempts,
                    conflicts,
                });
            }
            WriteOutcome::Conflict { current, .. } => {
                conflicts = conflicts.saturating_add(1);
                if attempts >= policy.max_attempts {
                    warn!(
                        attempts,
                        last_seen = current.0,
                        "retry_exhausted"
                    );
                    return Err(StoreError::RetryExhausted {
                        attempts,
                        last_seen_version: current.0,
                    });
                }

                let delay = policy.delay_before_retry(attempts);
                debug!(
                    attempt = attempts,
                    current = current.0,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retry_backoff"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                snapshot = store.read()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct Counters(BTreeMap<String, u64>);

    impl Counters {
        fn one(word: &str, count: u64) -> Self {
            Self(BTreeMap::from([(word.to_owned(), count)]))
        }
    }

    impl Mergeable for Counters {
        type Delta = Counters;

        fn merge(&mut self, delta: Counters) {
            for (word, count) in delta.0 {
                *self.0.entry(word).or_default() += count;
            }
        }
    }

    #[test]
    fn clean_commit_costs_one_attempt() {
        let store = VersionedStore::new(Counters::default());
        let snapshot = store.read().expect("read");

        let receipt = commit_with_retry(&store, RetryPolicy::immediate(4), snapshot, |_| {
            Counters::one("x", 1)
        })
        .expect("commit");

        assert_eq!(
            receipt,
            CommitReceipt {
                version: Version(1),
                attempts: 1,
                conflicts: 0,
            }
        );
    }

    #[test]
    fn conflict_then_retry_preserves_both_contributions() {
        let store = VersionedStore::new(Counters::default());

        // Worker A reads, then a competitor commits first.
        let stale = store.read().expect("A read");
        let competitor = store
            .write(Counters::one("x", 1), Version::ZERO)
            .expect("competitor write");
        assert!(competitor.is_committed());

        let receipt = commit_with_retry(&store, RetryPolicy::immediate(4), stale, |_| {
            Counters::one("y", 2)
        })
        .expect("A commit");

        assert_eq!(receipt.version, Version(2));
        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.conflicts, 1);

        let final_state = store.read().expect("read").state;
        assert_eq!(
            final_state,
            Counters(BTreeMap::from([
                ("x".to_owned(), 1),
                ("y".to_owned(), 2),
            ]))
        );
    }

    #[test]
    fn exhaustion_is_a_distinct_failure() {
        let store = VersionedStore::new(Counters::default());
        let snapshot = store.read().expect("read");

        // Every produce call sneaks in a competing commit, so each
        // write attempt observes a moved version.
        let result = commit_with_retry(&store, RetryPolicy::immediate(3), snapshot, |_| {
            let current = store.current_version().expect("version");
            let outcome = store
                .write(Counters::one("rival", 1), current)
                .expect("rival write");
            assert!(outcome.is_committed());
            Counters::one("loser", 1)
        });

        match result {
            Err(StoreError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetryExhausted, got {other:?}"),
        }

        // The loser's delta never landed.
        let state = store.read().expect("read").state;
        assert!(!state.0.contains_key("loser"));
        assert_eq!(state.0.get("rival"), Some(&3));
    }

    #[test]
    fn delay_stays_within_base_plus_jitter() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(2),
            jitter: Duration::from_millis(3),
        };
        for attempt in 1..=4 {
            let base = Duration::from_millis(2 * u64::from(attempt));
            let delay = policy.delay_before_retry(attempt);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_millis(3));
        }
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(2);
        assert_eq!(policy.delay_before_retry(1), Duration::ZERO);
        assert_eq!(policy.delay_before_retry(u32::MAX), Duration::ZERO);
    }
}
