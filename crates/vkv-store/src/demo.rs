//! Deterministic walkthrough of the conflict/retry protocol.
//!
//! Two workers share an empty store: both read at version 0, B commits
//! first, A's stale write is rejected, A re-reads and retries. No
//! threads or sleeps — the interleaving is scripted so the outcome is
//! exactly reproducible.

use crate::{Mergeable, VersionedStore, WriteOutcome};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};
use vkv_error::StoreError;
use vkv_types::Version;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("write at {step} conflicted unexpectedly (store at {current})")]
    UnexpectedConflict { step: &'static str, current: Version },
    #[error("stale write at {step} committed as {version}; staleness check failed")]
    UnexpectedCommit { step: &'static str, version: Version },
}

/// Counter map used by the walkthrough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemoCounters(pub BTreeMap<String, u64>);

impl DemoCounters {
    fn one(word: &str, count: u64) -> Self {
        Self(BTreeMap::from([(word.to_owned(), count)]))
    }
}

impl Mergeable for DemoCounters {
    type Delta = DemoCounters;

    fn merge(&mut self, delta: DemoCounters) {
        for (word, count) in delta.0 {
            *self.0.entry(word).or_default() += count;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRetryDemoResult {
    pub b_commit_version: Version,
    pub a_conflict_current: Version,
    pub a_retry_version: Version,
    pub final_version: Version,
    pub final_state: DemoCounters,
    pub lost_update_prevented: bool,
}

impl ConflictRetryDemoResult {
    #[must_use]
    pub fn output_lines(&self) -> [String; 6] {
        [
            "workers A and B read at v0".to_owned(),
            format!("B commits {{x:1}} -> {}", self.b_commit_version),
            format!(
                "A writes {{y:2}} with stale v0 -> conflict (store at {})",
                self.a_conflict_current
            ),
            format!("A re-reads and retries -> {}", self.a_retry_version),
            format!(
                "final state {:?} at {}",
                self.final_state.0, self.final_version
            ),
            format!(
                "lost update prevented: {}",
                if self.lost_update_prevented {
                    "PASS"
                } else {
                    "FAIL"
                }
            ),
        ]
    }
}

/// Run the scripted conflict/retry scenario.
///
/// # Errors
///
/// Fails only if the store misbehaves: a scripted commit conflicts, or
/// the stale write is not rejected.
pub fn run_conflict_retry_demo() -> Result<ConflictRetryDemoResult, DemoError> {
    let store = VersionedStore::new(DemoCounters::default());

    let read_a = store.read()?;
    let read_b = store.read()?;
    debug!(
        a_version = read_a.version.0,
        b_version = read_b.version.0,
        "demo_reads"
    );

    let b_commit_version = match store.write(DemoCounters::one("x", 1), read_b.version)? {
        WriteOutcome::Committed(version) => version,
        WriteOutcome::Conflict { current, .. } => {
            return Err(DemoError::UnexpectedConflict {
                step: "B commit",
                current,
            });
        }
    };
    info!(version = b_commit_version.0, "demo_b_committed");

    let a_conflict_current = match store.write(DemoCounters::one("y", 2), read_a.version)? {
        WriteOutcome::Conflict { current, .. } => current,
        WriteOutcome::Committed(version) => {
            return Err(DemoError::UnexpectedCommit {
                step: "A stale write",
                version,
            });
        }
    };
    info!(current = a_conflict_current.0, "demo_a_conflicted");

    let fresh = store.read()?;
    let a_retry_version = match store.write(DemoCounters::one("y", 2), fresh.version)? {
        WriteOutcome::Committed(version) => version,
        WriteOutcome::Conflict { current, .. } => {
            return Err(DemoError::UnexpectedConflict {
                step: "A retry",
                current,
            });
        }
    };
    info!(version = a_retry_version.0, "demo_a_retried");

    let final_snapshot = store.read()?;
    let expected = {
        let mut both = DemoCounters::one("x", 1);
        both.merge(DemoCounters::one("y", 2));
        both
    };
    let lost_update_prevented =
        final_snapshot.state == expected && final_snapshot.version == Version(2);

    Ok(ConflictRetryDemoResult {
        b_commit_version,
        a_conflict_current,
        a_retry_version,
        final_version: final_snapshot.version,
        final_state: final_snapshot.state,
        lost_update_prevented,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_retry_demo_is_deterministic() {
        let result = run_conflict_retry_demo().expect("demo should succeed");
        assert_eq!(result.b_commit_version, Version(1));
        assert_eq!(result.a_conflict_current, Version(1));
        assert_eq!(result.a_retry_version, Version(2));
        assert_eq!(result.final_version, Version(2));
        assert!(result.lost_update_prevented);
    }

    #[test]
    fn conflict_retry_demo_output_pattern() {
        let result = run_conflict_retry_demo().expect("demo should succeed");
        let lines = result.output_lines();
        let output = lines.as_slice().join("\n");

        assert!(output.contains("workers A and B read at v0"));
        assert!(output.contains("B commits {x:1} -> v1"));
        assert!(output.contains("conflict (store at v1)"));
        assert!(output.contains("A re-reads and retries -> v2"));
        assert!(output.contains("lost update prevented: PASS"));
    }
}
