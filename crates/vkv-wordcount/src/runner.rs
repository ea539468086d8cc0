//! Multi-worker word-count run over a shared [`VersionedStore`].
//!
//! Each worker follows the repository protocol: read a snapshot, count
//! words in its own section of the text (no lock held), simulate work
//! with a configured delay, then commit its counts with the version it
//! originally read. Slow workers write stale versions, conflict, and
//! retry against a fresh read.

use crate::{ArticleState, WordCounts, count_words, section_bounds};
use serde::Serialize;
use std::ops::Range;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use vkv_error::{Result, StoreError};
use vkv_store::{RetryPolicy, VersionedStore, retry::commit_with_retry};
use vkv_types::{Version, WorkerId};

/// Worker-count, work-delay, and retry configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of worker threads; clamped to at least 1.
    pub workers: usize,
    /// Simulated per-worker work duration, cycled when there are more
    /// workers than entries. Unequal delays are what create staleness
    /// windows. Empty means no delay.
    pub work_delays: Vec<Duration>,
    pub policy: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            work_delays: [50, 10, 30, 20].map(Duration::from_millis).to_vec(),
            policy: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    fn delay_for(&self, worker: usize) -> Duration {
        if self.work_delays.is_empty() {
            Duration::ZERO
        } else {
            self.work_delays[worker % self.work_delays.len()]
        }
    }
}

/// What a single worker did during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerOutcome {
    pub worker: WorkerId,
    /// Version at the worker's initial read.
    pub read_version: Version,
    /// Version the worker's commit produced.
    pub committed_version: Version,
    pub attempts: u32,
    pub conflicts: u32,
    /// Words counted in the worker's section.
    pub words: u64,
}

/// Final result of a word-count run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCountReport {
    pub final_version: Version,
    pub total_words: u64,
    pub distinct_words: usize,
    /// Ten most frequent words.
    pub top: Vec<(String, u64)>,
    /// Conflicts observed across all workers.
    pub conflicts: u64,
    pub workers: Vec<WorkerOutcome>,
}

/// Count words in `text` with concurrent workers sharing one store.
///
/// # Errors
///
/// Propagates the first worker failure: retry exhaustion under the
/// configured policy, or a store resource failure.
pub fn run_word_count(text: &str, config: &RunConfig) -> Result<WordCountReport> {
    let worker_count = config.workers.max(1);
    let bounds = section_bounds(text, worker_count);
    let store = VersionedStore::new(ArticleState::new(text.to_owned()));
    info!(workers = worker_count, text_bytes = text.len(), "run_start");

    let outcomes: Vec<WorkerOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = bounds
            .into_iter()
            .enumerate()
            .map(|(index, section)| {
                let store = &store;
                let worker = WorkerId(u64::try_from(index).expect("worker index fits in u64"));
                let delay = config.delay_for(index);
                let policy = config.policy;
                scope.spawn(move || run_worker(store, worker, &section, delay, policy))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread panicked"))
            .collect::<Result<Vec<WorkerOutcome>>>()
    })?;

    let final_snapshot = store.read()?;
    let counts = &final_snapshot.state.counts;
    let report = WordCountReport {
        final_version: final_snapshot.version,
        total_words: counts.total(),
        distinct_words: counts.distinct(),
        top: counts.top(10),
        conflicts: outcomes.iter().map(|o| u64::from(o.conflicts)).sum(),
        workers: outcomes,
    };
    info!(
        final_version = report.final_version.0,
        total_words = report.total_words,
        conflicts = report.conflicts,
        "run_complete"
    );
    Ok(report)
}

fn run_worker(
    store: &VersionedStore<ArticleState>,
    worker: WorkerId,
    section: &Range<usize>,
    delay: Duration,
    policy: RetryPolicy,
) -> std::result::Result<WorkerOutcome, StoreError> {
    // Step 1: snapshot read. All subsequent work is off-lock and
    // against this private copy.
    let snapshot = store.read()?;
    let read_version = snapshot.version;
    debug!(
        worker = worker.0,
        read_version = read_version.0,
        section_start = section.start,
        section_len = section.len(),
        "worker_read"
    );

    let counts = count_words(&snapshot.state.text[section.clone()]);
    let words = counts.total();
    if !delay.is_zero() {
        thread::sleep(delay);
    }

    // Commit with the version from the original read; the retry layer
    // handles staleness.
    let receipt = commit_with_retry(store, policy, snapshot, move |_| -> WordCounts {
        counts.clone()
    })?;
    info!(
        worker = worker.0,
        committed_version = receipt.version.0,
        attempts = receipt.attempts,
        conflicts = receipt.conflicts,
        words,
        "worker_committed"
    );

    Ok(WorkerOutcome {
        worker,
        read_version,
        committed_version: receipt.version,
        attempts: receipt.attempts,
        conflicts: receipt.conflicts,
        words,
    })
}
