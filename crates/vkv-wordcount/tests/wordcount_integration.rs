//! End-to-end word-count runs with genuinely concurrent workers.

use std::time::Duration;
use vkv_store::{Mergeable, RetryPolicy};
use vkv_wordcount::{RunConfig, WordCounts, count_words, run_word_count, section_bounds};

const ARTICLE: &str = "\
The ship sank in the early morning. Survivors described the morning as \
cold and dark, and the sea as calm. The ship carried more than two \
thousand people; the survivors numbered far fewer. Reports from the \
survivors reached the mainland days later, and the reports differed on \
almost every detail except the cold.";

fn section_sum(text: &str, workers: usize) -> WordCounts {
    let mut merged = WordCounts::default();
    for range in section_bounds(text, workers) {
        merged.merge(count_words(&text[range]));
    }
    merged
}

#[test]
fn staggered_workers_lose_no_contribution() {
    let config = RunConfig {
        workers: 4,
        // Unequal delays: fast workers commit while slow workers still
        // hold stale snapshots, forcing conflicts and retries.
        work_delays: [40, 5, 20, 10].map(Duration::from_millis).to_vec(),
        policy: RetryPolicy {
            max_attempts: 16,
            backoff: Duration::from_millis(1),
            jitter: Duration::from_millis(2),
        },
    };

    let report = run_word_count(ARTICLE, &config).expect("run");
    let expected = section_sum(ARTICLE, 4);

    // Every worker committed exactly once.
    assert_eq!(report.final_version.0, 4);
    assert_eq!(report.total_words, expected.total());
    assert_eq!(report.distinct_words, expected.distinct());
    assert_eq!(
        report.workers.iter().map(|w| w.words).sum::<u64>(),
        expected.total()
    );

    // Attempts bookkeeping: attempts = conflicts + 1 per worker.
    for outcome in &report.workers {
        assert_eq!(outcome.attempts, outcome.conflicts + 1);
        assert!(outcome.committed_version.0 >= 1);
    }
}

#[test]
fn lone_worker_never_conflicts() {
    let config = RunConfig {
        workers: 1,
        work_delays: Vec::new(),
        policy: RetryPolicy::immediate(4),
    };
    let report = run_word_count(ARTICLE, &config).expect("run");
    assert_eq!(report.conflicts, 0);
    assert_eq!(report.final_version.0, 1);
    assert_eq!(report.workers[0].attempts, 1);
}

#[test]
fn top_ten_is_deterministic_across_worker_counts() {
    let single = run_word_count(
        ARTICLE,
        &RunConfig {
            workers: 1,
            work_delays: Vec::new(),
            policy: RetryPolicy::immediate(4),
        },
    )
    .expect("single-worker run");

    // "the" dominates the article regardless of how it is sectioned.
    assert_eq!(single.top[0].0, "the");
    assert!(single.top.len() <= 10);
}

#[test]
fn unicode_text_is_sectioned_safely() {
    let text = "víctor saw the ship — the ship saw víctor. ".repeat(8);
    let config = RunConfig {
        workers: 5,
        work_delays: [3, 1, 2].map(Duration::from_millis).to_vec(),
        policy: RetryPolicy::immediate(32),
    };

    let report = run_word_count(&text, &config).expect("run");
    let expected = section_sum(&text, 5);
    assert_eq!(report.total_words, expected.total());
    assert_eq!(report.final_version.0, 5);
}
