#![forbid(unsafe_code)]
//! Word-count workload for the versioned repository store.
//!
//! The shared state is one article plus an accumulated word-count map.
//! Workers each count a section of the text off-lock and merge their
//! counts additively through the store's optimistic commit protocol;
//! staggered work delays make stale writes (and therefore conflicts
//! and retries) likely under concurrency.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use vkv_store::Mergeable;

pub mod runner;

pub use runner::{RunConfig, WordCountReport, WorkerOutcome, run_word_count};

/// Accumulated word frequencies, ordered by word.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCounts(BTreeMap<String, u64>);

impl WordCounts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct words.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.0.len()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    #[must_use]
    pub fn count_of(&self, word: &str) -> u64 {
        self.0.get(word).copied().unwrap_or_default()
    }

    /// The `n` most frequent words, highest count first; ties break
    /// alphabetically so the ordering is deterministic.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .0
            .iter()
            .map(|(word, count)| (word.clone(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    fn add(&mut self, word: String) {
        *self.0.entry(word).or_default() += 1;
    }
}

impl Mergeable for WordCounts {
    type Delta = WordCounts;

    fn merge(&mut self, delta: WordCounts) {
        for (word, count) in delta.0 {
            *self.0.entry(word).or_default() += count;
        }
    }
}

/// Extract lowercase words from `text`.
///
/// A word is a maximal run of ASCII letters after lowercasing; every
/// other character (digits, punctuation, accented letters, whitespace)
/// separates words.
#[must_use]
pub fn count_words(text: &str) -> WordCounts {
    let mut counts = WordCounts::default();
    let mut current = String::new();
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() {
            current.push(ch);
        } else if !current.is_empty() {
            counts.add(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        counts.add(current);
    }
    counts
}

/// Shared state: the source document plus accumulated counts.
///
/// The text is seeded once at store creation and never modified; the
/// store delta is a [`WordCounts`] contribution, merged additively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleState {
    pub text: String,
    pub counts: WordCounts,
}

impl ArticleState {
    #[must_use]
    pub fn new(text: String) -> Self {
        Self {
            text,
            counts: WordCounts::default(),
        }
    }
}

impl Mergeable for ArticleState {
    type Delta = WordCounts;

    fn merge(&mut self, delta: WordCounts) {
        self.counts.merge(delta);
    }
}

/// Split `text` into `sections` contiguous byte ranges of near-equal
/// character counts.
///
/// Ranges always fall on char boundaries and cover the whole text;
/// when the split is uneven the leading sections take one extra char.
/// `sections` is clamped to at least 1.
#[must_use]
pub fn section_bounds(text: &str, sections: usize) -> Vec<Range<usize>> {
    let sections = sections.max(1);
    let offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    let total_chars = offsets.len();
    let base = total_chars / sections;
    let extra = total_chars % sections;

    let mut bounds = Vec::with_capacity(sections);
    let mut start_char = 0_usize;
    for section in 0..sections {
        let end_char = start_char + base + usize::from(section < extra);
        let start = offsets.get(start_char).copied().unwrap_or(text.len());
        let end = offsets.get(end_char).copied().unwrap_or(text.len());
        bounds.push(start..end);
        start_char = end_char;
    }
    bounds
}
