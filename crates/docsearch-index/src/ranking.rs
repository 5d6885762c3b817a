use std::cmp::Ordering;

use docsearch_core::{ShardId, Target};
use serde::Serialize;

use crate::matcher::{Match, MatchStrength};

/// One display row: an entry with its overload set kept together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub key: String,
    pub label: String,
    pub strength: MatchStrength,
    /// In the order recorded by the index.
    pub targets: Vec<Target>,
    pub shard: ShardId,
}

/// Per-tier match counts, taken before truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrengthCounts {
    pub exact: usize,
    pub prefix: usize,
    pub substring: usize,
}

impl StrengthCounts {
    pub fn total(&self) -> usize {
        self.exact + self.prefix + self.substring
    }

    pub fn get(&self, strength: MatchStrength) -> usize {
        match strength {
            MatchStrength::Exact => self.exact,
            MatchStrength::Prefix => self.prefix,
            MatchStrength::Substring => self.substring,
        }
    }

    fn record(&mut self, strength: MatchStrength) {
        match strength {
            MatchStrength::Exact => self.exact += 1,
            MatchStrength::Prefix => self.prefix += 1,
            MatchStrength::Substring => self.substring += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranked {
    pub rows: Vec<ResultRow>,
    pub counts: StrengthCounts,
    /// Rows were dropped to respect `max_results`.
    pub truncated: bool,
}

/// Orders matches for display and keeps the best `max_results`.
///
/// Order: strength, then label compared case-insensitively, then position
/// in the index (shard, then entry). The last key makes the order total, so
/// ties keep index order and truncation only ever drops the tail.
pub fn rank(mut matches: Vec<Match<'_>>, max_results: usize) -> Ranked {
    let mut counts = StrengthCounts::default();
    for m in &matches {
        counts.record(m.strength);
    }

    let truncated = matches.len() > max_results;
    if truncated {
        if max_results == 0 {
            matches.clear();
        } else {
            matches.select_nth_unstable_by(max_results - 1, cmp_matches);
            matches.truncate(max_results);
        }
    }
    matches.sort_by(cmp_matches);

    let rows = matches
        .into_iter()
        .map(|m| ResultRow {
            key: m.entry.key().to_owned(),
            label: m.entry.label().to_owned(),
            strength: m.strength,
            targets: m.entry.targets().to_vec(),
            shard: m.shard,
        })
        .collect();

    Ranked {
        rows,
        counts,
        truncated,
    }
}

fn cmp_matches(a: &Match<'_>, b: &Match<'_>) -> Ordering {
    a.strength
        .cmp(&b.strength)
        .then_with(|| cmp_label(a.entry.label(), b.entry.label()))
        .then_with(|| (a.shard, a.ordinal).cmp(&(b.shard, b.ordinal)))
}

fn cmp_label(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
