use docsearch_core::{Entry, NormalizedQuery, Shard, ShardId};
use serde::{Deserialize, Serialize};

/// How a query relates to a key. Variants are ordered most relevant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrength {
    /// Key equals the query.
    Exact,
    /// Key starts with the query.
    Prefix,
    /// Query occurs somewhere inside the key.
    Substring,
}

impl MatchStrength {
    pub const ALL: [MatchStrength; 3] = [
        MatchStrength::Exact,
        MatchStrength::Prefix,
        MatchStrength::Substring,
    ];
}

/// Classifies `key` against an already normalized query. The first tier
/// that holds wins.
pub fn classify(query: &str, key: &str) -> Option<MatchStrength> {
    if query.is_empty() {
        return None;
    }
    if key == query {
        Some(MatchStrength::Exact)
    } else if key.starts_with(query) {
        Some(MatchStrength::Prefix)
    } else if key.contains(query) {
        Some(MatchStrength::Substring)
    } else {
        None
    }
}

/// One matched entry, with its position in the owning shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub entry: &'a Entry,
    pub strength: MatchStrength,
    pub shard: ShardId,
    /// Index of `entry` within its shard.
    pub ordinal: usize,
}

/// Matches every entry of `shard` against `query`, in shard order.
pub fn match_shard<'a>(query: &NormalizedQuery, shard: &'a Shard) -> Vec<Match<'a>> {
    let needle = query.as_str();
    shard
        .entries()
        .iter()
        .enumerate()
        .filter_map(|(ordinal, entry)| {
            classify(needle, entry.key()).map(|strength| Match {
                entry,
                strength,
                shard: shard.id(),
                ordinal,
            })
        })
        .collect()
}

/// Like [`match_shard`] but normalizes `raw` first. Blank queries match
/// nothing.
pub fn match_query<'a>(raw: &str, shard: &'a Shard) -> Vec<Match<'a>> {
    match NormalizedQuery::new(raw) {
        Some(query) => match_shard(&query, shard),
        None => Vec::new(),
    }
}
