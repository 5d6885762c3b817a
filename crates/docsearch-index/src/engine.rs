use std::sync::Arc;

use docsearch_core::{NormalizedQuery, Shard, ShardId, ShardRegistry};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::loader::ShardLoader;
use crate::matcher::match_shard;
use crate::ranking::{rank, ResultRow, StrengthCounts};
use crate::source::ShardKey;

/// Which shards substring matches are collected from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstringScope {
    /// Only the shard the query's first character routes to. Exact and
    /// prefix results are complete; substring results are limited to keys
    /// sharing the query's bucket.
    #[default]
    HomeShard,
    /// Every shard in the section. The first query loads the whole index.
    AllShards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub max_results: usize,
    pub substring_scope: SubstringScope,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_results: 50,
            substring_scope: SubstringScope::HomeShard,
        }
    }
}

/// Ranked answer to one query. An empty `rows` list is a valid
/// "no matches" answer, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// The normalized query; empty for blank input.
    pub query: String,
    pub rows: Vec<ResultRow>,
    pub counts: StrengthCounts,
    pub truncated: bool,
    /// Shards whose entries were matched, ascending.
    pub shards_searched: Vec<ShardId>,
    /// Non-home shards that could not be loaded under
    /// [`SubstringScope::AllShards`].
    pub unavailable: Vec<ShardId>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Normalizes queries, resolves and loads the shards they need, and ranks
/// the matches.
#[derive(Debug)]
pub struct QueryEngine {
    section: Arc<str>,
    loader: Arc<ShardLoader>,
    options: QueryOptions,
}

impl QueryEngine {
    pub fn new(section: impl Into<Arc<str>>, loader: Arc<ShardLoader>, options: QueryOptions) -> Self {
        Self {
            section: section.into(),
            loader,
            options,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn loader(&self) -> &Arc<ShardLoader> {
        &self.loader
    }

    pub fn registry(&self) -> &ShardRegistry {
        self.loader.registry()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Shard that exact and prefix matches for `raw` live in; `None` for
    /// blank input.
    pub fn home_shard(&self, raw: &str) -> Option<ShardKey> {
        let query = NormalizedQuery::new(raw)?;
        Some(self.key(self.registry().shard_id_for(query.first_char())))
    }

    pub async fn search(&self, raw: &str) -> Result<SearchResults, SearchError> {
        let Some(query) = NormalizedQuery::new(raw) else {
            return Ok(SearchResults::default());
        };

        let home = self.registry().shard_id_for(query.first_char());
        let home_shard = self
            .loader
            .load(&self.key(home))
            .await
            .map_err(|err| SearchError::from_load(home, err))?;

        let mut shards: Vec<Arc<Shard>> = vec![home_shard];
        let mut unavailable = Vec::new();
        if self.options.substring_scope == SubstringScope::AllShards {
            let others: Vec<ShardKey> = self
                .registry()
                .all_shard_ids()
                .filter(|id| *id != home)
                .map(|id| self.key(id))
                .collect();
            for (key, result) in self.loader.load_many(others).await {
                match result {
                    Ok(shard) => shards.push(shard),
                    Err(err) if err.is_fatal() => return Err(SearchError::IndexUnusable(err)),
                    Err(err) => {
                        tracing::debug!(shard = %key, error = %err, "skipping unavailable shard for substring search");
                        unavailable.push(key.id());
                    }
                }
            }
        }
        shards.sort_by_key(|shard| shard.id());

        // Keys outside the home shard cannot start with the query's first
        // character, so other shards only ever contribute substring matches.
        let matches = shards
            .iter()
            .flat_map(|shard| match_shard(&query, shard))
            .collect::<Vec<_>>();
        let ranked = rank(matches, self.options.max_results);

        tracing::debug!(
            query = %query,
            home_shard = %home,
            shards = shards.len(),
            matches = ranked.counts.total(),
            rows = ranked.rows.len(),
            "search complete"
        );

        Ok(SearchResults {
            query: query.as_str().to_owned(),
            rows: ranked.rows,
            counts: ranked.counts,
            truncated: ranked.truncated,
            shards_searched: shards.iter().map(|shard| shard.id()).collect(),
            unavailable,
        })
    }

    fn key(&self, id: ShardId) -> ShardKey {
        ShardKey::new(Arc::clone(&self.section), id)
    }
}
