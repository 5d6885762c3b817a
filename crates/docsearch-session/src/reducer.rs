use std::fmt;
use std::sync::Arc;

use docsearch_core::{NormalizedQuery, ShardId};
use docsearch_index::{SearchError, SearchResults};

/// Monotonic query counter. Larger is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a finished search reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Results(Arc<SearchResults>),
    /// The home shard could not be loaded; a later query may succeed.
    Unavailable { shard: ShardId, message: String },
    /// The index is structurally unreadable.
    Fatal { message: String },
}

impl Outcome {
    pub fn from_search(result: Result<SearchResults, SearchError>) -> Self {
        match result {
            Ok(results) => Outcome::Results(Arc::new(results)),
            Err(SearchError::Unavailable { shard, source }) => Outcome::Unavailable {
                shard,
                message: source.to_string(),
            },
            Err(err @ SearchError::IndexUnusable(_)) => Outcome::Fatal {
                message: err.to_string(),
            },
        }
    }
}

/// Visible state of one search box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No query text.
    #[default]
    Idle,
    Pending {
        generation: Generation,
        query: String,
    },
    Settled {
        generation: Generation,
        results: Arc<SearchResults>,
    },
    /// Search is temporarily unavailable for this query's shard.
    Unavailable {
        generation: Generation,
        query: String,
        shard: ShardId,
        message: String,
    },
    /// Terminal. The index cannot be searched.
    Halted { reason: String },
}

impl SessionState {
    pub fn generation(&self) -> Option<Generation> {
        match self {
            SessionState::Pending { generation, .. }
            | SessionState::Settled { generation, .. }
            | SessionState::Unavailable { generation, .. } => Some(*generation),
            SessionState::Idle | SessionState::Halted { .. } => None,
        }
    }

    pub fn results(&self) -> Option<&SearchResults> {
        match self {
            SessionState::Settled { results, .. } => Some(results),
            _ => None,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, SessionState::Halted { .. })
    }
}

/// Pure state machine over query submissions and search outcomes.
///
/// Only the outcome of the most recently issued generation is applied; older
/// outcomes are dropped. A fatal outcome halts the session whatever its
/// generation, since it describes the index rather than one query.
#[derive(Debug, Default)]
pub struct SessionReducer {
    issued: u64,
    state: SessionState,
}

impl SessionReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The newest generation handed out so far.
    pub fn latest(&self) -> Generation {
        Generation(self.issued)
    }

    /// Starts a new query. Returns the generation and normalized query to
    /// search for, or `None` when nothing needs searching (blank input or a
    /// halted session).
    pub fn issue(&mut self, raw: &str) -> Option<(Generation, String)> {
        if self.state.is_halted() {
            tracing::warn!("search is halted; ignoring query");
            return None;
        }

        // Even a blank query supersedes whatever is in flight.
        self.issued += 1;
        let generation = Generation(self.issued);

        match NormalizedQuery::new(raw) {
            Some(query) => {
                let query = query.as_str().to_owned();
                tracing::debug!(%generation, %query, "query pending");
                self.state = SessionState::Pending {
                    generation,
                    query: query.clone(),
                };
                Some((generation, query))
            }
            None => {
                tracing::debug!(%generation, "query cleared");
                self.state = SessionState::Idle;
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.issue("");
    }

    /// The query awaiting `generation`, if it is still the newest one and
    /// has not settled yet.
    fn pending_query(&self, generation: Generation) -> Option<String> {
        match &self.state {
            SessionState::Pending {
                generation: pending,
                query,
            } if *pending == generation => Some(query.clone()),
            _ => None,
        }
    }

    /// Applies `outcome` for `generation`; returns whether the visible state
    /// changed.
    pub fn apply(&mut self, generation: Generation, outcome: Outcome) -> bool {
        if self.state.is_halted() {
            return false;
        }

        let query = match self.pending_query(generation) {
            Some(query) => query,
            None if matches!(outcome, Outcome::Fatal { .. }) => String::new(),
            None => {
                tracing::trace!(%generation, latest = self.issued, "discarding stale search outcome");
                return false;
            }
        };

        self.state = match outcome {
            Outcome::Results(results) => {
                tracing::debug!(%generation, rows = results.rows.len(), "query settled");
                SessionState::Settled {
                    generation,
                    results,
                }
            }
            Outcome::Unavailable { shard, message } => {
                tracing::debug!(%generation, %shard, "query unavailable");
                SessionState::Unavailable {
                    generation,
                    query,
                    shard,
                    message,
                }
            }
            Outcome::Fatal { message } => {
                tracing::error!(%generation, reason = %message, "halting search session");
                SessionState::Halted { reason: message }
            }
        };
        true
    }
}
