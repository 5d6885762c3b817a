use docsearch_core::ShardId;

/// A shard could not be retrieved from its source.
///
/// Errors are `Clone` because a single coalesced fetch hands its outcome to
/// every query waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("shard {location} not found")]
    NotFound { location: String },

    #[error("io error reading {location}: {message}")]
    Io { location: String, message: String },

    #[error("http fetch failed: {message}")]
    Http { message: String },

    #[error("fetch of {location} timed out after {timeout_ms}ms")]
    Timeout { location: String, timeout_ms: u64 },

    #[error("shard {location} is {size} bytes, above the {limit} byte limit")]
    TooLarge {
        location: String,
        size: u64,
        limit: u64,
    },
}

/// The shard payload as a whole is unreadable. Individual bad rows never
/// produce this; they are skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("shard payload is not valid UTF-8")]
    NotUtf8,

    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unsupported shard format: {found:?}")]
    UnsupportedFormat { found: String },

    #[error("unsupported shard format version: expected {expected}, found {found}")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("shard payload is missing `{name}`")]
    Missing { name: &'static str },

    #[error("json error: {message}")]
    Json { message: String },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        // Keep line/column, drop echoed string values.
        let message = match err.classify() {
            serde_json::error::Category::Syntax | serde_json::error::Category::Eof => {
                format!("malformed json at line {} column {}", err.line(), err.column())
            }
            serde_json::error::Category::Data => {
                format!("unexpected json shape at line {} column {}", err.line(), err.column())
            }
            serde_json::error::Category::Io => "io error while reading json".to_owned(),
        };
        Self::Json { message }
    }
}

/// Failure of [`crate::ShardLoader::load`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The generator and the runtime disagree on key → shard routing. The
    /// index is structurally unreadable.
    #[error("shard id mismatch: requested shard {requested}, but {found}")]
    ShardIdMismatch { requested: ShardId, found: String },
}

impl LoadError {
    /// Only routing disagreements are unrecoverable; everything else may
    /// succeed on retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::ShardIdMismatch { .. })
    }
}

/// Failure of [`crate::QueryEngine::search`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// Search is temporarily unavailable for queries routed to `shard`.
    #[error("search unavailable for shard {shard}: {source}")]
    Unavailable { shard: ShardId, source: LoadError },

    /// The index cannot be used at all.
    #[error("search index is unusable: {0}")]
    IndexUnusable(LoadError),
}

impl SearchError {
    pub(crate) fn from_load(shard: ShardId, err: LoadError) -> Self {
        if err.is_fatal() {
            SearchError::IndexUnusable(err)
        } else {
            SearchError::Unavailable { shard, source: err }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::IndexUnusable(_))
    }
}
