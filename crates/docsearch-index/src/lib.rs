//! On-demand loading and querying of a sharded symbol search index.
//!
//! A [`QueryEngine`] routes each query to its home shard through the
//! [`ShardRegistry`](docsearch_core::ShardRegistry), asks the
//! [`ShardLoader`] for it (fetching at most once per shard, coalescing
//! concurrent requests), matches the shard's keys and ranks the result.
//!
//! Shards come from a [`ShardSource`]: a directory of generated files, an
//! in-memory table, or an HTTP base URL (`http` feature).

#![forbid(unsafe_code)]

mod engine;
mod error;
mod loader;
mod manifest;
mod matcher;
mod ranking;
mod source;
mod wire;

pub use engine::{QueryEngine, QueryOptions, SearchResults, SubstringScope};
pub use error::{DecodeError, FetchError, LoadError, SearchError};
pub use loader::{LoaderOptions, LoaderStats, ShardLoader, ShardStatus};
pub use manifest::{ManifestError, ManifestSection, SearchManifest};
pub use matcher::{classify, match_query, match_shard, Match, MatchStrength};
pub use ranking::{rank, Ranked, ResultRow, StrengthCounts};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{DirectorySource, MemorySource, ShardKey, ShardSource};
pub use wire::{decode_shard, ShardFormat, JSON_SHARD_FORMAT, JSON_SHARD_VERSION};
