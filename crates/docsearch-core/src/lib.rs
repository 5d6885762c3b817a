//! Core shared types for docsearch.
//!
//! This crate holds the data model of a symbol search index shard, the
//! deterministic key → shard routing used by both the index generator and the
//! runtime, and query/key normalisation. It performs no IO.

#![forbid(unsafe_code)]

mod normalize;
mod registry;
mod shard;

pub use normalize::{normalize_key, normalize_query, NormalizedQuery};
pub use registry::{LayoutError, ShardId, ShardLayout, ShardRegistry};
pub use shard::{Entry, Shard, ShardBuilder, ShardError, ShardReport, Target, TargetKind};
