//! Shard wire formats.
//!
//! Both formats carry the same table: one row per entry,
//! `(key, label, [(scope, locator, ...), ...])`. Locators are opaque.

mod doxygen;
mod js_literal;
mod json;

pub(crate) use js_literal::{parse_assignments, JsValue};
pub use json::{JSON_SHARD_FORMAT, JSON_SHARD_VERSION};

use docsearch_core::{Shard, ShardId, ShardRegistry, TargetKind};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, LoadError};

/// Encoding of shard files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardFormat {
    /// Sniff the payload: `{` starts a JSON shard, anything else is treated
    /// as generator JavaScript.
    #[default]
    Auto,
    Doxygen,
    Json,
}

impl ShardFormat {
    /// File extension used when addressing shards on disk or over HTTP.
    pub fn extension(self) -> &'static str {
        match self {
            ShardFormat::Auto | ShardFormat::Doxygen => "js",
            ShardFormat::Json => "json",
        }
    }

    fn resolve(self, text: &str) -> ShardFormat {
        match self {
            ShardFormat::Auto => {
                if text.trim_start().starts_with('{') {
                    ShardFormat::Json
                } else {
                    ShardFormat::Doxygen
                }
            }
            other => other,
        }
    }
}

/// Decodes one shard payload and checks that every key routes back to the
/// requested shard.
pub fn decode_shard(
    bytes: &[u8],
    format: ShardFormat,
    requested: ShardId,
    registry: &ShardRegistry,
) -> Result<Shard, LoadError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let builder = match format.resolve(text) {
        ShardFormat::Json => json::decode(text, requested, registry)?,
        _ => doxygen::decode(text, requested)?,
    };
    let shard = builder.finish();
    verify_routing(&shard, registry)?;

    let report = shard.report();
    if !report.is_clean() {
        tracing::warn!(
            shard = %requested,
            skipped_rows = report.skipped_rows,
            duplicate_keys = report.duplicate_keys,
            reordered = report.reordered,
            "shard required repairs while loading"
        );
    }
    Ok(shard)
}

fn verify_routing(shard: &Shard, registry: &ShardRegistry) -> Result<(), LoadError> {
    for entry in shard.entries() {
        let routed = registry.shard_for_key(entry.key());
        if routed != Some(shard.id()) {
            let found = match routed {
                Some(other) => format!("key {:?} routes to shard {other}", entry.key()),
                None => format!("key {:?} is unroutable", entry.key()),
            };
            return Err(LoadError::ShardIdMismatch {
                requested: shard.id(),
                found,
            });
        }
    }
    Ok(())
}

/// Kind for targets whose payload does not say: anchored locators point at a
/// member, bare pages at a type.
pub(crate) fn infer_kind(locator: &str) -> TargetKind {
    if locator.contains('#') {
        TargetKind::Member
    } else {
        TargetKind::Type
    }
}
