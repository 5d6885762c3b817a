//! Self-describing JSON shards:
//!
//! ```json
//! {
//!   "format": "docsearch-shard",
//!   "version": 1,
//!   "section": "all",
//!   "bucket": "g",
//!   "entries": [
//!     { "key": "getname", "label": "getName",
//!       "targets": [ { "scope": "ASTFunction", "locator": "../classASTFunction.html#ac0f4", "kind": "method" } ] }
//!   ]
//! }
//! ```
//!
//! Envelope drift rejects the shard; entry drift skips the entry.

use docsearch_core::{normalize_key, Entry, ShardBuilder, ShardId, ShardRegistry, Target, TargetKind};
use serde::Deserialize;

use crate::error::{DecodeError, LoadError};

pub const JSON_SHARD_FORMAT: &str = "docsearch-shard";
pub const JSON_SHARD_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    entries: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    key: String,
    label: String,
    targets: Vec<WireTarget>,
}

#[derive(Debug, Deserialize)]
struct WireTarget {
    #[serde(default)]
    scope: Option<String>,
    locator: String,
    #[serde(default)]
    kind: Option<TargetKind>,
    #[serde(default)]
    external: bool,
}

pub(crate) fn decode(
    text: &str,
    id: ShardId,
    registry: &ShardRegistry,
) -> Result<ShardBuilder, LoadError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::from)?;

    if envelope.format != JSON_SHARD_FORMAT {
        return Err(DecodeError::UnsupportedFormat {
            found: envelope.format,
        }
        .into());
    }
    if envelope.version != JSON_SHARD_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            expected: JSON_SHARD_VERSION,
            found: envelope.version,
        }
        .into());
    }

    if let Some(bucket) = envelope.bucket.as_deref() {
        let expected = registry.layout().bucket(id);
        let mut chars = bucket.chars();
        let declared = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };
        if declared.is_none() || declared != expected {
            return Err(LoadError::ShardIdMismatch {
                requested: id,
                found: format!(
                    "payload declares bucket {bucket:?}, layout expects {:?}",
                    expected.map(String::from).unwrap_or_default()
                ),
            });
        }
    }

    let entries = envelope.entries.ok_or(DecodeError::Missing { name: "entries" })?;
    tracing::trace!(
        shard = %id,
        section = envelope.section.as_deref().unwrap_or(""),
        rows = entries.len(),
        "decoding json shard"
    );

    let mut builder = ShardBuilder::with_capacity(id, entries.len());
    for (row_idx, value) in entries.into_iter().enumerate() {
        match decode_entry(value) {
            Some(entry) => builder.push(entry),
            None => {
                tracing::warn!(shard = %id, row = row_idx, "skipping malformed search index row");
                builder.skip_row();
            }
        }
    }
    Ok(builder)
}

fn decode_entry(value: serde_json::Value) -> Option<Entry> {
    let wire: WireEntry = serde_json::from_value(value).ok()?;
    let mut targets = Vec::with_capacity(wire.targets.len());
    for target in wire.targets {
        if target.locator.is_empty() {
            return None;
        }
        let kind = target
            .kind
            .unwrap_or_else(|| super::infer_kind(&target.locator));
        targets.push(Target {
            scope: target.scope.filter(|scope| !scope.is_empty()),
            locator: target.locator,
            kind,
            external: target.external,
        });
    }
    Entry::new(normalize_key(&wire.key), wire.label, targets).ok()
}
