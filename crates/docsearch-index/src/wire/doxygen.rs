//! Shards in the generator's native JavaScript form:
//!
//! ```text
//! var searchData=
//! [
//!   ['getname',['getName',['../classA.html#a2f8f',1,'A::getName()'],['../classB.html#ac0f4',1,'B::getName()']]],
//! ];
//! ```
//!
//! Each row is `[key, [label, target...]]` and each target
//! `[locator, same_site_flag, scope]`.
//!
//! The generator writes keys as element ids: every character outside
//! `[a-z0-9]` and below U+0080 becomes `_` plus its code in hex (`~astnode`
//! is written `_7eastnode`), while files are still bucketed by the
//! unescaped first character. Keys are unescaped on decode so routing and
//! matching see the name as typed.

use std::borrow::Cow;

use docsearch_core::{normalize_key, Entry, ShardBuilder, ShardId, Target, TargetKind};

use super::js_literal::{parse_assignments, JsValue};
use crate::error::DecodeError;

const SEARCH_DATA: &str = "searchData";

pub(crate) fn decode(text: &str, id: ShardId) -> Result<ShardBuilder, DecodeError> {
    let assignments = parse_assignments(text)?;
    let rows = assignments
        .iter()
        .find(|(name, _)| name == SEARCH_DATA)
        .map(|(_, value)| value)
        .ok_or(DecodeError::Missing { name: SEARCH_DATA })?;
    let rows = rows
        .as_array()
        .ok_or_else(|| DecodeError::UnsupportedFormat {
            found: format!("`{SEARCH_DATA}` is not an array"),
        })?;

    let mut builder = ShardBuilder::with_capacity(id, rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        match decode_row(row) {
            Some(entry) => builder.push(entry),
            None => {
                tracing::warn!(shard = %id, row = row_idx, "skipping malformed search index row");
                builder.skip_row();
            }
        }
    }
    Ok(builder)
}

fn decode_row(row: &JsValue) -> Option<Entry> {
    let [key, body] = row.as_array()? else {
        return None;
    };
    let key = normalize_key(&unescape_key(key.as_str()?));
    let (label, targets) = body.as_array()?.split_first()?;
    let label = label.as_str()?;
    let targets = targets
        .iter()
        .map(|target| decode_target(target, label))
        .collect::<Option<Vec<_>>>()?;
    Entry::new(key, label, targets).ok()
}

fn decode_target(value: &JsValue, label: &str) -> Option<Target> {
    let [locator, flag, scope] = value.as_array()? else {
        return None;
    };
    let locator = locator.as_str()?;
    if locator.is_empty() {
        return None;
    }
    Some(classify_target(locator, flag.as_number()?, scope.as_str()?, label))
}

/// Reverses the generator's id escaping (`_7e` → `~`, `_5f` → `_`). An
/// underscore not followed by two hex digits is kept as is.
pub(crate) fn unescape_key(raw: &str) -> Cow<'_, str> {
    if !raw.contains('_') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('_') {
        out.push_str(&rest[..at]);
        let escaped = rest
            .get(at + 1..at + 3)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .filter(u8::is_ascii);
        match escaped {
            Some(byte) => {
                out.push(char::from(byte));
                rest = &rest[at + 3..];
            }
            None => {
                out.push('_');
                rest = &rest[at + 1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Recovers container and kind from the generator's display scope.
///
/// - `""` → no container.
/// - `"A::getName()"` (member part equals the label) → container `A`.
/// - `"CodeGenerator"` (single-target rows) → container `CodeGenerator`.
///
/// Kind is `Type` for pages without an anchor, otherwise derived from the
/// call parentheses and qualification.
pub(crate) fn classify_target(locator: &str, flag: i64, scope: &str, label: &str) -> Target {
    let anchored = locator.contains('#');
    let call = scope.ends_with("()");
    let member = scope.strip_suffix("()").unwrap_or(scope);

    let (container, qualified) = match member.rsplit_once("::") {
        Some((container, name)) if name == label => (Some(container), true),
        _ if member == label => (None, false),
        _ if scope.is_empty() => (None, false),
        _ => (Some(scope), false),
    };

    let kind = if !anchored {
        TargetKind::Type
    } else if call && qualified {
        TargetKind::Method
    } else if call {
        TargetKind::Function
    } else if qualified {
        TargetKind::Field
    } else {
        TargetKind::Member
    };

    Target {
        scope: container.filter(|c| !c.is_empty()).map(str::to_owned),
        locator: locator.to_owned(),
        kind,
        external: flag == 0,
    }
}
