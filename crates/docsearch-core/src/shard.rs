use serde::{Deserialize, Serialize};

use crate::registry::ShardId;

/// Category of a documented entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A class, struct, enum, typedef or namespace page.
    Type,
    /// A free function.
    Function,
    /// A member function.
    Method,
    /// A data member.
    Field,
    /// A member of a type whose exact category the index does not record.
    Member,
}

/// One concrete documented symbol behind an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Enclosing container (class, namespace), if any.
    pub scope: Option<String>,
    /// Opaque page + anchor reference. Never interpreted by the search engine.
    pub locator: String,
    pub kind: TargetKind,
    /// Link points outside the generated site (tag-file reference).
    #[serde(default)]
    pub external: bool,
}

impl Target {
    /// Text shown for this target when an entry lists several overloads,
    /// e.g. `ASTDeclNode::getName()`.
    pub fn display_name(&self, label: &str) -> String {
        let call = matches!(self.kind, TargetKind::Method | TargetKind::Function);
        let mut out = String::with_capacity(label.len() + 8);
        if let Some(scope) = &self.scope {
            out.push_str(scope);
            out.push_str("::");
        }
        out.push_str(label);
        if call {
            out.push_str("()");
        }
        out
    }
}

/// One row of a shard: a lookup key, its display label and every target that
/// shares that name.
///
/// Target order is the generator's order and determines on-screen order for
/// overloads; it is never changed after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    key: String,
    label: String,
    targets: Vec<Target>,
}

impl Entry {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        targets: Vec<Target>,
    ) -> Result<Self, ShardError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ShardError::EmptyKey);
        }
        if targets.is_empty() {
            return Err(ShardError::EmptyTargets { key });
        }
        Ok(Self {
            key,
            label: label.into(),
            targets,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    #[error("entry has an empty key")]
    EmptyKey,

    #[error("entry {key:?} has no targets")]
    EmptyTargets { key: String },
}

/// What the loader had to repair while assembling a shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardReport {
    /// Rows dropped because required fields were missing or malformed.
    pub skipped_rows: usize,
    /// Rows dropped because their key was already present.
    pub duplicate_keys: usize,
    /// Rows were not in key order and had to be re-sorted.
    pub reordered: bool,
}

impl ShardReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// An immutable, key-sorted partition of the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    id: ShardId,
    entries: Vec<Entry>,
    report: ShardReport,
}

impl Shard {
    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn report(&self) -> ShardReport {
        self.report
    }

    /// Exact key lookup.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries
            .binary_search_by(|entry| entry.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Approximate heap memory usage of this shard in bytes.
    pub fn estimated_bytes(&self) -> u64 {
        use std::mem::size_of;

        let mut bytes = (self.entries.capacity() * size_of::<Entry>()) as u64;
        for entry in &self.entries {
            bytes = bytes.saturating_add(entry.key.capacity() as u64);
            bytes = bytes.saturating_add(entry.label.capacity() as u64);
            bytes = bytes.saturating_add((entry.targets.capacity() * size_of::<Target>()) as u64);
            for target in &entry.targets {
                bytes = bytes.saturating_add(target.locator.capacity() as u64);
                if let Some(scope) = &target.scope {
                    bytes = bytes.saturating_add(scope.capacity() as u64);
                }
            }
        }
        bytes
    }
}

/// Assembles a [`Shard`] from decoded rows, enforcing the sorted-unique-key
/// invariant.
#[derive(Debug)]
pub struct ShardBuilder {
    id: ShardId,
    entries: Vec<Entry>,
    report: ShardReport,
}

impl ShardBuilder {
    pub fn new(id: ShardId) -> Self {
        Self {
            id,
            entries: Vec::new(),
            report: ShardReport::default(),
        }
    }

    pub fn with_capacity(id: ShardId, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ..Self::new(id)
        }
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Records a malformed row that was dropped during decoding.
    pub fn skip_row(&mut self) {
        self.report.skipped_rows += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Shard {
        let Self {
            id,
            mut entries,
            mut report,
        } = self;

        if entries.windows(2).any(|pair| pair[0].key > pair[1].key) {
            report.reordered = true;
            // Stable: among equal keys the first occurrence stays first.
            entries.sort_by(|a, b| a.key.cmp(&b.key));
        }

        let before = entries.len();
        entries.dedup_by(|later, earlier| later.key == earlier.key);
        report.duplicate_keys = before - entries.len();

        Shard {
            id,
            entries,
            report,
        }
    }
}
