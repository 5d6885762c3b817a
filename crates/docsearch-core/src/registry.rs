use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of one index shard: the position of its bucket character in the
/// [`ShardLayout`].
///
/// Shard files carry the index in lowercase hex (`all_6.js` is shard `6`,
/// `all_15.js` is shard `21`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(u32);

impl ShardId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("shard layout has no buckets")]
    Empty,

    #[error("shard layout bucket {bucket:?} is not lowercase")]
    NotLowercase { bucket: char },

    #[error("shard layout buckets must be strictly ascending: {previous:?} then {bucket:?}")]
    NotAscending { previous: char, bucket: char },
}

/// The ordered set of bucket characters a search index is partitioned by.
///
/// The layout is fixed when the index is generated; the runtime must use the
/// exact same layout or routing disagrees with the data on disk.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShardLayout {
    buckets: Arc<[char]>,
}

impl ShardLayout {
    pub fn new(buckets: impl IntoIterator<Item = char>) -> Result<Self, LayoutError> {
        let buckets: Vec<char> = buckets.into_iter().collect();
        if buckets.is_empty() {
            return Err(LayoutError::Empty);
        }
        for &bucket in &buckets {
            if fold_char(bucket) != bucket {
                return Err(LayoutError::NotLowercase { bucket });
            }
        }
        for pair in buckets.windows(2) {
            if pair[0] >= pair[1] {
                return Err(LayoutError::NotAscending {
                    previous: pair[0],
                    bucket: pair[1],
                });
            }
        }
        Ok(Self {
            buckets: buckets.into(),
        })
    }

    /// Parses a layout written as a plain string of bucket characters, e.g.
    /// `"_abcdefghijklmnopqrstuvwxyz~"`.
    pub fn parse(buckets: &str) -> Result<Self, LayoutError> {
        Self::new(buckets.chars())
    }

    /// One bucket per ASCII letter.
    pub fn alphabet() -> Self {
        Self {
            buckets: ('a'..='z').collect::<Vec<_>>().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> &[char] {
        &self.buckets
    }

    pub fn bucket(&self, id: ShardId) -> Option<char> {
        self.buckets.get(id.index() as usize).copied()
    }

    /// Looks up the shard whose bucket is exactly `bucket`.
    pub fn id_of_bucket(&self, bucket: char) -> Option<ShardId> {
        self.buckets
            .binary_search(&bucket)
            .ok()
            .map(|idx| ShardId::new(idx as u32))
    }

    /// Stable 64-bit FNV-1a fingerprint of the layout, for logs and
    /// compatibility checks between generator and runtime.
    pub fn fingerprint(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = OFFSET;
        for &bucket in self.buckets.iter() {
            for byte in (bucket as u32).to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(PRIME);
            }
        }
        hash
    }
}

impl Default for ShardLayout {
    fn default() -> Self {
        Self::alphabet()
    }
}

impl fmt::Debug for ShardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: String = self.buckets.iter().collect();
        f.debug_tuple("ShardLayout").field(&text).finish()
    }
}

impl fmt::Display for ShardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bucket in self.buckets.iter() {
            f.write_fmt(format_args!("{bucket}"))?;
        }
        Ok(())
    }
}

#[inline]
fn fold_char(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_lowercase();
    }
    // Multi-char lowercase expansions keep their first scalar; routing only
    // ever looks at one character.
    c.to_lowercase().next().unwrap_or(c)
}

/// Routes keys to shards.
///
/// `shard_id_for` is total: characters that have no bucket of their own
/// (digits, punctuation, non-ASCII) collapse into the bucket with the nearest
/// code point, ties going to the lower bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardRegistry {
    layout: ShardLayout,
}

impl ShardRegistry {
    pub fn new(layout: ShardLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    pub fn shard_id_for(&self, c: char) -> ShardId {
        let c = fold_char(c);
        let buckets = self.layout.buckets();
        let idx = match buckets.binary_search(&c) {
            Ok(idx) => idx,
            Err(0) => 0,
            Err(idx) if idx == buckets.len() => idx - 1,
            Err(idx) => {
                let below = c as u32 - buckets[idx - 1] as u32;
                let above = buckets[idx] as u32 - c as u32;
                if below <= above {
                    idx - 1
                } else {
                    idx
                }
            }
        };
        ShardId::new(idx as u32)
    }

    /// Routes a key by its first character. `None` only for empty keys.
    pub fn shard_for_key(&self, key: &str) -> Option<ShardId> {
        key.chars().next().map(|c| self.shard_id_for(c))
    }

    pub fn all_shard_ids(&self) -> impl Iterator<Item = ShardId> + '_ {
        (0..self.layout.len() as u32).map(ShardId::new)
    }

    pub fn shard_count(&self) -> usize {
        self.layout.len()
    }
}
