/// Normalises raw search box text: trims, lowercases and collapses every run of
/// internal whitespace into a single ASCII space.
///
/// Returns an empty string for empty or whitespace-only input.
pub fn normalize_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        for ch in word.chars() {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Normalises an index key as read from a shard.
///
/// Keys are emitted lowercase by the generator; this is idempotent for
/// well-formed keys and repairs casing drift for everything else.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.bytes().any(|b| b.is_ascii_uppercase()) || !trimmed.is_ascii() {
        trimmed.to_lowercase()
    } else {
        trimmed.to_owned()
    }
}

/// A non-empty, normalised query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedQuery {
    text: String,
    first: char,
}

impl NormalizedQuery {
    /// Normalises `raw`; returns `None` when nothing searchable remains.
    pub fn new(raw: &str) -> Option<Self> {
        let text = normalize_query(raw);
        let first = text.chars().next()?;
        Some(Self { text, first })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// First character of the normalised query; selects the home shard.
    pub fn first_char(&self) -> char {
        self.first
    }
}

impl std::fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
