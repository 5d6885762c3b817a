//! The generator's `searchdata.js` manifest, which declares the index
//! sections and the bucket characters each section is sharded by:
//!
//! ```text
//! var indexSectionsWithContent =
//! {
//!   0: "_abcdefghijlmnoprstuvw~",
//!   1: "abcdefgilmnoprstuvw"
//! };
//!
//! var indexSectionNames =
//! {
//!   0: "all",
//!   1: "classes"
//! };
//! ```

use std::collections::BTreeMap;

use docsearch_core::{LayoutError, ShardLayout};

use crate::error::DecodeError;
use crate::wire::{parse_assignments, JsValue};

const SECTIONS_WITH_CONTENT: &str = "indexSectionsWithContent";
const SECTION_NAMES: &str = "indexSectionNames";
const SECTION_LABELS: &str = "indexSectionLabels";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("manifest is missing `{name}`")]
    Missing { name: &'static str },

    #[error("manifest section {section} has an invalid layout: {source}")]
    InvalidLayout {
        section: String,
        #[source]
        source: LayoutError,
    },
}

/// One index section (`all`, `classes`, `functions`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSection {
    pub number: u32,
    /// File prefix of this section's shards (`all` → `all_<n>.js`).
    pub name: String,
    /// Human readable label, when the manifest provides one.
    pub label: Option<String>,
    pub layout: ShardLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchManifest {
    sections: Vec<ManifestSection>,
}

impl SearchManifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let assignments = parse_assignments(text)?;
        let lookup = |name: &'static str| {
            assignments
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, value)| numbered_strings(value))
        };

        let contents = lookup(SECTIONS_WITH_CONTENT).ok_or(ManifestError::Missing {
            name: SECTIONS_WITH_CONTENT,
        })?;
        let names = lookup(SECTION_NAMES).ok_or(ManifestError::Missing {
            name: SECTION_NAMES,
        })?;
        let labels = lookup(SECTION_LABELS).unwrap_or_default();

        let mut sections = Vec::with_capacity(names.len());
        for (number, name) in names {
            let Some(buckets) = contents.get(&number) else {
                tracing::debug!(section = %name, "manifest section has no content entry");
                continue;
            };
            if buckets.is_empty() {
                tracing::debug!(section = %name, "manifest section is empty");
                continue;
            }
            let layout =
                ShardLayout::parse(buckets).map_err(|source| ManifestError::InvalidLayout {
                    section: name.clone(),
                    source,
                })?;
            sections.push(ManifestSection {
                number,
                label: labels.get(&number).cloned(),
                name,
                layout,
            });
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[ManifestSection] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&ManifestSection> {
        self.sections.iter().find(|section| section.name == name)
    }
}

/// `{ 0: "a", 1: "b" }` → `{0: "a", 1: "b"}`; non-numeric keys and
/// non-string values are ignored.
fn numbered_strings(value: &JsValue) -> BTreeMap<u32, String> {
    let JsValue::Object(fields) = value else {
        return BTreeMap::new();
    };
    fields
        .iter()
        .filter_map(|(key, value)| Some((key.parse().ok()?, value.as_str()?.to_owned())))
        .collect()
}
