//! The OE→YV resolution index and the builder that produces it.

use crate::error::{XrefError, XrefResult};
use crate::xref::normalize::normalize;
use crate::xref::record::{FieldMapping, RawRow, field_text};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const MIN_QUERY_CHARS: usize = 2;

/// One persisted entry of the cache snapshot: a canonical key and its
/// deduplicated YV list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(rename = "OE")]
    pub oe: String,
    #[serde(rename = "YV")]
    pub yv: Vec<String>,
}

#[derive(Debug, Default)]
struct Bucket {
    values: Vec<String>,
    seen: HashSet<String>,
}

impl Bucket {
    fn insert(&mut self, value: String) {
        if self.seen.insert(value.clone()) {
            self.values.push(value);
        }
    }
}

/// Accumulates (OE, YV) pairs into ordered, deduplicated buckets.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    keys: Vec<String>,
    buckets: HashMap<String, Bucket>,
    rows_seen: usize,
    rows_skipped: usize,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one pair. Returns false when the pair is unusable (either side
    /// blank after trimming, or an OE with no letters or digits).
    pub fn insert(&mut self, oe: &str, yv: &str) -> bool {
        self.rows_seen += 1;
        let oe = oe.trim();
        let yv = yv.trim();
        if oe.is_empty() || yv.is_empty() {
            self.rows_skipped += 1;
            return false;
        }
        let key = normalize(oe);
        // An empty key would pool every punctuation-only OE into one bucket.
        if key.is_empty() {
            self.rows_skipped += 1;
            return false;
        }

        if !self.buckets.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.buckets.entry(key).or_default().insert(yv.to_string());
        true
    }

    pub fn insert_row(&mut self, row: &RawRow, mapping: &FieldMapping) -> bool {
        let oe = field_text(row, &mapping.oe_field);
        let yv = field_text(row, &mapping.yv_field);
        match (oe, yv) {
            (Some(oe), Some(yv)) => self.insert(&oe, &yv),
            _ => {
                self.rows_seen += 1;
                self.rows_skipped += 1;
                false
            }
        }
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    pub fn finish(self) -> ResolutionIndex {
        let mut buckets = self.buckets;
        let mut entries = Vec::with_capacity(self.keys.len());
        let mut positions = HashMap::with_capacity(self.keys.len());
        for key in self.keys {
            let values = buckets.remove(&key).map(|b| b.values).unwrap_or_default();
            positions.insert(key.clone(), entries.len());
            entries.push((key, values));
        }
        tracing::debug!(
            keys = entries.len(),
            rows = self.rows_seen,
            skipped = self.rows_skipped,
            "resolution index built"
        );
        ResolutionIndex { entries, positions }
    }
}

/// Trimmed query, or `InvalidQuery` when shorter than two characters.
pub fn check_query(query: &str) -> XrefResult<&str> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Err(XrefError::InvalidQuery(format!(
            "OE number must be at least {MIN_QUERY_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// Build an index from raw rows, reading OE and YV through `mapping`.
pub fn build(rows: &[RawRow], mapping: &FieldMapping) -> ResolutionIndex {
    let mut builder = IndexBuilder::new();
    for row in rows {
        builder.insert_row(row, mapping);
    }
    builder.finish()
}

/// Immutable canonical-key → YV list map. Rebuilding yields a new value.
#[derive(Debug, Clone, Default)]
pub struct ResolutionIndex {
    entries: Vec<(String, Vec<String>)>,
    positions: HashMap<String, usize>,
}

impl ResolutionIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Bucket for an already-canonical key.
    pub fn bucket(&self, key: &str) -> Option<&[String]> {
        let pos = *self.positions.get(key)?;
        Some(self.entries[pos].1.as_slice())
    }

    /// Point lookup for a user-supplied OE.
    pub fn lookup(&self, query: &str) -> XrefResult<Vec<String>> {
        let trimmed = check_query(query)?;
        Ok(self
            .bucket(&normalize(trimmed))
            .map(<[String]>::to_vec)
            .unwrap_or_default())
    }

    /// Resolve a query cell that may hold several comma-separated OE
    /// spellings. `None` when no part resolves.
    pub fn resolve_composite(&self, query: &str) -> Option<Vec<String>> {
        if !query.contains(',') {
            let key = normalize(query.trim());
            return self.bucket(&key).map(<[String]>::to_vec);
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for part in query.split(',') {
            let key = normalize(part.trim());
            if key.is_empty() {
                continue;
            }
            let Some(values) = self.bucket(&key) else {
                continue;
            };
            for value in values {
                if seen.insert(value.as_str()) {
                    found.push(value.clone());
                }
            }
        }

        if found.is_empty() { None } else { Some(found) }
    }

    pub fn to_snapshot(&self) -> Vec<SnapshotEntry> {
        self.iter()
            .map(|(oe, yv)| SnapshotEntry {
                oe: oe.to_string(),
                yv: yv.to_vec(),
            })
            .collect()
    }
}
