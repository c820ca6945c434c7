//! The local JSON snapshot of the resolution index.
//!
//! Reads go through [`CacheSource`]. Writes go through [`CacheStore`]: an
//! exclusive lock on `<snapshot>.lock`, then a same-directory temp file
//! renamed over the snapshot.

use crate::error::{XrefError, XrefResult};
use crate::xref::index::{ResolutionIndex, SnapshotEntry};
use crate::xref::record::{FieldMapping, RawRow};
use crate::xref::source::{SourceAdapter, SourceKind};
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CacheSource {
    path: PathBuf,
    mapping: FieldMapping,
}

impl CacheSource {
    pub fn new(path: impl Into<PathBuf>, mapping: FieldMapping) -> Self {
        Self {
            path: path.into(),
            mapping,
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> XrefError {
        XrefError::unavailable(SourceKind::Cache.as_str(), reason)
    }
}

/// Expand an entry whose YV field is a list into one row per value; scalar
/// YV rows pass through unchanged.
fn expand_rows(items: Vec<Value>, mapping: &FieldMapping) -> Vec<RawRow> {
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(obj) = item else {
            continue;
        };
        match obj.get(&mapping.yv_field) {
            Some(Value::Array(values)) => {
                for value in values {
                    let mut row = obj.clone();
                    row.insert(mapping.yv_field.clone(), value.clone());
                    rows.push(row);
                }
            }
            _ => rows.push(obj),
        }
    }
    rows
}

impl SourceAdapter for CacheSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cache
    }

    fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    fn load(&self) -> XrefResult<Vec<RawRow>> {
        if !self.path.is_file() {
            return Err(self.unavailable(format!("snapshot missing: {}", self.path.display())));
        }
        tracing::info!(path = %self.path.display(), "reading cross-reference snapshot");

        let raw = fs::read_to_string(&self.path)
            .map_err(|err| self.unavailable(format!("read {}: {err}", self.path.display())))?;
        let payload: Value = serde_json::from_str(&raw)
            .map_err(|err| self.unavailable(format!("parse {}: {err}", self.path.display())))?;
        let Value::Array(items) = payload else {
            return Err(self.unavailable("snapshot is not an array"));
        };

        let rows = expand_rows(items, &self.mapping);
        if rows.is_empty() {
            return Err(self.unavailable("snapshot is empty"));
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    pub path: PathBuf,
    pub entries: usize,
    pub bytes: usize,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Replace the snapshot with `index`, serialized as `[{OE, YV: [...]}]`.
    pub fn write(&self, index: &ResolutionIndex) -> XrefResult<SnapshotWrite> {
        self.write_entries(&index.to_snapshot())
    }

    pub fn write_entries(&self, entries: &[SnapshotEntry]) -> XrefResult<SnapshotWrite> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let data = serde_json::to_string_pretty(entries)
            .map_err(|err| std::io::Error::other(format!("serialize snapshot: {err}")))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;

        let _ = FileExt::unlock(&lock);
        tracing::info!(
            path = %self.path.display(),
            entries = entries.len(),
            "cross-reference snapshot written"
        );

        Ok(SnapshotWrite {
            path: self.path.clone(),
            entries: entries.len(),
            bytes: data.len() + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::index::IndexBuilder;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::tempdir;

    #[test]
    fn snapshot_entries_expand_to_rows() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("ORJ_NO.json");
        fs::write(
            &path,
            r#"[{"OE":"A1","YV":["V1","V2"]},{"OE":"B2","YV":"V3"},"noise"]"#,
        )
        .expect("write");

        let rows = CacheSource::new(&path, FieldMapping::oe_yv())
            .load()
            .expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("YV"), Some(&Value::String("V2".into())));
        assert_eq!(rows[2].get("OE"), Some(&Value::String("B2".into())));
    }

    #[test]
    fn missing_empty_or_corrupt_snapshot_is_unavailable() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("ORJ_NO.json");
        let source = CacheSource::new(&path, FieldMapping::oe_yv());
        assert!(source.load().expect_err("missing").to_string().contains("missing"));

        fs::write(&path, "[]").expect("write");
        assert!(source.load().expect_err("empty").to_string().contains("empty"));

        fs::write(&path, "{not json").expect("write");
        assert!(source.load().expect_err("corrupt").to_string().contains("parse"));
    }

    #[test]
    fn store_writes_readable_snapshot_atomically() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("data").join("ORJ_NO.json");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "stale").expect("seed");

        let mut builder = IndexBuilder::new();
        builder.insert("A-1", "V1");
        builder.insert("A1", "V2");
        let index = builder.finish();

        let written = CacheStore::new(&path).write(&index).expect("write");
        assert_eq!(written.entries, 1);

        let parsed: Vec<SnapshotEntry> =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(
            parsed,
            vec![SnapshotEntry {
                oe: "A1".into(),
                yv: vec!["V1".into(), "V2".into()],
            }]
        );

        let mut leftovers: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        leftovers.sort();
        assert_eq!(leftovers, vec!["ORJ_NO.json", "ORJ_NO.json.lock"]);
    }

    #[test]
    fn written_snapshot_rebuilds_the_same_index() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("ORJ_NO.json");

        let mut builder = IndexBuilder::new();
        for (oe, yv) in [
            ("A-1", "V1"),
            ("a1", "V1"),
            ("A-1", "V2"),
            ("B 2", "V3"),
            ("B2", "V1"),
        ] {
            builder.insert(oe, yv);
        }
        let original = builder.finish();
        CacheStore::new(&path).write(&original).expect("write");

        let source = CacheSource::new(&path, FieldMapping::oe_yv());
        let rows = source.load().expect("load");
        let rebuilt = crate::xref::index::build(&rows, source.mapping());

        let as_sets = |index: &ResolutionIndex| {
            index
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().cloned().collect::<BTreeSet<_>>()))
                .collect::<BTreeMap<_, _>>()
        };
        assert_eq!(as_sets(&original), as_sets(&rebuilt));
    }
}
