//! Tiered raw-record sources and the fallback coordinator.

pub mod cache;
pub mod local_sheet;
pub mod remote;

use crate::error::{SourceFailure, XrefError, XrefResult};
use crate::xref::index::{self, ResolutionIndex};
use crate::xref::record::{FieldMapping, RawRow};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Remote,
    Cache,
    LocalSheet,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Cache => "cache",
            Self::LocalSheet => "local-sheet",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" | "google" | "sheets" => Ok(Self::Remote),
            "cache" | "json" => Ok(Self::Cache),
            "local-sheet" | "local_sheet" | "local" => Ok(Self::LocalSheet),
            other => Err(format!(
                "unknown source `{other}`; use remote, cache, or local-sheet"
            )),
        }
    }
}

/// A backing store that yields raw cross-reference rows.
pub trait SourceAdapter {
    fn kind(&self) -> SourceKind;

    /// Field pair the rows from this source use.
    fn mapping(&self) -> &FieldMapping;

    /// Fails with `SourceUnavailable` when the store is unreachable, unreadable,
    /// or empty.
    fn load(&self) -> XrefResult<Vec<RawRow>>;
}

/// Rows from the first adapter that produced any, tagged with where they came
/// from and which adapters failed before it.
#[derive(Debug, Clone)]
pub struct LoadedRows {
    pub source: SourceKind,
    pub mapping: FieldMapping,
    pub rows: Vec<RawRow>,
    pub skipped: Vec<SourceFailure>,
}

impl LoadedRows {
    pub fn build_index(&self) -> ResolutionIndex {
        index::build(&self.rows, &self.mapping)
    }
}

fn failure_from(kind: SourceKind, err: XrefError) -> SourceFailure {
    let reason = match err {
        XrefError::SourceUnavailable { reason, .. } => reason,
        other => other.to_string(),
    };
    SourceFailure {
        source_name: kind.as_str().to_string(),
        reason,
    }
}

/// Try each adapter in order and return the first success. Rows are never
/// merged across adapters.
pub fn load_with_fallback(adapters: &[Box<dyn SourceAdapter>]) -> XrefResult<LoadedRows> {
    let mut failures = Vec::new();
    for adapter in adapters {
        let kind = adapter.kind();
        match adapter.load() {
            Ok(rows) => {
                tracing::info!(source = %kind, rows = rows.len(), "cross-reference rows loaded");
                return Ok(LoadedRows {
                    source: kind,
                    mapping: adapter.mapping().clone(),
                    rows,
                    skipped: failures,
                });
            }
            Err(err) => {
                tracing::warn!(source = %kind, error = %err, "source unavailable, falling back");
                failures.push(failure_from(kind, err));
            }
        }
    }
    Err(XrefError::AllSourcesExhausted { failures })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::record::row_from_pairs;

    struct StubSource {
        kind: SourceKind,
        mapping: FieldMapping,
        rows: Option<Vec<RawRow>>,
    }

    impl StubSource {
        fn ok(kind: SourceKind, rows: Vec<RawRow>) -> Self {
            Self {
                kind,
                mapping: FieldMapping::orj_no(),
                rows: Some(rows),
            }
        }

        fn failing(kind: SourceKind) -> Self {
            Self {
                kind,
                mapping: FieldMapping::orj_no(),
                rows: None,
            }
        }
    }

    impl SourceAdapter for StubSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn mapping(&self) -> &FieldMapping {
            &self.mapping
        }

        fn load(&self) -> XrefResult<Vec<RawRow>> {
            self.rows
                .clone()
                .ok_or_else(|| XrefError::unavailable(self.kind.as_str(), "stub offline"))
        }
    }

    #[test]
    fn primary_success_short_circuits() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StubSource::ok(
                SourceKind::Remote,
                vec![row_from_pairs([("orjNo", "A1"), ("yvNo", "V1")])],
            )),
            Box::new(StubSource::ok(SourceKind::Cache, Vec::new())),
        ];
        let loaded = load_with_fallback(&adapters).expect("loaded");
        assert_eq!(loaded.source, SourceKind::Remote);
        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.build_index().lookup("A1").expect("lookup"), vec!["V1"]);
    }

    #[test]
    fn failing_primary_falls_through_to_secondary() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StubSource::failing(SourceKind::Remote)),
            Box::new(StubSource::ok(
                SourceKind::Cache,
                vec![row_from_pairs([("orjNo", "B2"), ("yvNo", "V2")])],
            )),
        ];
        let loaded = load_with_fallback(&adapters).expect("loaded");
        assert_eq!(loaded.source, SourceKind::Cache);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].source_name, "remote");
        assert_eq!(loaded.skipped[0].reason, "stub offline");
    }

    #[test]
    fn every_failure_is_reported_when_exhausted() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StubSource::failing(SourceKind::Cache)),
            Box::new(StubSource::failing(SourceKind::Remote)),
        ];
        let err = load_with_fallback(&adapters).expect_err("exhausted");
        let XrefError::AllSourcesExhausted { failures } = err else {
            panic!("unexpected error");
        };
        let names: Vec<_> = failures.iter().map(|f| f.source_name.as_str()).collect();
        assert_eq!(names, vec!["cache", "remote"]);
    }

    #[test]
    fn empty_chain_is_exhausted() {
        let err = load_with_fallback(&[]).expect_err("exhausted");
        assert!(matches!(err, XrefError::AllSourcesExhausted { .. }));
    }

    #[test]
    fn source_names_parse_with_aliases() {
        assert_eq!("Remote".parse::<SourceKind>(), Ok(SourceKind::Remote));
        assert_eq!("local_sheet".parse::<SourceKind>(), Ok(SourceKind::LocalSheet));
        assert!("ftp".parse::<SourceKind>().is_err());
    }
}
