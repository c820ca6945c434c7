use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrefError {
    #[error("source `{source_name}` unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    #[error("all sources exhausted: {}", summarize_failures(.failures))]
    AllSourcesExhausted { failures: Vec<SourceFailure> },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("no column header contains any of the keywords '{}'", .keywords.join(", "))]
    NoMatchingColumns { keywords: Vec<String> },
    #[error("no cross-reference matches found for the selected columns")]
    NoMatchesFound,
    #[error("empty source: {0}")]
    EmptySource(String),
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("retention left {failed} of {attempted} deletions failed in {dir}")]
    RetentionPartialFailure {
        dir: String,
        failed: usize,
        attempted: usize,
    },
    #[error("sheet error: {0}")]
    Sheet(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_name: String,
    pub reason: String,
}

fn summarize_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return "no sources configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.source_name, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefErrorCode {
    E001SourceUnavailable,
    E002AllSourcesExhausted,
    E003InvalidQuery,
    E004NoMatchingColumns,
    E005NoMatchesFound,
    E006EmptySource,
    E007DirectoryNotFound,
    E008RetentionPartialFailure,
    E009Sheet,
    E010ConfigInvalid,
    E011Io,
}

impl XrefErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001SourceUnavailable => "E001_SOURCE_UNAVAILABLE",
            Self::E002AllSourcesExhausted => "E002_ALL_SOURCES_EXHAUSTED",
            Self::E003InvalidQuery => "E003_INVALID_QUERY",
            Self::E004NoMatchingColumns => "E004_NO_MATCHING_COLUMNS",
            Self::E005NoMatchesFound => "E005_NO_MATCHES_FOUND",
            Self::E006EmptySource => "E006_EMPTY_SOURCE",
            Self::E007DirectoryNotFound => "E007_DIRECTORY_NOT_FOUND",
            Self::E008RetentionPartialFailure => "E008_RETENTION_PARTIAL_FAILURE",
            Self::E009Sheet => "E009_SHEET",
            Self::E010ConfigInvalid => "E010_CONFIG_INVALID",
            Self::E011Io => "E011_IO",
        }
    }
}

impl XrefError {
    pub fn code(&self) -> XrefErrorCode {
        match self {
            Self::SourceUnavailable { .. } => XrefErrorCode::E001SourceUnavailable,
            Self::AllSourcesExhausted { .. } => XrefErrorCode::E002AllSourcesExhausted,
            Self::InvalidQuery(_) => XrefErrorCode::E003InvalidQuery,
            Self::NoMatchingColumns { .. } => XrefErrorCode::E004NoMatchingColumns,
            Self::NoMatchesFound => XrefErrorCode::E005NoMatchesFound,
            Self::EmptySource(_) => XrefErrorCode::E006EmptySource,
            Self::DirectoryNotFound(_) => XrefErrorCode::E007DirectoryNotFound,
            Self::RetentionPartialFailure { .. } => XrefErrorCode::E008RetentionPartialFailure,
            Self::Sheet(_) => XrefErrorCode::E009Sheet,
            Self::InvalidConfig(_) => XrefErrorCode::E010ConfigInvalid,
            Self::Io(_) => XrefErrorCode::E011Io,
        }
    }

    pub fn unavailable(source_name: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type XrefResult<T> = Result<T, XrefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_lists_every_failure() {
        let err = XrefError::AllSourcesExhausted {
            failures: vec![
                SourceFailure {
                    source_name: "remote".to_string(),
                    reason: "status 503".to_string(),
                },
                SourceFailure {
                    source_name: "cache".to_string(),
                    reason: "file missing".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "all sources exhausted: remote: status 503; cache: file missing"
        );
        assert_eq!(err.code().as_str(), "E002_ALL_SOURCES_EXHAUSTED");
    }

    #[test]
    fn no_matching_columns_names_keywords() {
        let err = XrefError::NoMatchingColumns {
            keywords: vec!["OE".to_string(), "TRW".to_string()],
        };
        assert!(err.to_string().contains("'OE, TRW'"));
    }
}
