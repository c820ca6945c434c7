pub mod xref_match;
pub mod xref_retain;
pub mod xref_search;
pub mod xref_status;
pub mod xref_update;

use crate::error::{SourceFailure, XrefError};
use crate::xref::audit;
use crate::xref::paths::XrefPaths;
use crate::xref::source::SourceKind;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// Record a failed operation. Engine errors carry their stable code.
    pub fn fail(&mut self, err: &anyhow::Error) {
        match err.downcast_ref::<XrefError>() {
            Some(xref) => self.issue(format!("{}: {xref}", xref.code().as_str())),
            None => self.issue(format!("{err:#}")),
        }
    }
}

pub fn report_source(report: &mut CommandReport, source: SourceKind, fallbacks: &[SourceFailure]) {
    report.detail(format!("source={source}"));
    for failure in fallbacks {
        report.detail(format!(
            "fallback.{}={}",
            failure.source_name, failure.reason
        ));
    }
}

/// Append the command's outcome to the audit log. Audit failures are logged,
/// never surfaced as command failures.
pub fn record_audit(paths: &XrefPaths, report: &CommandReport) {
    let status = if report.ok { "ok" } else { "failed" };
    let message = if report.ok {
        report.details.join("; ")
    } else {
        report.issues.join("; ")
    };
    if let Err(err) = audit::append_event(paths, &report.command, status, &message) {
        tracing::warn!(error = %err, "failed to append audit event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_are_reported_with_their_code() {
        let mut report = CommandReport::new("search");
        report.fail(&anyhow::Error::new(XrefError::NoMatchesFound));
        assert!(!report.ok);
        assert!(report.issues[0].starts_with("E005_NO_MATCHES_FOUND: "));

        let mut other = CommandReport::new("search");
        other.fail(&anyhow::anyhow!("disk on fire"));
        assert_eq!(other.issues, vec!["disk on fire"]);
    }
}
