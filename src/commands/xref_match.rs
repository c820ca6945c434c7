use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, record_audit, report_source};
use crate::xref::config::load_config;
use crate::xref::matcher::parse_keywords;
use crate::xref::paths::{XrefPaths, resolve_paths};
use crate::xref::pipeline::{UploadOutcome, XrefEngine};

fn original_name(file: &Path, name: Option<&str>) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    file.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn run_match(paths: &XrefPaths, file: &Path, keywords: &[String], name: &str) -> Result<UploadOutcome> {
    let engine = XrefEngine::new(paths.clone(), load_config(paths)?);
    let staged = engine.stage_upload(file)?;
    engine.process_upload(&staged, keywords, name)
}

pub fn run(file: &Path, keywords: &str, name: Option<&str>) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("match");
    let keywords = parse_keywords(keywords);
    let name = original_name(file, name);
    report.detail(format!("file={}", file.display()));
    report.detail(format!("keywords={}", keywords.join(",")));

    match run_match(&paths, file, &keywords, &name) {
        Ok(out) => {
            report_source(&mut report, out.source, &out.fallbacks);
            report.detail(format!("output={}", out.output_path.display()));
            report.detail(format!("output_name={}", out.output_name()));
            report.detail(format!("rows={}", out.rows));
            report.detail(format!("columns={}", out.relevant_headers.join(",")));
            report.detail(format!("query_values={}", out.query_values));
            report.detail(format!("found_values={}", out.found_values));
            report.detail(format!("annotated_rows={}", out.annotated_rows));
            if !out.upload_removed {
                report.detail("upload_removed=false");
            }
            for line in &out.retention {
                report.detail(format!("retention {line}"));
            }
        }
        Err(err) => report.fail(&err),
    }

    record_audit(&paths, &report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::original_name;
    use std::path::Path;

    #[test]
    fn explicit_name_wins_over_file_name() {
        let file = Path::new("/tmp/upload-123.csv");
        assert_eq!(original_name(file, Some("parts.csv")), "parts.csv");
        assert_eq!(original_name(file, Some("  ")), "upload-123.csv");
        assert_eq!(original_name(file, None), "upload-123.csv");
    }
}
