//! End-to-end flows: single lookup, bulk upload matching, and snapshot refresh.

use crate::error::{SourceFailure, XrefError};
use crate::xref::config::XrefConfig;
use crate::xref::index::{self, ResolutionIndex, check_query};
use crate::xref::matcher::{self, FOUND_COLUMN};
use crate::xref::paths::XrefPaths;
use crate::xref::retention::retain_quietly;
use crate::xref::sheet::{CsvSheets, SheetReader, SheetTable, SheetWriter};
use crate::xref::source::cache::{CacheSource, CacheStore, SnapshotWrite};
use crate::xref::source::local_sheet::LocalSheetSource;
use crate::xref::source::remote::RemoteSource;
use crate::xref::source::{SourceAdapter, SourceKind, load_with_fallback};
use crate::xref::util::{file_stamp, result_file_path};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub index: ResolutionIndex,
    pub source: SourceKind,
    pub rows: usize,
    pub fallbacks: Vec<SourceFailure>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub query: String,
    pub yv_codes: Vec<String>,
    pub source: SourceKind,
    pub fallbacks: Vec<SourceFailure>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub output_path: PathBuf,
    pub source: SourceKind,
    pub fallbacks: Vec<SourceFailure>,
    pub rows: usize,
    pub relevant_headers: Vec<String>,
    pub query_values: usize,
    pub found_values: usize,
    pub annotated_rows: usize,
    pub upload_removed: bool,
    pub retention: Vec<String>,
}

impl UploadOutcome {
    pub fn output_name(&self) -> String {
        self.output_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub snapshot: SnapshotWrite,
    pub rows: usize,
    pub skipped_rows: usize,
    pub retention: String,
}

/// Configured engine. `S` reads uploads and writes annotated results.
pub struct XrefEngine<S = CsvSheets> {
    paths: XrefPaths,
    config: XrefConfig,
    sheets: S,
}

impl XrefEngine<CsvSheets> {
    pub fn new(paths: XrefPaths, config: XrefConfig) -> Self {
        Self::with_sheets(paths, config, CsvSheets)
    }
}

impl<S> XrefEngine<S>
where
    S: SheetReader + SheetWriter + Clone + 'static,
{
    pub fn with_sheets(paths: XrefPaths, config: XrefConfig, sheets: S) -> Self {
        Self {
            paths,
            config,
            sheets,
        }
    }

    /// Adapters in configured fallback order.
    pub fn adapters(&self) -> Result<Vec<Box<dyn SourceAdapter>>> {
        let mut out: Vec<Box<dyn SourceAdapter>> = Vec::new();
        for kind in self.config.source_order()? {
            match kind {
                SourceKind::Remote => out.push(Box::new(RemoteSource::new(
                    self.config.remote.endpoint(),
                    Duration::from_secs(self.config.remote.timeout_secs),
                    self.config.remote_mapping(),
                ))),
                SourceKind::Cache => out.push(Box::new(CacheSource::new(
                    self.paths.cache_file.clone(),
                    self.config.cache_mapping(),
                ))),
                SourceKind::LocalSheet => out.push(Box::new(LocalSheetSource::new(
                    self.config.local_sheet.path.clone(),
                    self.config.local_sheet.sheet_names.clone(),
                    self.config.local_sheet_mapping(),
                    self.sheets.clone(),
                ))),
            }
        }
        Ok(out)
    }

    /// Load rows through the fallback chain and index them.
    pub fn load_index(&self) -> Result<LoadedIndex> {
        let adapters = self.adapters()?;
        let loaded = load_with_fallback(&adapters)?;
        let index = loaded.build_index();
        Ok(LoadedIndex {
            index,
            source: loaded.source,
            rows: loaded.rows.len(),
            fallbacks: loaded.skipped,
        })
    }

    pub fn search(&self, query: &str) -> Result<SearchOutcome> {
        let trimmed = check_query(query)?.to_string();
        let loaded = self.load_index()?;
        let yv_codes = loaded.index.lookup(&trimmed)?;
        tracing::info!(
            query = %trimmed,
            found = yv_codes.len(),
            source = %loaded.source,
            rows = loaded.rows,
            "search finished"
        );
        Ok(SearchOutcome {
            query: trimmed,
            yv_codes,
            source: loaded.source,
            fallbacks: loaded.fallbacks,
        })
    }

    /// Copy a user file into the uploads directory as `<stem>-<millis><ext>`.
    pub fn stage_upload(&self, source: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.paths.uploads_dir).with_context(|| {
            format!("failed to create {}", self.paths.uploads_dir.display())
        })?;
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        let ext = source
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let staged = self
            .paths
            .uploads_dir
            .join(format!("{stem}-{}{ext}", Utc::now().timestamp_millis()));
        fs::copy(source, &staged).with_context(|| {
            format!("failed to stage {} into {}", source.display(), staged.display())
        })?;
        Ok(staged)
    }

    /// Annotate an uploaded query sheet and write the result into the
    /// outputs directory. The upload is removed afterwards whether or not
    /// matching succeeded.
    pub fn process_upload(
        &self,
        upload: &Path,
        keywords: &[String],
        original_name: &str,
    ) -> Result<UploadOutcome> {
        let result = self.match_upload(upload, keywords, original_name);

        let upload_removed = match fs::remove_file(upload) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %upload.display(), error = %err, "failed to remove upload");
                false
            }
        };

        let mut outcome = result?;
        outcome.upload_removed = upload_removed;
        outcome.retention = vec![
            retain_quietly(&self.paths.outputs_dir, self.config.retention.outputs_keep),
            retain_quietly(&self.paths.uploads_dir, self.config.retention.uploads_keep),
        ];
        Ok(outcome)
    }

    fn match_upload(
        &self,
        upload: &Path,
        keywords: &[String],
        original_name: &str,
    ) -> Result<UploadOutcome> {
        if keywords.is_empty() {
            return Err(XrefError::InvalidQuery(format!(
                "at least one keyword of {} or more characters is required",
                matcher::MIN_KEYWORD_CHARS
            ))
            .into());
        }
        let target = result_file_path(
            &self.paths.outputs_dir,
            original_name,
            &file_stamp(Utc::now()),
        );
        self.sheets.check_target(&target)?;

        let loaded = self.load_index()?;
        let table = self
            .sheets
            .read_sheet(upload, &self.config.matcher.sheet_names)?;
        let row_count = table.rows.len();
        let headers = table.headers;
        let matched = matcher::match_rows(&loaded.index, &headers, table.rows, keywords)?;

        let mut output = SheetTable::new(headers, matched.rows);
        output.push_header(FOUND_COLUMN);
        let output_path = self.write_output(&output, target)?;
        tracing::info!(path = %output_path.display(), "annotated sheet written");

        Ok(UploadOutcome {
            output_path,
            source: loaded.source,
            fallbacks: loaded.fallbacks,
            rows: row_count,
            relevant_headers: matched.relevant_headers,
            query_values: matched.query_values,
            found_values: matched.found_values,
            annotated_rows: matched.annotated_rows,
            upload_removed: false,
            retention: Vec::new(),
        })
    }

    fn write_output(&self, table: &SheetTable, target: PathBuf) -> Result<PathBuf> {
        let dir = &self.paths.outputs_dir;
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let suffix = target
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        self.sheets.write_sheet(tmp.path(), table, "Sheet1")?;
        tmp.persist(&target)
            .with_context(|| format!("failed to persist {}", target.display()))?;
        Ok(target)
    }

    /// Rebuild the cache snapshot from an uploaded reference sheet.
    pub fn update_from_sheet(&self, upload: &Path) -> Result<UpdateOutcome> {
        let table = self
            .sheets
            .read_sheet(upload, &self.config.update.sheet_names)?;
        if table.rows.is_empty() {
            return Err(XrefError::EmptySource(format!("{} has no rows", upload.display())).into());
        }

        let mapping = self.config.update_mapping();
        let mut builder = index::IndexBuilder::new();
        for row in &table.rows {
            builder.insert_row(row, &mapping);
        }
        let skipped_rows = builder.rows_skipped();
        let index = builder.finish();
        if index.is_empty() {
            return Err(XrefError::EmptySource(format!(
                "{} has no usable {} rows",
                upload.display(),
                mapping.describe()
            ))
            .into());
        }

        let snapshot = CacheStore::new(self.paths.cache_file.clone()).write(&index)?;
        tracing::info!(
            path = %snapshot.path.display(),
            entries = snapshot.entries,
            skipped = skipped_rows,
            "cache snapshot refreshed"
        );

        Ok(UpdateOutcome {
            snapshot,
            rows: table.rows.len(),
            skipped_rows,
            retention: retain_quietly(&self.paths.uploads_dir, self.config.retention.uploads_keep),
        })
    }
}
