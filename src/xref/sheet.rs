//! Spreadsheet container seam.
//!
//! The engine only needs "give me the rows of a sheet" and "write these rows
//! back". The built-in codec handles CSV, where a file is a workbook with a
//! single sheet; other grid formats plug in through the same traits.

use crate::error::{XrefError, XrefResult};
use crate::xref::record::RawRow;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const EMPTY_HEADER: &str = "__EMPTY";

/// Ordered headers plus rows keyed by header. Blank cells are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl SheetTable {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { headers, rows }
    }

    /// Union of headers across the declared header row and every row, in
    /// first-seen order.
    pub fn all_headers(&self) -> Vec<String> {
        let mut out = self.headers.clone();
        for row in &self.rows {
            for key in row.keys() {
                if !out.iter().any(|h| h == key) {
                    out.push(key.clone());
                }
            }
        }
        out
    }

    pub fn push_header(&mut self, header: &str) {
        if !self.headers.iter().any(|h| h == header) {
            self.headers.push(header.to_string());
        }
    }
}

pub trait SheetReader {
    /// Read the first sheet whose name is in `preferred`, else the first sheet.
    fn read_sheet(&self, path: &Path, preferred: &[String]) -> XrefResult<SheetTable>;
}

pub trait SheetWriter {
    /// Reject a target this writer cannot produce, before any work is done.
    fn check_target(&self, _path: &Path) -> XrefResult<()> {
        Ok(())
    }

    fn write_sheet(&self, path: &Path, table: &SheetTable, sheet_name: &str) -> XrefResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSheets;

fn ensure_csv(path: &Path) -> XrefResult<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext == "csv" {
        return Ok(());
    }
    Err(XrefError::Sheet(format!(
        "unsupported spreadsheet format `.{ext}` for {}; the built-in codec reads CSV",
        path.display()
    )))
}

/// Make header names unique and non-empty the way grid-to-object
/// converters do: blanks become `__EMPTY`, repeats get `_1`, `_2`, …
fn unique_headers(raw: &csv::StringRecord) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());
    for cell in raw.iter() {
        let base = if cell.trim().is_empty() {
            EMPTY_HEADER.to_string()
        } else {
            cell.to_string()
        };
        let n = counts.entry(base.clone()).or_insert(0);
        let name = if *n == 0 {
            base.clone()
        } else {
            format!("{base}_{n}")
        };
        *n += 1;
        out.push(name);
    }
    out
}

impl SheetReader for CsvSheets {
    fn read_sheet(&self, path: &Path, _preferred: &[String]) -> XrefResult<SheetTable> {
        ensure_csv(path)?;
        if !path.is_file() {
            return Err(XrefError::Sheet(format!("sheet file not found: {}", path.display())));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|err| XrefError::Sheet(format!("failed to open {}: {err}", path.display())))?;
        let headers = unique_headers(
            reader
                .headers()
                .map_err(|err| XrefError::Sheet(format!("failed to read header row: {err}")))?,
        );

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|err| {
                XrefError::Sheet(format!("failed to read row {} of {}: {err}", idx + 2, path.display()))
            })?;
            let mut row = RawRow::new();
            for (header, cell) in headers.iter().zip(record.iter()) {
                if cell.is_empty() {
                    continue;
                }
                row.insert(header.clone(), Value::String(cell.to_string()));
            }
            if !row.is_empty() {
                rows.push(row);
            }
        }

        Ok(SheetTable { headers, rows })
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl SheetWriter for CsvSheets {
    fn check_target(&self, path: &Path) -> XrefResult<()> {
        ensure_csv(path)
    }

    fn write_sheet(&self, path: &Path, table: &SheetTable, _sheet_name: &str) -> XrefResult<()> {
        ensure_csv(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let headers = table.all_headers();
        let mut writer = csv::Writer::from_path(path)
            .map_err(|err| XrefError::Sheet(format!("failed to create {}: {err}", path.display())))?;
        writer
            .write_record(&headers)
            .map_err(|err| XrefError::Sheet(format!("failed to write header row: {err}")))?;
        for row in &table.rows {
            let cells = headers.iter().map(|h| cell_text(row.get(h)));
            writer
                .write_record(cells)
                .map_err(|err| XrefError::Sheet(format!("failed to write row: {err}")))?;
        }
        writer.flush()?;
        Ok(())
    }
}
