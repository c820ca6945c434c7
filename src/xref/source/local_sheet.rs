use crate::error::{XrefError, XrefResult};
use crate::xref::record::{FieldMapping, RawRow};
use crate::xref::sheet::SheetReader;
use crate::xref::source::{SourceAdapter, SourceKind};
use std::path::PathBuf;

/// Reference spreadsheet kept on local disk.
pub struct LocalSheetSource<R> {
    path: PathBuf,
    sheet_names: Vec<String>,
    mapping: FieldMapping,
    reader: R,
}

impl<R: SheetReader> LocalSheetSource<R> {
    pub fn new(
        path: impl Into<PathBuf>,
        sheet_names: Vec<String>,
        mapping: FieldMapping,
        reader: R,
    ) -> Self {
        Self {
            path: path.into(),
            sheet_names,
            mapping,
            reader,
        }
    }
}

impl<R: SheetReader> SourceAdapter for LocalSheetSource<R> {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalSheet
    }

    fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    fn load(&self) -> XrefResult<Vec<RawRow>> {
        let unavailable = |reason: String| XrefError::unavailable(self.kind().as_str(), reason);
        if self.path.as_os_str().is_empty() {
            return Err(unavailable("no local sheet configured".to_string()));
        }

        tracing::info!(path = %self.path.display(), "reading local reference sheet");
        let table = self
            .reader
            .read_sheet(&self.path, &self.sheet_names)
            .map_err(|err| unavailable(err.to_string()))?;
        if table.rows.is_empty() {
            return Err(unavailable(format!(
                "sheet {} has no rows",
                self.path.display()
            )));
        }
        Ok(table.rows)
    }
}
