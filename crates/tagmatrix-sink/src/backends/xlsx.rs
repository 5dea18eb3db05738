#![cfg(feature = "umya")]

use std::path::{Path, PathBuf};

use tagmatrix_common::{CellValue, ColumnId, DATETIME_FORMAT};
use umya_spreadsheet::Spreadsheet;

use crate::SinkError;
use crate::atomic::replace_file;
use crate::traits::{DEFAULT_SHEET, PersistenceSink};

/// Excel workbook sink backed by `umya-spreadsheet`.
///
/// The workbook lives in memory; every flush serializes the full workbook
/// and swaps it over the destination file.
pub struct XlsxSink {
    book: Spreadsheet,
    path: PathBuf,
    closed: bool,
}

impl XlsxSink {
    /// New empty workbook that will be saved to `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        Self::create_with_sheet(path, DEFAULT_SHEET)
    }

    pub fn create_with_sheet<P: AsRef<Path>>(path: P, sheet: &str) -> Self {
        let mut book = umya_spreadsheet::new_file();
        if book.get_sheet_by_name(sheet).is_none() {
            if let Some(first) = book.get_sheet_by_name_mut(DEFAULT_SHEET) {
                first.set_name(sheet);
            }
        }
        Self {
            book,
            path: path.as_ref().to_path_buf(),
            closed: false,
        }
    }
}

impl PersistenceSink for XlsxSink {
    type Error = SinkError;

    fn backend(&self) -> &'static str {
        "xlsx"
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        column: &ColumnId,
        value: CellValue,
    ) -> Result<(), Self::Error> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if row == 0 {
            return Err(SinkError::InvalidRow { row });
        }
        if self.book.get_sheet_by_name(sheet).is_none() {
            self.book
                .new_sheet(sheet)
                .map_err(|e| SinkError::from_backend("xlsx", e))?;
        }
        let ws = self
            .book
            .get_sheet_by_name_mut(sheet)
            .ok_or_else(|| SinkError::SheetNotFound(sheet.to_string()))?;
        // umya addresses cells as (col, row)
        let cell = ws.get_cell_mut((column.index(), row));
        match value {
            CellValue::Text(s) => {
                cell.set_value(s);
            }
            CellValue::Int(i) => {
                cell.set_value_number(i as f64);
            }
            CellValue::Number(n) => {
                cell.set_value_number(n);
            }
            CellValue::DateTime(dt) => {
                cell.set_value(dt.format(DATETIME_FORMAT).to_string());
            }
            CellValue::Empty => {
                cell.set_blank();
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let book = &self.book;
        replace_file(&self.path, |file| {
            umya_spreadsheet::writer::xlsx::write_writer(book, file)
                .map_err(|e| SinkError::from_backend("xlsx", e))
        })?;
        tracing::debug!(path = %self.path.display(), "xlsx snapshot written");
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed = true;
        Ok(())
    }

    fn destination(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
