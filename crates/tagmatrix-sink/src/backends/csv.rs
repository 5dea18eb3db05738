use std::io::Write;
use std::path::{Path, PathBuf};

use tagmatrix_common::{CellValue, ColumnId};

use crate::SinkError;
use crate::atomic::replace_file;
use crate::grid::SheetGrid;
use crate::traits::{DEFAULT_SHEET, PersistenceSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CsvNewline {
    #[default]
    Lf,
    Crlf,
}

#[derive(Clone, Debug)]
pub struct CsvWriteOptions {
    /// Field delimiter as a single byte. Use `b'\t'` for TSV.
    pub delimiter: u8,
    pub newline: CsvNewline,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            newline: CsvNewline::Lf,
        }
    }
}

/// CSV sink.
///
/// Semantics:
/// - A CSV file holds a single sheet (default name: `Sheet1`); writes to any
///   other sheet fail with `SheetNotFound`.
/// - Each flush rewrites the whole used rectangle, padding blanks.
pub struct CsvSink {
    sheet_name: String,
    grid: SheetGrid,
    path: PathBuf,
    options: CsvWriteOptions,
    closed: bool,
}

impl CsvSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        Self::create_with_options(path, DEFAULT_SHEET, CsvWriteOptions::default())
    }

    pub fn create_with_options<P: AsRef<Path>>(
        path: P,
        sheet_name: &str,
        options: CsvWriteOptions,
    ) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            grid: SheetGrid::new(),
            path: path.as_ref().to_path_buf(),
            options,
            closed: false,
        }
    }

    /// Render the current grid as CSV into `writer`.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), SinkError> {
        write_rect_csv(writer, &self.options, &self.grid)
    }
}

impl PersistenceSink for CsvSink {
    type Error = SinkError;

    fn backend(&self) -> &'static str {
        "csv"
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
        if sheet != self.sheet_name {
            return Err(SinkError::SheetNotFound(sheet.to_string()));
        }
        if row == 0 {
            return Err(SinkError::InvalidRow { row });
        }
        self.grid.set(row, column.index(), value);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        replace_file(&self.path, |file| {
            write_rect_csv(file, &self.options, &self.grid)
        })?;
        tracing::debug!(path = %self.path.display(), cells = self.grid.len(), "csv snapshot written");
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

fn write_rect_csv<W: Write + ?Sized>(
    writer: &mut W,
    opts: &CsvWriteOptions,
    grid: &SheetGrid,
) -> Result<(), SinkError> {
    let mut wb = csv::WriterBuilder::new();
    wb.delimiter(opts.delimiter).terminator(match opts.newline {
        CsvNewline::Lf => csv::Terminator::Any(b'\n'),
        CsvNewline::Crlf => csv::Terminator::CRLF,
    });
    let mut wtr = wb.from_writer(writer);

    if let Some((rows, _)) = grid.bounds() {
        for r in 1..=rows {
            wtr.write_record(grid.row_text(r))
                .map_err(|e| SinkError::from_backend("csv", e))?;
        }
    }
    wtr.flush()?;
    Ok(())
}
