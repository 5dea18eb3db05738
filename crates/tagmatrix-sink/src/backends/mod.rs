#[cfg(feature = "csv")]
pub mod csv;
pub mod memory;
#[cfg(feature = "umya")]
pub mod xlsx;

#[cfg(feature = "csv")]
pub use self::csv::CsvSink;
pub use memory::MemorySink;
#[cfg(feature = "umya")]
pub use xlsx::XlsxSink;

use std::path::Path;

#[cfg(any(feature = "csv", feature = "umya"))]
use tagmatrix_common::{CellValue, ColumnId};

#[cfg(any(feature = "csv", feature = "umya"))]
use crate::SinkError;
#[cfg(any(feature = "csv", feature = "umya"))]
use crate::traits::PersistenceSink;

/// Output format picked at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkFormat {
    Xlsx,
    Csv,
}

impl SinkFormat {
    /// Guess from a file extension (`.xlsx`, `.csv`), case-insensitive.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(SinkFormat::Xlsx),
            "csv" => Some(SinkFormat::Csv),
            _ => None,
        }
    }
}

/// Any of the file-backed sinks behind one concrete type.
#[cfg(any(feature = "csv", feature = "umya"))]
pub enum AnySink {
    #[cfg(feature = "umya")]
    Xlsx(XlsxSink),
    #[cfg(feature = "csv")]
    Csv(CsvSink),
}

#[cfg(any(feature = "csv", feature = "umya"))]
impl AnySink {
    /// Open a file-backed sink of the requested format.
    pub fn create(format: SinkFormat, path: &Path, sheet: &str) -> Result<Self, SinkError> {
        match format {
            #[cfg(feature = "umya")]
            SinkFormat::Xlsx => Ok(AnySink::Xlsx(XlsxSink::create_with_sheet(path, sheet))),
            #[cfg(feature = "csv")]
            SinkFormat::Csv => Ok(AnySink::Csv(CsvSink::create_with_options(
                path,
                sheet,
                self::csv::CsvWriteOptions::default(),
            ))),
            #[allow(unreachable_patterns)]
            other => Err(SinkError::Backend {
                backend: format!("{other:?}").to_lowercase(),
                message: "backend not compiled in".to_string(),
            }),
        }
    }
}

#[cfg(any(feature = "csv", feature = "umya"))]
impl PersistenceSink for AnySink {
    type Error = SinkError;

    fn backend(&self) -> &'static str {
        match self {
            #[cfg(feature = "umya")]
            AnySink::Xlsx(s) => s.backend(),
            #[cfg(feature = "csv")]
            AnySink::Csv(s) => s.backend(),
        }
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        column: &ColumnId,
        value: CellValue,
    ) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "umya")]
            AnySink::Xlsx(s) => s.write_cell(sheet, row, column, value),
            #[cfg(feature = "csv")]
            AnySink::Csv(s) => s.write_cell(sheet, row, column, value),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "umya")]
            AnySink::Xlsx(s) => s.flush(),
            #[cfg(feature = "csv")]
            AnySink::Csv(s) => s.flush(),
        }
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        match self {
            #[cfg(feature = "umya")]
            AnySink::Xlsx(s) => s.close(),
            #[cfg(feature = "csv")]
            AnySink::Csv(s) => s.close(),
        }
    }

    fn destination(&self) -> Option<&Path> {
        match self {
            #[cfg(feature = "umya")]
            AnySink::Xlsx(s) => s.destination(),
            #[cfg(feature = "csv")]
            AnySink::Csv(s) => s.destination(),
        }
    }
}
