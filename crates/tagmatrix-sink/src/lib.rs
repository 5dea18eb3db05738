mod atomic;
pub mod backends;
pub mod error;
pub mod grid;
pub mod traits;

#[cfg(feature = "csv")]
pub use backends::CsvSink;
#[cfg(feature = "umya")]
pub use backends::XlsxSink;
#[cfg(any(feature = "csv", feature = "umya"))]
pub use backends::AnySink;
pub use backends::{MemorySink, SinkFormat};
pub use error::SinkError;
pub use grid::SheetGrid;
pub use traits::{DEFAULT_SHEET, PersistenceSink};

// Re-export for convenience
pub use tagmatrix_common::{CellValue, ColumnId};
