use std::path::Path;

use tagmatrix_common::{CellValue, ColumnId};

/// Default sheet every backend writes into.
pub const DEFAULT_SHEET: &str = "Sheet1";

/// Durable tabular writer.
///
/// Cell writes are cheap and in-memory; `flush` turns everything written so
/// far into a durable snapshot. Implementations are not internally
/// synchronized: callers serialize access (the matrix store holds the sink
/// behind its own lock so writes and bookkeeping stay atomic together).
pub trait PersistenceSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short backend name used in logs and error messages.
    fn backend(&self) -> &'static str;

    /// Write one cell. Rows are 1-based, row 1 is the header row.
    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        column: &ColumnId,
        value: CellValue,
    ) -> Result<(), Self::Error>;

    /// Persist everything written so far.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Release the sink. Writes after `close` fail.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// File the sink persists to, if any.
    fn destination(&self) -> Option<&Path> {
        None
    }
}
