use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tagmatrix_common::{CellValue, ColumnId};

use crate::SinkError;
use crate::grid::SheetGrid;
use crate::traits::PersistenceSink;

#[derive(Debug, Default)]
struct MemoryState {
    live: BTreeMap<String, SheetGrid>,
    durable: BTreeMap<String, SheetGrid>,
    flushes: u64,
    failed_flushes: u64,
    fail_next_flushes: u32,
    fail_writes: bool,
    closed: bool,
}

/// In-memory sink with a separate "durable" copy.
///
/// Clones share state, so a test can hand one clone to the matrix store and
/// inspect the other. `flush` replaces the durable copy with the live one;
/// a failing flush (see [`MemorySink::fail_next_flushes`]) leaves the durable
/// copy exactly as it was.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `flush` fail.
    pub fn fail_next_flushes(&self, n: u32) {
        self.state.lock().fail_next_flushes = n;
    }

    /// Make every subsequent `write_cell` fail until switched off.
    pub fn fail_writes(&self, on: bool) {
        self.state.lock().fail_writes = on;
    }

    /// Cells written so far, flushed or not.
    pub fn live(&self, sheet: &str) -> SheetGrid {
        self.state.lock().live.get(sheet).cloned().unwrap_or_default()
    }

    /// Cells as of the last successful flush.
    pub fn durable(&self, sheet: &str) -> Option<SheetGrid> {
        self.state.lock().durable.get(sheet).cloned()
    }

    pub fn flush_count(&self) -> u64 {
        self.state.lock().flushes
    }

    pub fn failed_flush_count(&self) -> u64 {
        self.state.lock().failed_flushes
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl PersistenceSink for MemorySink {
    type Error = SinkError;

    fn backend(&self) -> &'static str {
        "memory"
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        column: &ColumnId,
        value: CellValue,
    ) -> Result<(), Self::Error> {
        if row == 0 {
            return Err(SinkError::InvalidRow { row });
        }
        let mut st = self.state.lock();
        if st.closed {
            return Err(SinkError::Closed);
        }
        if st.fail_writes {
            return Err(SinkError::from_backend("memory", "injected write failure"));
        }
        st.live
            .entry(sheet.to_string())
            .or_default()
            .set(row, column.index(), value);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let mut st = self.state.lock();
        if st.closed {
            return Err(SinkError::Closed);
        }
        if st.fail_next_flushes > 0 {
            st.fail_next_flushes -= 1;
            st.failed_flushes += 1;
            return Err(SinkError::from_backend("memory", "injected flush failure"));
        }
        st.durable = st.live.clone();
        st.flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.state.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(s: &str) -> ColumnId {
        ColumnId::parse(s).unwrap()
    }

    #[test]
    fn durable_copy_only_moves_on_successful_flush() {
        let handle = MemorySink::new();
        let mut sink = handle.clone();
        sink.write_cell("Sheet1", 1, &col("A"), "Title".into()).unwrap();
        assert!(handle.durable("Sheet1").is_none());

        sink.flush().unwrap();
        sink.write_cell("Sheet1", 2, &col("A"), "Portal".into()).unwrap();
        handle.fail_next_flushes(1);
        assert!(sink.flush().is_err());

        let durable = handle.durable("Sheet1").unwrap();
        assert_eq!(durable.bounds(), Some((1, 1)));
        assert_eq!(handle.live("Sheet1").bounds(), Some((2, 1)));

        sink.flush().unwrap();
        assert_eq!(handle.durable("Sheet1").unwrap().bounds(), Some((2, 1)));
        assert_eq!(handle.flush_count(), 2);
        assert_eq!(handle.failed_flush_count(), 1);
    }

    #[test]
    fn closed_sink_rejects_writes() {
        let mut sink = MemorySink::new();
        sink.close().unwrap();
        let err = sink
            .write_cell("Sheet1", 1, &col("A"), "x".into())
            .unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[test]
    fn row_zero_is_rejected() {
        let mut sink = MemorySink::new();
        let err = sink
            .write_cell("Sheet1", 0, &col("A"), "x".into())
            .unwrap_err();
        assert!(matches!(err, SinkError::InvalidRow { row: 0 }));
    }
}
