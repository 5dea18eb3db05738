//! The mutable incidence matrix: row cursor, tag-to-column map and the sink
//! they are written through.
//!
//! Everything lives behind one mutex so that assigning a row, assigning any
//! new tag columns, the cell writes, and the checkpoint decision happen as a
//! single step. Sink calls are synchronous and made while holding the lock;
//! callers on an async runtime should invoke [`MatrixStore::record`] from a
//! blocking context.

use std::path::PathBuf;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tagmatrix_common::{CellValue, ColumnId, Entity, FetchResult, MetadataField};
use tagmatrix_sink::PersistenceSink;

use crate::config::StoreOptions;
use crate::error::{AlreadyFailed, PersistStage, PersistenceError};

/// First data row; row 1 holds the header.
pub const FIRST_DATA_ROW: u32 = 2;

struct MatrixState<S> {
    sink: S,
    processed: u64,
    next_row: u32,
    next_column: ColumnId,
    tag_columns: FxHashMap<String, ColumnId>,
    checkpoints: u64,
    failed_checkpoints: u64,
    finish: FinishState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FinishState {
    Open,
    Finished,
    Failed(PersistStage),
}

/// What one `record` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub row: u32,
    /// Tags that received a column during this call, in assignment order.
    pub new_columns: Vec<(String, ColumnId)>,
    pub checkpointed: bool,
}

/// Point-in-time copy of the store's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixSnapshot {
    pub processed: u64,
    pub next_row: u32,
    pub next_column: ColumnId,
    /// Every known tag with its column, ordered by column.
    pub tag_columns: Vec<(String, ColumnId)>,
    pub checkpoints: u64,
    pub failed_checkpoints: u64,
}

impl MatrixSnapshot {
    pub fn column_of(&self, tag: &str) -> Option<&ColumnId> {
        self.tag_columns
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, c)| c)
    }
}

/// Result of a successful [`MatrixStore::finish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixSummary {
    pub rows: u64,
    pub tags: usize,
    pub checkpoints: u64,
    pub destination: Option<PathBuf>,
}

pub struct MatrixStore<S: PersistenceSink> {
    state: Mutex<MatrixState<S>>,
    options: StoreOptions,
}

impl<S: PersistenceSink> MatrixStore<S> {
    /// Take ownership of `sink` and write the header row into it.
    pub fn new(mut sink: S, options: StoreOptions) -> Result<Self, PersistenceError> {
        let backend = sink.backend();
        for field in MetadataField::ALL {
            sink.write_cell(&options.sheet, 1, &field.column(), field.label().into())
                .map_err(|e| PersistenceError::new(PersistStage::Header, backend, e))?;
        }
        tracing::debug!(backend, sheet = %options.sheet, "wrote matrix header");
        Ok(Self {
            state: Mutex::new(MatrixState {
                sink,
                processed: 0,
                next_row: FIRST_DATA_ROW,
                next_column: MetadataField::first_tag_column(),
                tag_columns: FxHashMap::default(),
                checkpoints: 0,
                failed_checkpoints: 0,
                finish: FinishState::Open,
            }),
            options,
        })
    }

    /// Append one entity as a new row.
    ///
    /// The row and any new tag columns are committed even when a cell write
    /// or the checkpoint flush fails; the error only reports that the durable
    /// copy may lag. When both a write and the checkpoint fail, the
    /// checkpoint error is returned and the write error is logged.
    pub fn record(
        &self,
        entity: &Entity,
        result: &FetchResult,
    ) -> Result<RecordOutcome, PersistenceError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let sheet = self.options.sheet.as_str();
        let backend = st.sink.backend();

        st.processed += 1;
        let row = st.next_row;
        st.next_row = st.next_row.saturating_add(1);

        let mut write_error: Option<PersistenceError> = None;
        let mut keep_first = |res: Result<(), S::Error>| {
            if let Err(e) = res {
                if write_error.is_none() {
                    write_error = Some(PersistenceError::new(PersistStage::Write, backend, e));
                } else {
                    tracing::debug!(row, error = %e, "additional cell write failed");
                }
            }
        };

        for field in MetadataField::ALL {
            let value = result.metadata_value(entity, field);
            if value.is_empty() {
                continue;
            }
            keep_first(st.sink.write_cell(sheet, row, &field.column(), value));
        }

        let mut new_columns = Vec::new();
        for raw in &result.tags {
            let tag = raw.trim();
            if tag.is_empty() {
                continue;
            }
            let column = match st.tag_columns.get(tag) {
                Some(col) => col.clone(),
                None => {
                    let col = st.next_column.clone();
                    match col.next() {
                        Ok(next) => st.next_column = next,
                        Err(e) => {
                            tracing::error!(tag, error = %e, "out of tag columns; tag dropped");
                            continue;
                        }
                    }
                    keep_first(st.sink.write_cell(sheet, 1, &col, tag.into()));
                    st.tag_columns.insert(tag.to_string(), col.clone());
                    new_columns.push((tag.to_string(), col.clone()));
                    col
                }
            };
            keep_first(st.sink.write_cell(sheet, row, &column, CellValue::present()));
        }

        if let Some(e) = &write_error {
            tracing::warn!(id = entity.id, title = %entity.name, row, error = %e, "row written partially");
        }

        let mut checkpointed = false;
        if st.processed % self.options.checkpoint_interval.get() == 0 {
            tracing::info!(
                id = entity.id,
                title = %entity.name,
                processed = st.processed,
                "saving progress"
            );
            match st.sink.flush() {
                Ok(()) => {
                    st.checkpoints += 1;
                    checkpointed = true;
                }
                Err(e) => {
                    st.failed_checkpoints += 1;
                    return Err(PersistenceError::new(PersistStage::Checkpoint, backend, e));
                }
            }
        }

        match write_error {
            Some(e) => Err(e),
            None => Ok(RecordOutcome {
                row,
                new_columns,
                checkpointed,
            }),
        }
    }

    pub fn snapshot(&self) -> MatrixSnapshot {
        let st = self.state.lock();
        let mut tag_columns: Vec<(String, ColumnId)> = st
            .tag_columns
            .iter()
            .map(|(t, c)| (t.clone(), c.clone()))
            .collect();
        tag_columns.sort_by(|a, b| a.1.cmp(&b.1));
        MatrixSnapshot {
            processed: st.processed,
            next_row: st.next_row,
            next_column: st.next_column.clone(),
            tag_columns,
            checkpoints: st.checkpoints,
            failed_checkpoints: st.failed_checkpoints,
        }
    }

    pub fn column_for(&self, tag: &str) -> Option<ColumnId> {
        self.state.lock().tag_columns.get(tag.trim()).cloned()
    }

    /// Final flush followed by close.
    ///
    /// Call once, after every `record` has returned. A failure here means
    /// the output may be missing rows recorded since the last checkpoint.
    /// The sink is closed even when the final flush fails. Calling again
    /// after a success returns the same summary; after a failure it fails
    /// again with the original stage.
    pub fn finish(&self) -> Result<MatrixSummary, PersistenceError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let backend = st.sink.backend();
        match st.finish {
            FinishState::Finished => tracing::debug!(backend, "matrix already finished"),
            FinishState::Failed(stage) => {
                return Err(PersistenceError::new(stage, backend, AlreadyFailed(stage)));
            }
            FinishState::Open => {
                let flushed = st
                    .sink
                    .flush()
                    .map_err(|e| PersistenceError::new(PersistStage::FinalFlush, backend, e));
                let closed = st
                    .sink
                    .close()
                    .map_err(|e| PersistenceError::new(PersistStage::Close, backend, e));
                if let Err(e) = flushed.and(closed) {
                    st.finish = FinishState::Failed(e.stage);
                    return Err(e);
                }
                st.finish = FinishState::Finished;
                st.checkpoints += 1;
            }
        }
        Ok(MatrixSummary {
            rows: st.processed,
            tags: st.tag_columns.len(),
            checkpoints: st.checkpoints,
            destination: st.sink.destination().map(PathBuf::from),
        })
    }

}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use tagmatrix_sink::{DEFAULT_SHEET, MemorySink};

    use super::*;

    fn store_with(interval: u64) -> (MatrixStore<MemorySink>, MemorySink) {
        let handle = MemorySink::new();
        let opts = StoreOptions::default()
            .with_checkpoint_interval(NonZeroU64::new(interval).unwrap());
        (MatrixStore::new(handle.clone(), opts).unwrap(), handle)
    }

    fn tagged(tags: &[&str]) -> FetchResult {
        FetchResult::default().with_tags(tags.iter().copied())
    }

    #[test]
    fn header_is_written_on_construction() {
        let (_store, handle) = store_with(10);
        let grid = handle.live(DEFAULT_SHEET);
        assert_eq!(
            grid.row_text(1),
            vec![
                "Title",
                "ID",
                "Scraped On",
                "Release Date",
                "Total Review Count",
                "Review Positivity"
            ]
        );
    }

    #[test]
    fn record_assigns_rows_and_columns() {
        let (store, handle) = store_with(10);
        let a = store
            .record(&Entity::new(1, "A"), &tagged(&["x", "y"]))
            .unwrap();
        let b = store.record(&Entity::new(2, "B"), &tagged(&["y"])).unwrap();

        assert_eq!(a.row, 2);
        assert_eq!(b.row, 3);
        assert_eq!(a.new_columns.len(), 2);
        assert!(b.new_columns.is_empty());

        let grid = handle.live(DEFAULT_SHEET);
        assert_eq!(grid.text(1, 7), "x");
        assert_eq!(grid.text(1, 8), "y");
        assert_eq!(grid.text(2, 7), "1");
        assert_eq!(grid.text(2, 8), "1");
        assert_eq!(grid.text(3, 7), "");
        assert_eq!(grid.text(3, 8), "1");
        assert_eq!(grid.text(3, 1), "B");
    }

    #[test]
    fn untrimmed_tags_share_a_column() {
        let (store, _handle) = store_with(10);
        store.record(&Entity::new(1, "A"), &tagged(&["RPG"])).unwrap();
        let out = store
            .record(&Entity::new(2, "B"), &tagged(&[" RPG ", ""]))
            .unwrap();
        assert!(out.new_columns.is_empty());
        assert_eq!(store.column_for("RPG").unwrap().as_str(), "G");
        assert_eq!(store.snapshot().next_column.as_str(), "H");
    }

    #[test]
    fn write_failure_still_advances_state() {
        let (store, handle) = store_with(10);
        handle.fail_writes(true);
        let err = store
            .record(&Entity::new(1, "A"), &tagged(&["x"]))
            .unwrap_err();
        assert_eq!(err.stage, PersistStage::Write);
        handle.fail_writes(false);

        let out = store.record(&Entity::new(2, "B"), &tagged(&["x"])).unwrap();
        assert_eq!(out.row, 3);
        assert!(out.new_columns.is_empty());
        let snap = store.snapshot();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.next_row, 4);
    }

    #[test]
    fn finish_flushes_then_closes() {
        let (store, handle) = store_with(10);
        store.record(&Entity::new(1, "A"), &tagged(&["x"])).unwrap();
        let summary = store.finish().unwrap();
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.tags, 1);
        assert!(handle.is_closed());
        assert_eq!(handle.durable(DEFAULT_SHEET).unwrap().text(2, 7), "1");

        // second call is a no-op
        assert!(store.finish().is_ok());
        assert_eq!(handle.flush_count(), 1);
    }

    #[test]
    fn failed_final_flush_is_terminal_but_closes() {
        let (store, handle) = store_with(10);
        handle.fail_next_flushes(1);
        let err = store.finish().unwrap_err();
        assert_eq!(err.stage, PersistStage::FinalFlush);
        assert!(err.is_terminal());
        assert!(handle.is_closed());
    }

    #[test]
    fn finish_after_a_failed_finish_keeps_failing() {
        let (store, handle) = store_with(10);
        store.record(&Entity::new(1, "A"), &tagged(&["x"])).unwrap();
        handle.fail_next_flushes(1);

        let first = store.finish().unwrap_err();
        assert_eq!(first.stage, PersistStage::FinalFlush);
        let again = store.finish().unwrap_err();
        assert_eq!(again.stage, PersistStage::FinalFlush);
        assert!(again.is_terminal());

        assert_eq!(handle.flush_count(), 0);
        assert!(handle.durable(DEFAULT_SHEET).is_none());
        assert_eq!(store.snapshot().checkpoints, 0);
    }
}
