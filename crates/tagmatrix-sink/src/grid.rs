use std::collections::BTreeMap;

use tagmatrix_common::{CellValue, ColumnId};

/// Sparse single-sheet cell store keyed by 1-based `(row, col)`.
///
/// Only non-empty cells are kept; writing `CellValue::Empty` clears a cell.
/// Bounds only ever grow, matching what a spreadsheet reports as its used
/// range after cells are blanked.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SheetGrid {
    cells: BTreeMap<(u32, u32), CellValue>,
    max_row: u32,
    max_col: u32,
}

impl SheetGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
        if value.is_empty() {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), value);
        }
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Lookup by column letters, e.g. `grid.get_at("G", 2)`.
    pub fn get_at(&self, column: &str, row: u32) -> Option<&CellValue> {
        let col = ColumnId::parse(column).ok()?;
        self.get(row, col.index())
    }

    /// Text rendering of a cell, `""` when blank.
    pub fn text(&self, row: u32, col: u32) -> String {
        self.get(row, col).map(ToString::to_string).unwrap_or_default()
    }

    /// `(max_row, max_col)` or `None` if nothing was ever written.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        if self.max_row == 0 || self.max_col == 0 {
            None
        } else {
            Some((self.max_row, self.max_col))
        }
    }

    /// Row `row` rendered as text from column A to the right edge.
    pub fn row_text(&self, row: u32) -> Vec<String> {
        (1..=self.max_col).map(|c| self.text(row, c)).collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
