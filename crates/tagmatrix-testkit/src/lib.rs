//! Fixtures shared by the tagmatrix integration tests.

mod fetcher;

use std::path::{Path, PathBuf};

use tagmatrix_common::CellValue;
use tagmatrix_sink::SheetGrid;
use tempfile::TempDir;

pub use fetcher::{FetchTracker, RandomCatalog, ScriptedFetcher, random_catalog};

/// A temp directory plus a path inside it; keep the dir alive for the test.
pub fn temp_output(file_name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(file_name);
    (dir, path)
}

/// Read one worksheet back as text cells.
pub fn read_xlsx_grid(path: &Path, sheet: &str) -> SheetGrid {
    let mut book = umya_spreadsheet::reader::xlsx::read(path).expect("readable xlsx");
    book.read_sheet_by_name(sheet);
    let ws = book
        .get_sheet_by_name(sheet)
        .unwrap_or_else(|| panic!("sheet {sheet} missing"));
    let mut grid = SheetGrid::new();
    for cell in ws.get_cell_collection() {
        let coord = cell.get_coordinate();
        let value = cell.get_value().to_string();
        if !value.is_empty() {
            grid.set(*coord.get_row_num(), *coord.get_col_num(), CellValue::Text(value));
        }
    }
    grid
}

/// Labels in row 1 from column G onwards.
pub fn tag_header(grid: &SheetGrid) -> Vec<String> {
    let first = tagmatrix_common::MetadataField::first_tag_column().index() as usize;
    grid.row_text(1).into_iter().skip(first - 1).collect()
}
