// Integration test for the xlsx sink; run with `--features umya` (on by default).
use tagmatrix_sink::{CellValue, ColumnId, PersistenceSink, SinkError, XlsxSink};

fn col(s: &str) -> ColumnId {
    ColumnId::parse(s).unwrap()
}

fn read_value(path: &std::path::Path, sheet: &str, column: &str, row: u32) -> String {
    let mut book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
    book.read_sheet_by_name(sheet);
    let ws = book.get_sheet_by_name(sheet).unwrap();
    ws.get_value((col(column).index(), row))
}

#[test]
fn flush_writes_a_readable_workbook() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("matrix.xlsx");
    let mut sink = XlsxSink::create(&path);

    sink.write_cell("Sheet1", 1, &col("A"), "Title".into()).unwrap();
    sink.write_cell("Sheet1", 1, &col("AA"), "Roguelike".into())
        .unwrap();
    sink.write_cell("Sheet1", 2, &col("A"), "Hades".into()).unwrap();
    sink.write_cell("Sheet1", 2, &col("B"), CellValue::Int(1145360))
        .unwrap();
    sink.write_cell("Sheet1", 2, &col("AA"), CellValue::present())
        .unwrap();
    assert!(!path.exists(), "nothing is persisted before the first flush");

    sink.flush().unwrap();
    assert!(path.exists());
    assert_eq!(read_value(&path, "Sheet1", "A", 1), "Title");
    assert_eq!(read_value(&path, "Sheet1", "AA", 1), "Roguelike");
    assert_eq!(read_value(&path, "Sheet1", "A", 2), "Hades");
    assert_eq!(read_value(&path, "Sheet1", "B", 2), "1145360");
    assert_eq!(read_value(&path, "Sheet1", "AA", 2), "1");
}

#[test]
fn later_flush_replaces_earlier_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("matrix.xlsx");
    let mut sink = XlsxSink::create(&path);

    sink.write_cell("Sheet1", 2, &col("A"), "first".into()).unwrap();
    sink.flush().unwrap();
    sink.write_cell("Sheet1", 3, &col("A"), "second".into()).unwrap();
    assert_eq!(read_value(&path, "Sheet1", "A", 3), "");

    sink.flush().unwrap();
    assert_eq!(read_value(&path, "Sheet1", "A", 2), "first");
    assert_eq!(read_value(&path, "Sheet1", "A", 3), "second");

    let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temporary files must not linger");
}

#[test]
fn custom_sheet_name_is_used() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tags.xlsx");
    let mut sink = XlsxSink::create_with_sheet(&path, "Tags");
    sink.write_cell("Tags", 1, &col("A"), "Title".into()).unwrap();
    sink.flush().unwrap();
    assert_eq!(read_value(&path, "Tags", "A", 1), "Title");
}

#[test]
fn flush_into_missing_directory_fails_and_close_blocks_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("missing").join("matrix.xlsx");
    let mut sink = XlsxSink::create(&path);
    sink.write_cell("Sheet1", 1, &col("A"), "Title".into()).unwrap();
    assert!(matches!(sink.flush(), Err(SinkError::Io(_))));

    sink.close().unwrap();
    assert!(matches!(
        sink.write_cell("Sheet1", 2, &col("A"), "late".into()),
        Err(SinkError::Closed)
    ));
    assert!(matches!(sink.flush(), Err(SinkError::Closed)));
}
