use std::collections::HashSet;
use std::num::NonZeroU64;

use chrono::Utc;
use tagmatrix::{Entity, FetchResult, MatrixStore, PersistStage, StoreOptions};
use tagmatrix_sink::{DEFAULT_SHEET, MemorySink};

fn store(interval: u64) -> (MatrixStore<MemorySink>, MemorySink) {
    let handle = MemorySink::new();
    let options =
        StoreOptions::default().with_checkpoint_interval(NonZeroU64::new(interval).unwrap());
    (MatrixStore::new(handle.clone(), options).unwrap(), handle)
}

fn game(id: u64) -> Entity {
    Entity::new(id, format!("Game {id}"))
}

fn tags(list: &[&str]) -> FetchResult {
    FetchResult::default().with_tags(list.iter().copied())
}

#[test]
fn every_record_consumes_exactly_one_row() {
    let (store, handle) = store(4);
    let results = [
        tags(&["Indie"]),
        FetchResult::failed(Utc::now()),
        FetchResult::default(),
        tags(&["Indie", "RPG"]),
        tags(&[]),
    ];
    let mut rows = HashSet::new();
    for (i, r) in results.iter().enumerate() {
        let outcome = store.record(&game(i as u64 + 1), r).unwrap();
        assert!(rows.insert(outcome.row));
    }
    let expected: HashSet<u32> = (2..=6).collect();
    assert_eq!(rows, expected);
    assert_eq!(store.snapshot().next_row, 7);

    let grid = handle.live(DEFAULT_SHEET);
    for row in 2..=6 {
        assert!(!grid.text(row, 1).is_empty(), "row {row} has a title");
    }
    // failed fetch still carries the scrape time
    assert!(!grid.text(3, 3).is_empty());
    assert!(grid.text(4, 3).is_empty());
}

#[test]
fn a_tag_keeps_its_first_column() {
    let (store, handle) = store(100);
    store.record(&game(1), &tags(&["Action", "Indie"])).unwrap();
    store.record(&game(2), &tags(&["Indie", "Puzzle"])).unwrap();
    store.record(&game(3), &tags(&["Puzzle", "Action"])).unwrap();

    let snap = store.snapshot();
    let columns: Vec<(&str, &str)> = snap
        .tag_columns
        .iter()
        .map(|(t, c)| (t.as_str(), c.as_str()))
        .collect();
    assert_eq!(
        columns,
        vec![("Action", "G"), ("Indie", "H"), ("Puzzle", "I")]
    );
    assert_eq!(snap.next_column.as_str(), "J");
    assert_eq!(snap.column_of("Indie").unwrap().as_str(), "H");

    let grid = handle.live(DEFAULT_SHEET);
    assert_eq!(grid.row_text(4), vec!["Game 3", "3", "", "", "", "", "1", "", "1"]);
}

#[test]
fn tag_columns_roll_past_z() {
    let (store, handle) = store(100);
    let many: Vec<String> = (0..25).map(|i| format!("tag{i:02}")).collect();
    let refs: Vec<&str> = many.iter().map(String::as_str).collect();
    let outcome = store.record(&game(1), &tags(&refs)).unwrap();

    let letters: Vec<&str> = outcome
        .new_columns
        .iter()
        .map(|(_, c)| c.as_str())
        .collect();
    assert_eq!(letters.first(), Some(&"G"));
    assert_eq!(letters[19], "Z");
    assert_eq!(letters[20], "AA");
    assert_eq!(letters.last(), Some(&"AE"));
    assert_eq!(handle.live(DEFAULT_SHEET).get_at("AA", 1).unwrap().as_text(), Some("tag20"));
}

#[test]
fn checkpoints_fire_every_interval() {
    let (store, handle) = store(3);
    let mut checkpointed = Vec::new();
    for id in 1..=7 {
        let out = store.record(&game(id), &tags(&["Indie"])).unwrap();
        if out.checkpointed {
            checkpointed.push(id);
        }
    }
    assert_eq!(checkpointed, vec![3, 6]);
    assert_eq!(handle.flush_count(), 2);

    // durable copy holds header plus the first six rows
    let durable = handle.durable(DEFAULT_SHEET).unwrap();
    assert_eq!(durable.bounds().unwrap().0, 7);
    assert_eq!(handle.live(DEFAULT_SHEET).bounds().unwrap().0, 8);

    store.finish().unwrap();
    assert_eq!(handle.durable(DEFAULT_SHEET).unwrap().bounds().unwrap().0, 8);
}

#[test]
fn failed_checkpoint_loses_nothing_in_memory() {
    let (store, handle) = store(2);
    handle.fail_next_flushes(1);

    store.record(&game(1), &tags(&["Indie"])).unwrap();
    let err = store.record(&game(2), &tags(&["RPG"])).unwrap_err();
    assert_eq!(err.stage, PersistStage::Checkpoint);
    assert!(!err.is_terminal());
    assert!(handle.durable(DEFAULT_SHEET).is_none());

    let snap = store.snapshot();
    assert_eq!(snap.processed, 2);
    assert_eq!(snap.failed_checkpoints, 1);
    assert!(snap.column_of("RPG").is_some());

    store.record(&game(3), &tags(&[])).unwrap();
    let out = store.record(&game(4), &tags(&["Indie"])).unwrap();
    assert!(out.checkpointed);

    // the retry persisted everything, including rows from the failed window
    let durable = handle.durable(DEFAULT_SHEET).unwrap();
    assert_eq!(durable.text(3, 1), "Game 2");
    assert_eq!(durable.text(3, 8), "1");
    assert_eq!(durable.bounds().unwrap().0, 5);
}

#[test]
fn header_failure_is_reported() {
    let handle = MemorySink::new();
    handle.fail_writes(true);
    let err = MatrixStore::new(handle, StoreOptions::default())
        .err()
        .expect("header write must fail");
    assert_eq!(err.stage, PersistStage::Header);
}

#[test]
fn worked_example_two_entities() {
    let (store, handle) = store(10);
    store
        .record(&Entity::new(1, "A"), &tags(&["x", "y"]))
        .unwrap();
    store.record(&Entity::new(2, "B"), &tags(&["y"])).unwrap();
    store.finish().unwrap();

    let grid = handle.durable(DEFAULT_SHEET).unwrap();
    assert_eq!(grid.row_text(1)[6..].to_vec(), vec!["x", "y"]);
    assert_eq!(grid.row_text(2), vec!["A", "1", "", "", "", "", "1", "1"]);
    assert_eq!(grid.row_text(3), vec!["B", "2", "", "", "", "", "", "1"]);
}
