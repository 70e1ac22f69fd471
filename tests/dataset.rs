mod common;

use connect4_nnue::{
    NnueErr,
    data::{RecordErr, sqlite},
};
use rusqlite::types::Value;
use tempfile::tempdir;

use common::{canonical_db, create_db, small_set};

fn int(v: i64) -> Value {
    Value::Integer(v)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn canonical_databases_load_as_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("canonical.sqlite3");
    let set = small_set();
    canonical_db(&path, &set);

    assert_eq!(sqlite::load(&path).unwrap(), set);
}

#[test]
fn raw_engine_boards_are_made_absolute() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.sqlite3");

    // moves, player (to move), opponent, eval
    create_db(
        &path,
        "history TEXT, moves INTEGER, player INTEGER, opponent INTEGER, eval INTEGER",
        &[
            vec![text("4"), int(2), int(0b01), int(0b10), int(1)],
            vec![text("45"), int(3), int(0b100), int(0b011), int(-1)],
        ],
    );

    let set = sqlite::load(&path).unwrap();

    assert_eq!(set.side_to_move(), &[0, 1]);
    assert_eq!(set.move_count(), &[2, 3]);
    assert_eq!(set.player0(), &[0b01, 0b011]);
    assert_eq!(set.player1(), &[0b10, 0b100]);
    assert_eq!(set.labels(), &[1, -1]);
}

#[test]
fn formatted_databases_count_occupied_cells() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("formatted.sqlite3");

    create_db(
        &path,
        "history TEXT, p2mv INTEGER, p0 INTEGER, p1 INTEGER, eval INTEGER",
        &[vec![text("123"), int(1), int(0b101), int(0b010), int(0)]],
    );

    let set = sqlite::load(&path).unwrap();

    assert_eq!(set.move_count(), &[3]);
    assert_eq!(set.side_to_move(), &[1]);
}

#[test]
fn merged_databases_keep_their_counters() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("merged.sqlite3");

    create_db(
        &path,
        "history TEXT, p2mv INTEGER, moves INTEGER, p0 INTEGER, p1 INTEGER, eval INTEGER",
        &[vec![Value::Null, int(0), int(4), int(0b0011), int(0b1100), int(1)]],
    );

    let set = sqlite::load(&path).unwrap();
    let record = set.get(0).unwrap();

    assert_eq!(record.history, None);
    assert_eq!(record.move_count, 4);
    assert_eq!(record.player0_mask, 0b0011);
    assert_eq!(record.player1_mask, 0b1100);
}

#[test]
fn missing_databases_are_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.sqlite3");

    assert!(matches!(sqlite::load(&path), Err(NnueErr::MissingDatabase(p)) if p == path));
}

#[test]
fn unknown_layouts_fail_at_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unknown.sqlite3");
    create_db(&path, "a INTEGER, b INTEGER", &[vec![int(1), int(2)]]);

    assert!(matches!(sqlite::load(&path), Err(NnueErr::UnknownSchema { .. })));
}

#[test]
fn extra_columns_fail_at_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("extra.sqlite3");

    create_db(
        &path,
        "history TEXT, side_to_move INTEGER, move_count INTEGER, player0_mask INTEGER, \
         player1_mask INTEGER, label INTEGER, junk TEXT",
        &[vec![text("3"), int(1), int(1), int(1), int(0), int(0), text("x")]],
    );

    let Err(NnueErr::UnknownSchema { columns, .. }) = sqlite::load(&path) else {
        panic!("a table with an extra column must not load");
    };
    assert!(columns.iter().any(|c| c == "junk"));
}

#[test]
fn wrong_column_types_fail_at_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("types.sqlite3");

    create_db(
        &path,
        "history TEXT, p2mv INTEGER, p0 INTEGER, p1 INTEGER, eval INTEGER",
        &[vec![text("1"), int(1), text("not a mask"), int(0), int(0)]],
    );

    assert!(matches!(sqlite::load(&path), Err(NnueErr::Sqlite(_))));
}

#[test]
fn invalid_records_name_their_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlap.sqlite3");

    create_db(
        &path,
        "history TEXT, p2mv INTEGER, moves INTEGER, p0 INTEGER, p1 INTEGER, eval INTEGER",
        &[
            vec![text("1"), int(1), int(1), int(1), int(0), int(0)],
            vec![text("12"), int(0), int(2), int(1), int(1), int(0)],
        ],
    );

    match sqlite::load(&path) {
        Err(NnueErr::InvalidRecord { row, reason }) => {
            assert_eq!(row, 1);
            assert_eq!(reason, RecordErr::Overlap { cells: 1 });
        }
        other => panic!("expected an invalid record, got {other:?}"),
    }
}

#[test]
fn empty_databases_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.sqlite3");
    create_db(
        &path,
        "history TEXT, p2mv INTEGER, p0 INTEGER, p1 INTEGER, eval INTEGER",
        &[],
    );

    assert!(matches!(sqlite::load(&path), Err(NnueErr::EmptyDataset(_))));
}

#[test]
fn merge_canonicalizes_every_input() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("raw.sqlite3");
    let canonical = dir.path().join("canonical.sqlite3");
    let output = dir.path().join("output.sqlite3");

    create_db(
        &raw,
        "history TEXT, moves INTEGER, player INTEGER, opponent INTEGER, eval INTEGER",
        &[vec![text("4"), int(1), int(0b01), int(0b10), int(1)]],
    );
    canonical_db(&canonical, &small_set());

    let written = connect4_nnue::merge(&output, &[&raw, &canonical]).unwrap();
    assert_eq!(written, 1 + small_set().len());

    let merged = sqlite::load(&output).unwrap();
    assert_eq!(merged.len(), written);

    let first = merged.get(0).unwrap();
    assert_eq!((first.player0_mask, first.player1_mask), (0b10, 0b01));
    assert_eq!(merged.get(1), small_set().get(0));
}
