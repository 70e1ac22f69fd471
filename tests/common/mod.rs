#![allow(dead_code)]

use std::path::Path;

use connect4_nnue::data::{PositionRecord, PositionSet};
use rusqlite::{Connection, params};

pub fn record(player0_mask: u64, player1_mask: u64, move_count: u32, label: i64) -> PositionRecord {
    PositionRecord {
        history: Some(format!("{move_count}")),
        player0_mask,
        player1_mask,
        side_to_move: (move_count % 2) as u8,
        move_count,
        label,
    }
}

/// Two positions that differ in a single cell, one winning and one losing.
pub fn separable_pair() -> PositionSet {
    PositionSet::from_records([record(1, 0, 1, 1), record(0, 1, 1, -1)]).unwrap()
}

/// A handful of positions with labels in {-1, 0, 1}.
pub fn small_set() -> PositionSet {
    PositionSet::from_records((0..12u32).map(|i| {
        let label = (i % 3) as i64 - 1;
        record(1 << i, 1 << (i + 16), 2 + i % 2, label)
    }))
    .unwrap()
}

/// Creates a `positions` table with the given definition and rows.
pub fn create_db(path: &Path, columns: &str, rows: &[Vec<rusqlite::types::Value>]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(&format!("CREATE TABLE positions ({columns})"))
        .unwrap();

    for row in rows {
        let placeholders = vec!["?"; row.len()].join(", ");
        conn.execute(
            &format!("INSERT INTO positions VALUES ({placeholders})"),
            rusqlite::params_from_iter(row.iter()),
        )
        .unwrap();
    }
}

/// Writes a canonical database.
pub fn canonical_db(path: &Path, set: &PositionSet) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE positions (
            history TEXT,
            side_to_move INTEGER,
            move_count INTEGER,
            player0_mask INTEGER,
            player1_mask INTEGER,
            label INTEGER
        )",
    )
    .unwrap();

    for r in set.iter() {
        conn.execute(
            "INSERT INTO positions VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                r.history,
                r.side_to_move,
                r.move_count,
                r.player0_mask as i64,
                r.player1_mask as i64,
                r.label
            ],
        )
        .unwrap();
    }
}
