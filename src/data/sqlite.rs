use std::path::Path;

use log::{debug, info};
use rusqlite::{Connection, OpenFlags, Row, params};

use super::{PositionRecord, PositionSet};
use crate::{NnueErr, Result};

const TABLE: &str = "positions";

/// The historical layouts of the `positions` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `history, side_to_move, move_count, player0_mask, player1_mask, label`.
    Canonical,
    /// `history, p2mv, moves, p0, p1, eval`, written by the old merge script.
    Merged,
    /// `history, p2mv, p0, p1, eval`, without a move counter.
    Formatted,
    /// `history, moves, player, opponent, eval`, as the engine emits it: boards relative to the
    /// side to move.
    Raw,
}

impl Schema {
    const ALL: [Self; 4] = [Self::Canonical, Self::Merged, Self::Formatted, Self::Raw];

    /// Resolves the layout from the table's column names.
    ///
    /// The columns must match one layout exactly, `history` being the only optional one. Extra or
    /// missing columns resolve to `None`.
    pub fn detect(columns: &[String]) -> Option<Self> {
        let mut present: Vec<&str> = columns
            .iter()
            .map(String::as_str)
            .filter(|c| *c != "history")
            .collect();
        present.sort_unstable();

        Self::ALL.into_iter().find(|schema| {
            let mut expected = schema.column_names().to_vec();
            expected.sort_unstable();
            present == expected
        })
    }

    fn column_names(&self) -> &'static [&'static str] {
        match self {
            Self::Canonical => &[
                "side_to_move",
                "move_count",
                "player0_mask",
                "player1_mask",
                "label",
            ],
            Self::Merged => &["p2mv", "moves", "p0", "p1", "eval"],
            Self::Formatted => &["p2mv", "p0", "p1", "eval"],
            Self::Raw => &["moves", "player", "opponent", "eval"],
        }
    }

    fn columns(&self) -> String {
        self.column_names().join(", ")
    }

    /// Reads a row selected with `history` first and then `self.columns()`.
    fn read_row(&self, row: &Row) -> rusqlite::Result<PositionRecord> {
        let history: Option<String> = row.get(0)?;
        let mask = |idx: usize| row.get::<_, i64>(idx).map(|m| m as u64);

        let record = match self {
            Self::Canonical | Self::Merged => PositionRecord {
                history,
                side_to_move: row.get(1)?,
                move_count: row.get(2)?,
                player0_mask: mask(3)?,
                player1_mask: mask(4)?,
                label: row.get(5)?,
            },
            Self::Formatted => {
                let (player0_mask, player1_mask) = (mask(2)?, mask(3)?);

                PositionRecord {
                    history,
                    side_to_move: row.get(1)?,
                    move_count: (player0_mask | player1_mask).count_ones(),
                    player0_mask,
                    player1_mask,
                    label: row.get(4)?,
                }
            }
            Self::Raw => {
                let move_count: u32 = row.get(1)?;
                let (player, opponent) = (mask(2)?, mask(3)?);
                let side_to_move = (move_count % 2) as u8;

                let (player0_mask, player1_mask) = match side_to_move {
                    0 => (player, opponent),
                    _ => (opponent, player),
                };

                PositionRecord {
                    history,
                    side_to_move,
                    move_count,
                    player0_mask,
                    player1_mask,
                    label: row.get(4)?,
                }
            }
        };

        Ok(record)
    }
}

/// Lists the column names of the `positions` table, empty if there's no such table.
fn table_columns(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(columns)
}

/// Loads every position of a database into memory, normalized to the canonical shape.
///
/// # Arguments
/// * `path` - The SQLite file holding a `positions` table in any known layout.
///
/// # Returns
/// The validated positions, or an error if the file is missing, the layout is unknown, a value
/// has the wrong type, a record is invalid or there are no positions at all.
pub fn load(path: &Path) -> Result<PositionSet> {
    if !path.is_file() {
        return Err(NnueErr::MissingDatabase(path.to_path_buf()));
    }

    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let columns = table_columns(&conn)?;

    let Some(schema) = Schema::detect(&columns) else {
        return Err(NnueErr::UnknownSchema {
            path: path.to_path_buf(),
            columns,
        });
    };

    debug!("{} uses the {schema:?} layout", path.display());

    let history = match columns.iter().any(|c| c == "history") {
        true => "history",
        false => "NULL",
    };

    let query = format!(
        "SELECT {history}, {} FROM {TABLE} ORDER BY rowid",
        schema.columns()
    );

    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query([])?;
    let mut set = PositionSet::new();

    while let Some(row) = rows.next()? {
        let record = schema.read_row(row)?;

        set.push(record).map_err(|reason| NnueErr::InvalidRecord {
            row: set.len(),
            reason,
        })?;
    }

    if set.is_empty() {
        return Err(NnueErr::EmptyDataset(path.to_path_buf()));
    }

    info!("loaded {} positions from {}", set.len(), path.display());
    Ok(set)
}

/// Appends positions to a database in the canonical layout, creating the table if needed.
///
/// Everything is written in a single transaction.
///
/// # Arguments
/// * `path` - The output SQLite file.
/// * `sets` - The positions to write, in order.
///
/// # Returns
/// The amount of records written.
pub fn write_canonical(path: &Path, sets: &[PositionSet]) -> Result<usize> {
    let mut conn = Connection::open(path)?;

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            history TEXT,
            side_to_move INTEGER NOT NULL,
            move_count INTEGER NOT NULL,
            player0_mask INTEGER NOT NULL,
            player1_mask INTEGER NOT NULL,
            label INTEGER NOT NULL
        )"
    ))?;

    let tx = conn.transaction()?;
    let mut written = 0;

    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {TABLE}
                (history, side_to_move, move_count, player0_mask, player1_mask, label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ))?;

        for record in sets.iter().flat_map(|set| set.iter()) {
            stmt.execute(params![
                record.history,
                record.side_to_move,
                record.move_count,
                record.player0_mask as i64,
                record.player1_mask as i64,
                record.label,
            ])?;
            written += 1;
        }
    }

    tx.commit()?;
    info!("wrote {written} positions to {}", path.display());
    Ok(written)
}
