use std::{
    error::Error,
    fmt::{self, Display},
};

/// Width of the low bit span a mask may use.
///
/// Column `col` and row `row` map to bit `7 * col + row`, so the 42 playable cells all fall below
/// bit 48. Row 6 of each column (`7 * col + 6`) is a sentinel, and the sentinels inside the span
/// are not rejected.
pub const BOARD_CELLS: u32 = 48;

/// A single training position as stored in the canonical dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    pub history: Option<String>,
    pub player0_mask: u64,
    pub player1_mask: u64,
    pub side_to_move: u8,
    pub move_count: u32,
    pub label: i64,
}

/// The board invariant a record breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordErr {
    /// Both players occupy the cells in `cells`.
    Overlap { cells: u64 },
    /// `player` has bits set at or above `board_cells`.
    OutOfBoard { player: u8, board_cells: u32 },
    /// `side_to_move` is not 0 or 1.
    SideToMove(u8),
    /// `side_to_move` is not `move_count % 2`.
    Parity { side_to_move: u8, move_count: u32 },
}

impl Display for RecordErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap { cells } => write!(f, "both players occupy cells {cells:#x}"),
            Self::OutOfBoard {
                player,
                board_cells,
            } => write!(f, "player {player} has bits above the {board_cells} board cells"),
            Self::SideToMove(stm) => write!(f, "side to move must be 0 or 1, got {stm}"),
            Self::Parity {
                side_to_move,
                move_count,
            } => write!(
                f,
                "side to move {side_to_move} doesn't match the parity of {move_count} moves"
            ),
        }
    }
}

impl Error for RecordErr {}

/// Checks that both masks fit in `board_cells` bits and don't overlap.
///
/// # Arguments
/// * `player0_mask` - Occupancy of the first player.
/// * `player1_mask` - Occupancy of the second player.
/// * `board_cells` - The amount of meaningful low bits, at most 64.
pub fn check_masks(
    player0_mask: u64,
    player1_mask: u64,
    board_cells: u32,
) -> Result<(), RecordErr> {
    let outside = match board_cells {
        64.. => 0,
        b => !0u64 << b,
    };

    if player0_mask & outside != 0 {
        return Err(RecordErr::OutOfBoard {
            player: 0,
            board_cells,
        });
    }

    if player1_mask & outside != 0 {
        return Err(RecordErr::OutOfBoard {
            player: 1,
            board_cells,
        });
    }

    let cells = player0_mask & player1_mask;
    if cells != 0 {
        return Err(RecordErr::Overlap { cells });
    }

    Ok(())
}

impl PositionRecord {
    /// Checks every board invariant of the record.
    pub fn validate(&self) -> Result<(), RecordErr> {
        check_masks(self.player0_mask, self.player1_mask, BOARD_CELLS)?;

        if self.side_to_move > 1 {
            return Err(RecordErr::SideToMove(self.side_to_move));
        }

        if u32::from(self.side_to_move) != self.move_count % 2 {
            return Err(RecordErr::Parity {
                side_to_move: self.side_to_move,
                move_count: self.move_count,
            });
        }

        Ok(())
    }
}
