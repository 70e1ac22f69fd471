use ndarray::{Array2, ArrayViewMut1, s};

use crate::{
    NnueErr, Result,
    config::CellOrder,
    data::{BOARD_CELLS, PositionSet, RecordErr, check_masks},
};

/// Turns positions into the network's input rows.
///
/// Each row is laid out as `[player0 cells, player1 cells, side to move, move count]`, with
/// `board_cells` values for each player. The encoder has no parameters, training and inference
/// share it as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureEncoder {
    board_cells: u32,
    order: CellOrder,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self {
            board_cells: BOARD_CELLS,
            order: CellOrder::BigEndian,
        }
    }
}

impl FeatureEncoder {
    /// Creates a new `FeatureEncoder`.
    ///
    /// # Arguments
    /// * `board_cells` - The amount of meaningful low bits of each mask, in `1..=64`.
    /// * `order` - Where each cell lands inside its segment.
    pub fn new(board_cells: u32, order: CellOrder) -> Result<Self> {
        if !(1..=64).contains(&board_cells) {
            return Err(NnueErr::InvalidConfig(format!(
                "board_cells must be in 1..=64, got {board_cells}"
            )));
        }

        Ok(Self { board_cells, order })
    }

    /// Returns the length of an encoded row.
    #[inline]
    pub fn width(&self) -> usize {
        2 * self.board_cells as usize + 2
    }

    /// Returns the column a board cell is written to.
    ///
    /// # Arguments
    /// * `player` - 0 or 1.
    /// * `cell` - The bit of the player's mask.
    ///
    /// # Returns
    /// `None` if the player or the cell are out of range.
    pub fn feature_index(&self, player: u8, cell: u32) -> Option<usize> {
        if player > 1 || cell >= self.board_cells {
            return None;
        }

        let b = self.board_cells as usize;
        let offset = match self.order {
            CellOrder::BigEndian => b - 1 - cell as usize,
            CellOrder::LsbFirst => cell as usize,
        };

        Some(player as usize * b + offset)
    }

    /// Encodes a batch given as parallel columns.
    ///
    /// # Arguments
    /// * `player0` - The masks of the first player.
    /// * `player1` - The masks of the second player.
    /// * `side_to_move` - Who moves next, 0 or 1.
    /// * `move_count` - The plies played so far.
    ///
    /// # Returns
    /// An `N x width()` matrix, or an error if the columns differ in length or a record doesn't
    /// fit the board.
    pub fn encode(
        &self,
        player0: &[u64],
        player1: &[u64],
        side_to_move: &[u8],
        move_count: &[u32],
    ) -> Result<Array2<f32>> {
        let n = player0.len();

        for (what, got) in [
            ("player1 masks", player1.len()),
            ("side to move", side_to_move.len()),
            ("move counts", move_count.len()),
        ] {
            if got != n {
                return Err(NnueErr::LengthMismatch {
                    what,
                    got,
                    expected: n,
                });
            }
        }

        let mut x = Array2::zeros((n, self.width()));

        for (row, out) in x.outer_iter_mut().enumerate() {
            self.encode_row(
                out,
                player0[row],
                player1[row],
                side_to_move[row],
                move_count[row],
            )
            .map_err(|reason| NnueErr::InvalidRecord { row, reason })?;
        }

        Ok(x)
    }

    /// Encodes the given rows of a set, in order.
    pub fn encode_rows(&self, set: &PositionSet, rows: &[usize]) -> Result<Array2<f32>> {
        let mut x = Array2::zeros((rows.len(), self.width()));

        for (out, &row) in x.outer_iter_mut().zip(rows) {
            if row >= set.len() {
                return Err(NnueErr::LengthMismatch {
                    what: "position rows",
                    got: row + 1,
                    expected: set.len(),
                });
            }

            self.encode_row(
                out,
                set.player0()[row],
                set.player1()[row],
                set.side_to_move()[row],
                set.move_count()[row],
            )
            .map_err(|reason| NnueErr::InvalidRecord { row, reason })?;
        }

        Ok(x)
    }

    fn encode_row(
        &self,
        mut out: ArrayViewMut1<f32>,
        player0: u64,
        player1: u64,
        side_to_move: u8,
        move_count: u32,
    ) -> std::result::Result<(), RecordErr> {
        check_masks(player0, player1, self.board_cells)?;

        if side_to_move > 1 {
            return Err(RecordErr::SideToMove(side_to_move));
        }

        let b = self.board_cells as usize;
        self.expand(player0, out.slice_mut(s![..b]));
        self.expand(player1, out.slice_mut(s![b..2 * b]));
        out[2 * b] = side_to_move as f32;
        out[2 * b + 1] = move_count as f32;
        Ok(())
    }

    /// Writes the bits of `mask` into a segment of `board_cells` values.
    fn expand(&self, mask: u64, mut out: ArrayViewMut1<f32>) {
        let b = self.board_cells as usize;

        match self.order {
            CellOrder::BigEndian => {
                let bits = mask
                    .to_be_bytes()
                    .into_iter()
                    .flat_map(|byte| (0..8).rev().map(move |k| (byte >> k) & 1));

                // the first 64 - b bits are the unused top of the container
                for (o, bit) in out.iter_mut().zip(bits.skip(64 - b)) {
                    *o = bit as f32;
                }
            }
            CellOrder::LsbFirst => {
                for (c, o) in out.iter_mut().enumerate() {
                    *o = ((mask >> c) & 1) as f32;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn cell_zero_is_the_last_big_endian_bit() {
        let encoder = FeatureEncoder::default();
        let x = encoder.encode(&[1], &[0], &[0], &[0]).unwrap();
        let row = x.row(0);

        assert_eq!(x.ncols(), 98);
        assert_eq!(row.slice(s![..48]).sum(), 1.);
        assert_eq!(row[47], 1.);
        assert_eq!(encoder.feature_index(0, 0), Some(47));
        assert_eq!(row.slice(s![48..96]).sum(), 0.);
    }

    #[test]
    fn lsb_first_keeps_cells_in_place() {
        let encoder = FeatureEncoder::new(48, CellOrder::LsbFirst).unwrap();
        let x = encoder.encode(&[1], &[1 << 47], &[1], &[3]).unwrap();
        let row = x.row(0);

        assert_eq!(row[0], 1.);
        assert_eq!(row[48 + 47], 1.);
        assert_eq!(encoder.feature_index(1, 47), Some(95));
        assert_eq!(row.sum(), 1. + 1. + 1. + 3.);
    }

    #[test]
    fn every_cell_matches_its_index() {
        for order in [CellOrder::BigEndian, CellOrder::LsbFirst] {
            let encoder = FeatureEncoder::new(48, order).unwrap();

            for cell in 0..48 {
                let x = encoder.encode(&[0], &[1 << cell], &[0], &[0]).unwrap();
                let idx = encoder.feature_index(1, cell).unwrap();

                assert_eq!(x[[0, idx]], 1., "{order:?} cell {cell}");
                assert_eq!(x.row(0).sum(), 1.);
            }
        }
    }

    #[test]
    fn narrow_boards() {
        let encoder = FeatureEncoder::new(4, CellOrder::BigEndian).unwrap();
        let x = encoder.encode(&[0b0011], &[0b1000], &[1], &[3]).unwrap();

        assert_eq!(x, array![[0., 0., 1., 1., 1., 0., 0., 0., 1., 3.]]);
    }

    #[test]
    fn scalars_are_copied() {
        let encoder = FeatureEncoder::default();
        let x = encoder.encode(&[0, 0], &[0, 0], &[1, 0], &[7, 12]).unwrap();

        assert_eq!(x[[0, 96]], 1.);
        assert_eq!(x[[0, 97]], 7.);
        assert_eq!(x[[1, 96]], 0.);
        assert_eq!(x[[1, 97]], 12.);
    }

    #[test]
    fn bits_above_the_board_fail() {
        let encoder = FeatureEncoder::default();
        let err = encoder.encode(&[0, 1 << 50], &[0, 0], &[0, 0], &[0, 0]);

        assert!(matches!(
            err,
            Err(NnueErr::InvalidRecord {
                row: 1,
                reason: RecordErr::OutOfBoard { player: 0, .. }
            })
        ));
    }

    #[test]
    fn overlapping_masks_fail() {
        let encoder = FeatureEncoder::default();
        assert!(encoder.encode(&[3], &[1], &[0], &[2]).is_err());
    }

    #[test]
    fn columns_must_have_the_same_length() {
        let encoder = FeatureEncoder::default();
        let err = encoder.encode(&[0, 0], &[0], &[0, 0], &[0, 0]);

        assert!(matches!(err, Err(NnueErr::LengthMismatch { got: 1, expected: 2, .. })));
    }

    #[test]
    fn encode_rows_follows_the_given_order() {
        let set = PositionSet::from_records((0..3).map(|i| crate::data::PositionRecord {
            history: None,
            player0_mask: 1 << i,
            player1_mask: 0,
            side_to_move: 1,
            move_count: 1,
            label: i,
        }))
        .unwrap();

        let encoder = FeatureEncoder::new(48, CellOrder::LsbFirst).unwrap();
        let x = encoder.encode_rows(&set, &[2, 0]).unwrap();

        assert_eq!(x[[0, 2]], 1.);
        assert_eq!(x[[1, 0]], 1.);
        assert!(encoder.encode_rows(&set, &[3]).is_err());
    }
}
