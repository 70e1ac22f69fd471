use super::{PositionRecord, RecordErr};
use crate::{NnueErr, Result};

/// A columnar, in-memory collection of validated positions.
///
/// Every column has the same length, the row `i` of each one belongs to the same record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSet {
    history: Vec<Option<String>>,
    player0: Vec<u64>,
    player1: Vec<u64>,
    side_to_move: Vec<u8>,
    move_count: Vec<u32>,
    labels: Vec<i64>,
}

impl PositionSet {
    /// Creates a new empty `PositionSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set out of records, validating each of them.
    ///
    /// # Returns
    /// An `InvalidRecord` error naming the first offending row.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = PositionRecord>,
    {
        let mut set = Self::new();

        for (row, record) in records.into_iter().enumerate() {
            set.push(record)
                .map_err(|reason| NnueErr::InvalidRecord { row, reason })?;
        }

        Ok(set)
    }

    /// Appends a record if it holds every board invariant.
    pub fn push(&mut self, record: PositionRecord) -> std::result::Result<(), RecordErr> {
        record.validate()?;

        self.history.push(record.history);
        self.player0.push(record.player0_mask);
        self.player1.push(record.player1_mask);
        self.side_to_move.push(record.side_to_move);
        self.move_count.push(record.move_count);
        self.labels.push(record.label);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns a copy of the record at `row`, if any.
    pub fn get(&self, row: usize) -> Option<PositionRecord> {
        (row < self.len()).then(|| PositionRecord {
            history: self.history[row].clone(),
            player0_mask: self.player0[row],
            player1_mask: self.player1[row],
            side_to_move: self.side_to_move[row],
            move_count: self.move_count[row],
            label: self.labels[row],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = PositionRecord> + '_ {
        (0..self.len()).filter_map(|row| self.get(row))
    }

    #[inline]
    pub fn player0(&self) -> &[u64] {
        &self.player0
    }

    #[inline]
    pub fn player1(&self) -> &[u64] {
        &self.player1
    }

    #[inline]
    pub fn side_to_move(&self) -> &[u8] {
        &self.side_to_move
    }

    #[inline]
    pub fn move_count(&self) -> &[u32] {
        &self.move_count
    }

    #[inline]
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(player0_mask: u64, player1_mask: u64, move_count: u32, label: i64) -> PositionRecord {
        PositionRecord {
            history: Some("44".into()),
            player0_mask,
            player1_mask,
            side_to_move: (move_count % 2) as u8,
            move_count,
            label,
        }
    }

    #[test]
    fn columns_stay_aligned() {
        let set = PositionSet::from_records([record(1, 2, 2, 1), record(4, 0, 1, -1)]).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.player0(), &[1, 4]);
        assert_eq!(set.player1(), &[2, 0]);
        assert_eq!(set.side_to_move(), &[0, 1]);
        assert_eq!(set.labels(), &[1, -1]);
        assert_eq!(set.get(1), Some(record(4, 0, 1, -1)));
        assert_eq!(set.get(2), None);
    }

    #[test]
    fn the_first_invalid_row_is_reported() {
        let records = [record(1, 2, 2, 0), record(1, 1, 2, 0)];

        match PositionSet::from_records(records) {
            Err(NnueErr::InvalidRecord { row, reason }) => {
                assert_eq!(row, 1);
                assert_eq!(reason, RecordErr::Overlap { cells: 1 });
            }
            other => panic!("expected an invalid record, got {other:?}"),
        }
    }
}
