use log::debug;
use ndarray::Array2;
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use super::PositionSet;
use crate::{NnueErr, Result, features::FeatureEncoder};

/// An encoded batch ready to be fed to the network.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `N x encoder.width()` features.
    pub x: Array2<f32>,
    /// `N x 1` targets.
    pub y: Array2<f32>,
    pub labels: Vec<i64>,
}

/// Encodes batches on a bounded pool of threads and hands them back in order.
///
/// The pool only reads the dataset. Batches are encoded a window of `prefetch` batches at a
/// time and the caller consumes each window on its own thread, in the order given.
pub struct BatchLoader {
    pool: ThreadPool,
    encoder: FeatureEncoder,
    batch_size: usize,
    prefetch: usize,
}

impl BatchLoader {
    /// Creates a new `BatchLoader`.
    ///
    /// # Arguments
    /// * `encoder` - Turns positions into features.
    /// * `batch_size` - The maximum amount of positions per batch.
    /// * `prefetch` - The amount of batches encoded at once.
    /// * `workers` - The threads of the pool.
    pub fn new(
        encoder: FeatureEncoder,
        batch_size: usize,
        prefetch: usize,
        workers: usize,
    ) -> Result<Self> {
        if batch_size == 0 || prefetch == 0 || workers == 0 {
            return Err(NnueErr::InvalidConfig(
                "batch_size, prefetch and workers must be > 0".into(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("batch-loader-{i}"))
            .build()?;

        debug!("batch loader ready with {workers} workers");

        Ok(Self {
            pool,
            encoder,
            batch_size,
            prefetch,
        })
    }

    #[inline]
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Encodes a single batch out of the given rows.
    pub fn encode(&self, set: &PositionSet, rows: &[usize]) -> Result<Batch> {
        let x = self.encoder.encode_rows(set, rows)?;
        let labels: Vec<i64> = rows.iter().map(|&row| set.labels()[row]).collect();
        let y = Array2::from_shape_fn((labels.len(), 1), |(i, _)| labels[i] as f32);

        Ok(Batch { x, y, labels })
    }

    /// Walks `order` batch by batch.
    ///
    /// # Arguments
    /// * `set` - The positions.
    /// * `order` - The rows to visit, each batch takes the next `batch_size` of them.
    /// * `f` - Called with every batch, in order. An error stops the pass.
    ///
    /// # Returns
    /// The first encoding error or error returned by `f`.
    pub fn for_each<F>(&self, set: &PositionSet, order: &[usize], mut f: F) -> Result<()>
    where
        F: FnMut(Batch) -> Result<()>,
    {
        let chunks: Vec<&[usize]> = order.chunks(self.batch_size).collect();

        for window in chunks.chunks(self.prefetch) {
            let batches = self.pool.install(|| {
                window
                    .par_iter()
                    .map(|rows| self.encode(set, rows))
                    .collect::<Result<Vec<_>>>()
            })?;

            for batch in batches {
                f(batch)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PositionRecord;

    fn set(n: usize) -> PositionSet {
        PositionSet::from_records((0..n).map(|i| PositionRecord {
            history: None,
            player0_mask: 1 << (i % 48),
            player1_mask: 0,
            side_to_move: 1,
            move_count: 1,
            label: i as i64,
        }))
        .unwrap()
    }

    #[test]
    fn every_row_is_visited_once_in_order() {
        let set = set(23);
        let loader = BatchLoader::new(FeatureEncoder::default(), 4, 2, 3).unwrap();
        let order: Vec<usize> = (0..23).rev().collect();

        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        loader
            .for_each(&set, &order, |batch| {
                sizes.push(batch.x.nrows());
                assert_eq!(batch.y.dim(), (batch.labels.len(), 1));
                seen.extend(batch.labels);
                Ok(())
            })
            .unwrap();

        let expected: Vec<i64> = order.iter().map(|&i| i as i64).collect();
        assert_eq!(seen, expected);
        assert_eq!(sizes, [4, 4, 4, 4, 4, 3]);
    }

    #[test]
    fn errors_from_the_callback_stop_the_pass() {
        let set = set(10);
        let loader = BatchLoader::new(FeatureEncoder::default(), 2, 8, 2).unwrap();
        let order: Vec<usize> = (0..10).collect();

        let mut calls = 0;
        let res = loader.for_each(&set, &order, |_| {
            calls += 1;
            Err(NnueErr::InvalidConfig("stop".into()))
        });

        assert!(res.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn out_of_range_rows_fail() {
        let set = set(2);
        let loader = BatchLoader::new(FeatureEncoder::default(), 2, 1, 1).unwrap();

        assert!(loader.for_each(&set, &[0, 5], |_| Ok(())).is_err());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(BatchLoader::new(FeatureEncoder::default(), 0, 1, 1).is_err());
    }
}
