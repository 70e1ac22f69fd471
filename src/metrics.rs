use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    time::Duration,
};

use ndarray::ArrayView2;

use crate::{Result, config::LogMetric};

/// Accumulates the loss and correctness of the batches of a single phase.
///
/// A prediction is correct when rounding it to the nearest integer gives exactly the label, so
/// the accuracy only means something when labels come from a small discrete set such as
/// `{-1, 0, 1}`. For fine grained scores it will stay close to zero whatever the loss does.
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    total_loss: f64,
    total_correct: usize,
    batch_count: usize,
}

/// The scalars of a finished phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseMetrics {
    pub average_loss: f32,
    pub accuracy: f32,
    pub correct: usize,
    pub batch_count: usize,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one batch.
    ///
    /// # Arguments
    /// * `loss` - The mean loss of the batch.
    /// * `y_pred` - The `N x 1` predictions.
    /// * `labels` - The `N` expected labels.
    pub fn record(&mut self, loss: f32, y_pred: ArrayView2<f32>, labels: &[i64]) {
        self.total_loss += f64::from(loss);
        self.batch_count += 1;
        self.total_correct += y_pred
            .iter()
            .zip(labels)
            .filter(|&(pred, &label)| pred.round() as i64 == label)
            .count();
    }

    /// Closes the phase.
    ///
    /// # Arguments
    /// * `batch_size` - The configured batch size, the average loss is scaled by it.
    /// * `dataset_size` - The amount of records seen in the phase.
    ///
    /// # Returns
    /// `average_loss = total_loss * batch_size / batch_count` and
    /// `accuracy = total_correct / dataset_size`, both 0 for an empty phase.
    pub fn finish(&self, batch_size: usize, dataset_size: usize) -> PhaseMetrics {
        let average_loss = match self.batch_count {
            0 => 0.,
            n => self.total_loss * batch_size as f64 / n as f64,
        };

        let accuracy = match dataset_size {
            0 => 0.,
            n => self.total_correct.min(n) as f64 / n as f64,
        };

        PhaseMetrics {
            average_loss: average_loss as f32,
            accuracy: accuracy as f32,
            correct: self.total_correct,
            batch_count: self.batch_count,
        }
    }
}

/// What a single epoch produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train: PhaseMetrics,
    pub test: PhaseMetrics,
    pub elapsed: Duration,
}

impl EpochMetrics {
    /// Returns the `train test` pair written to the log.
    pub fn pair(&self, metric: LogMetric) -> (f32, f32) {
        match metric {
            LogMetric::Loss => (self.train.average_loss, self.test.average_loss),
            LogMetric::Accuracy => (self.train.accuracy, self.test.accuracy),
        }
    }
}

/// The training log: one `train test` line per epoch.
///
/// Every line is flushed as soon as it's written so a crash only loses the epoch in flight.
#[derive(Debug)]
pub struct EpochLog {
    writer: BufWriter<File>,
    metric: LogMetric,
}

impl EpochLog {
    /// Creates the log, truncating any stale one.
    pub fn create(path: &Path, metric: LogMetric) -> Result<Self> {
        let file = File::create(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            metric,
        })
    }

    pub fn append(&mut self, metrics: &EpochMetrics) -> Result<()> {
        let (train, test) = metrics.pair(self.metric);

        writeln!(self.writer, "{train} {test}")?;
        self.writer.flush()?;
        Ok(())
    }
}
