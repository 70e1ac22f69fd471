use std::time::Instant;

use log::{debug, info};
use machine_learning::{arch::loss::LossFn, optimization::Optimizer};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    NnueErr, Result,
    config::TrainConfig,
    data::{BatchLoader, PositionSet},
    metrics::{EpochLog, EpochMetrics, MetricAggregator, PhaseMetrics},
    network::Network,
};

/// Drives the epochs of a training run.
///
/// Each epoch trains over the whole training set in a (possibly shuffled) order, then measures
/// the whole test set in a fixed order without touching the parameters.
pub struct TrainLoop {
    config: TrainConfig,
    loader: BatchLoader,
    rng: StdRng,
}

impl TrainLoop {
    /// Creates a new `TrainLoop`.
    ///
    /// # Returns
    /// An error if the configuration is invalid or the loader pool can't be built.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;

        let device = config.device.resolve();
        debug!("training on {device:?}");

        let loader = BatchLoader::new(
            config.encoder()?,
            config.batch_size,
            config.prefetch,
            config.workers,
        )?;

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            loader,
        })
    }

    /// Runs every epoch.
    ///
    /// # Arguments
    /// * `network` - The network to train, its input must match the encoder's width.
    /// * `loss_fn` - The objective.
    /// * `optimizer` - Updates the parameters after every training batch.
    /// * `train` - The training positions.
    /// * `test` - The held out positions.
    /// * `log` - Where a line is appended after each epoch, if any.
    ///
    /// # Returns
    /// The metrics of every epoch, or the first error, which aborts the run.
    pub fn run<L, O>(
        &mut self,
        network: &mut Network,
        loss_fn: &L,
        optimizer: &mut O,
        train: &PositionSet,
        test: &PositionSet,
        mut log: Option<&mut EpochLog>,
    ) -> Result<Vec<EpochMetrics>>
    where
        L: LossFn + ?Sized,
        O: Optimizer + ?Sized,
    {
        let width = self.loader.encoder().width();
        if network.topology().input != width {
            return Err(NnueErr::LengthMismatch {
                what: "network input",
                got: network.topology().input,
                expected: width,
            });
        }

        let epochs = self.config.epochs;
        let mut history = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            let start = Instant::now();

            let train_metrics = self.train_phase(network, loss_fn, optimizer, train)?;
            let test_metrics = self.test_phase(network, loss_fn, test)?;

            let metrics = EpochMetrics {
                epoch,
                train: train_metrics,
                test: test_metrics,
                elapsed: start.elapsed(),
            };

            if let Some(log) = log.as_deref_mut() {
                log.append(&metrics)?;
            }

            info!(
                "epoch {}/{epochs}: train loss {:.6} acc {:.4}, test loss {:.6} acc {:.4} ({:.2?})",
                epoch + 1,
                metrics.train.average_loss,
                metrics.train.accuracy,
                metrics.test.average_loss,
                metrics.test.accuracy,
                metrics.elapsed,
            );

            history.push(metrics);
        }

        Ok(history)
    }

    fn train_phase<L, O>(
        &mut self,
        network: &mut Network,
        loss_fn: &L,
        optimizer: &mut O,
        set: &PositionSet,
    ) -> Result<PhaseMetrics>
    where
        L: LossFn + ?Sized,
        O: Optimizer + ?Sized,
    {
        let mut order: Vec<usize> = (0..set.len()).collect();
        if self.config.shuffle {
            order.shuffle(&mut self.rng);
        }

        let mut agg = MetricAggregator::new();

        self.loader.for_each(set, &order, |batch| {
            let (loss, y_pred) =
                network.train_batch(batch.x.view(), batch.y.view(), loss_fn, optimizer)?;
            agg.record(loss, y_pred.view(), &batch.labels);
            Ok(())
        })?;

        Ok(agg.finish(self.config.batch_size, set.len()))
    }

    fn test_phase<L>(
        &self,
        network: &mut Network,
        loss_fn: &L,
        set: &PositionSet,
    ) -> Result<PhaseMetrics>
    where
        L: LossFn + ?Sized,
    {
        let order: Vec<usize> = (0..set.len()).collect();
        let mut agg = MetricAggregator::new();

        self.loader.for_each(set, &order, |batch| {
            let y_pred = network.predict(batch.x.view())?;
            let loss = loss_fn.loss(y_pred.view(), batch.y.view());
            agg.record(loss, y_pred.view(), &batch.labels);
            Ok(())
        })?;

        Ok(agg.finish(self.config.batch_size, set.len()))
    }
}
