use std::{fs, num::NonZeroUsize, path::Path, thread};

use log::warn;
use machine_learning::specs::{LossFnSpec, OptimizerSpec};
use serde::{Deserialize, Serialize};

use crate::{NnueErr, Result, data::BOARD_CELLS, features::FeatureEncoder};

/// How the cells of a mask are laid out inside its feature segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOrder {
    /// The mask is read as 8 big-endian bytes, each unpacked most significant bit first, and the
    /// last `board_cells` bits are kept: cell `c` lands at index `board_cells - 1 - c`.
    #[default]
    BigEndian,
    /// Cell `c` lands at index `c`.
    LsbFirst,
}

/// Where the network runs. It never changes the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Accelerator,
}

impl Device {
    /// Returns the device that will actually be used.
    ///
    /// This build only computes on the cpu, asking for an accelerator falls back to it.
    pub fn resolve(self) -> Self {
        if self == Self::Accelerator {
            warn!("no accelerator available, falling back to cpu");
        }

        Self::Cpu
    }
}

/// The per epoch value written to the training log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMetric {
    #[default]
    Loss,
    Accuracy,
}

/// Every knob of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Widths of the hidden layers, the output layer always has a single unit.
    pub hidden: Vec<usize>,
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    /// Seeds both the parameter initialization and the shuffling.
    pub seed: u64,
    pub shuffle: bool,
    /// Threads of the batch encoding pool.
    pub workers: usize,
    /// Batches encoded ahead in each window.
    pub prefetch: usize,
    pub board_cells: u32,
    pub cell_order: CellOrder,
    pub log_metric: LogMetric,
    pub device: Device,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 64,
            hidden: vec![16, 8],
            optimizer: OptimizerSpec::adam(1e-4),
            loss: LossFnSpec::Mse,
            seed: 0,
            shuffle: true,
            workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            prefetch: 8,
            board_cells: BOARD_CELLS,
            cell_order: CellOrder::BigEndian,
            log_metric: LogMetric::Loss,
            device: Device::Cpu,
        }
    }
}

impl TrainConfig {
    /// Reads a configuration from a JSON file, missing fields take their default value.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration before any work is done.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(NnueErr::InvalidConfig(msg.to_string()));

        if self.batch_size == 0 {
            return invalid("batch_size must be > 0");
        }

        if self.workers == 0 {
            return invalid("workers must be > 0");
        }

        if self.prefetch == 0 {
            return invalid("prefetch must be > 0");
        }

        if !(1..=64).contains(&self.board_cells) {
            return invalid("board_cells must be in 1..=64");
        }

        if self.hidden.contains(&0) {
            return invalid("hidden layers must have at least one unit");
        }

        let lr = self.optimizer.learning_rate();
        if !lr.is_finite() || lr <= 0. {
            return invalid("the learning rate must be a positive number");
        }

        Ok(())
    }

    /// Returns the feature encoder described by this configuration.
    pub fn encoder(&self) -> Result<FeatureEncoder> {
        FeatureEncoder::new(self.board_cells, self.cell_order)
    }
}
