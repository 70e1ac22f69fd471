pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod metrics;
pub mod network;
pub mod training;
pub mod validation;

use std::path::Path;

use log::info;

pub use error::{NnueErr, Result};

use crate::{
    checkpoint::CheckpointStore,
    config::TrainConfig,
    data::{PositionSet, sqlite},
    evaluation::{Evaluator, NetworkEvaluator},
    metrics::{EpochLog, EpochMetrics},
    training::TrainLoop,
};

/// Trains a network and writes it back to `model_file`.
///
/// The checkpoint is loaded if it exists and freshly initialized otherwise. Both databases are
/// checked before anything else happens.
///
/// # Arguments
/// * `model_file` - The checkpoint to resume from and to write.
/// * `train_db` - The training positions.
/// * `test_db` - The held out positions.
/// * `config` - The run's configuration.
/// * `log_file` - The training log, truncated at start.
///
/// # Returns
/// The metrics of every epoch.
pub fn train(
    model_file: &Path,
    train_db: &Path,
    test_db: &Path,
    config: TrainConfig,
    log_file: &Path,
) -> Result<Vec<EpochMetrics>> {
    for db in [train_db, test_db] {
        if !db.is_file() {
            return Err(NnueErr::MissingDatabase(db.to_path_buf()));
        }
    }

    config.validate()?;

    let train = sqlite::load(train_db)?;
    let test = sqlite::load(test_db)?;

    let store = CheckpointStore::new(model_file);
    let mut checkpoint = store.load(&config)?;

    let width = config.encoder()?.width();
    if checkpoint.network.topology().input != width {
        return Err(NnueErr::Checkpoint {
            path: model_file.to_path_buf(),
            reason: format!(
                "the network takes {} inputs but positions encode to {width}",
                checkpoint.network.topology().input
            ),
        });
    }

    info!(
        "training {:?} from a {:?} checkpoint for {} epochs",
        checkpoint.network.topology(),
        checkpoint.origin,
        config.epochs
    );

    let mut log = EpochLog::create(log_file, config.log_metric)?;
    let mut train_loop = TrainLoop::new(config)?;

    let history = train_loop.run(
        &mut checkpoint.network,
        &*checkpoint.loss,
        &mut *checkpoint.optimizer,
        &train,
        &test,
        Some(&mut log),
    )?;

    store.save(
        &checkpoint.network,
        Some(&*checkpoint.optimizer),
        Some(&*checkpoint.loss),
    )?;

    Ok(history)
}

/// Scores every position of a database with a trained network.
///
/// # Returns
/// The positions alongside their scores, or a `Checkpoint` error if `model_file` doesn't exist.
pub fn evaluate(
    model_file: &Path,
    db: &Path,
    config: &TrainConfig,
) -> Result<(PositionSet, Vec<i64>)> {
    if !model_file.exists() {
        return Err(NnueErr::Checkpoint {
            path: model_file.to_path_buf(),
            reason: "no such file".into(),
        });
    }

    let positions = sqlite::load(db)?;
    let checkpoint = CheckpointStore::new(model_file).load(config)?;

    let mut evaluator =
        NetworkEvaluator::new(checkpoint.network, config.encoder()?, config.batch_size)?;
    let scores = evaluator.evaluate(&positions)?;

    Ok((positions, scores))
}

/// Normalizes any number of databases into a single canonical one.
///
/// # Returns
/// The amount of positions written.
pub fn merge(output: &Path, inputs: &[impl AsRef<Path>]) -> Result<usize> {
    let sets = inputs
        .iter()
        .map(|input| sqlite::load(input.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    sqlite::write_canonical(output, &sets)
}
