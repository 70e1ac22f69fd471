use std::{
    fs::File,
    io::{self, BufWriter},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use connect4_nnue::{config::TrainConfig, validation};

#[derive(Parser)]
#[command(
    name = "connect4-nnue",
    version,
    about = "Trains and checks the position evaluation network"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Trains a network, resuming from the model file if it exists
    Train {
        model_file: PathBuf,
        train_db: PathBuf,
        test_db: PathBuf,
        /// JSON training configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Per epoch `train test` log
        #[arg(long, default_value = "train_output.log")]
        log: PathBuf,
        /// Overrides the configured epoch count
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Writes `<label>\t<score>` for every position of a database
    Eval {
        model_file: PathBuf,
        db: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output file, stdout if missing
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Checks that two score files agree on signs and ties
    Validate { left: PathBuf, right: PathBuf },
    /// Merges databases of any known layout into a canonical one
    Merge {
        output: PathBuf,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<TrainConfig> {
    match path {
        Some(path) => TrainConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(TrainConfig::default()),
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.cmd {
        Cmd::Train {
            model_file,
            train_db,
            test_db,
            config,
            log,
            epochs,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(epochs) = epochs {
                config.epochs = epochs;
            }

            let history = connect4_nnue::train(&model_file, &train_db, &test_db, config, &log)
                .context("training failed")?;

            if let Some(last) = history.last() {
                info!(
                    "done, final test loss {:.6} acc {:.4}",
                    last.test.average_loss, last.test.accuracy
                );
            }
        }
        Cmd::Eval {
            model_file,
            db,
            config,
            out,
        } => {
            let config = load_config(config.as_deref())?;
            let (positions, scores) = connect4_nnue::evaluate(&model_file, &db, &config)
                .context("evaluation failed")?;

            match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    validation::write_scores(BufWriter::new(file), positions.labels(), &scores)?;
                }
                None => {
                    validation::write_scores(io::stdout().lock(), positions.labels(), &scores)?
                }
            }
        }
        Cmd::Validate { left, right } => {
            let report = validation::validate_files(&left, &right)?;

            for m in &report.mismatches {
                error!(
                    "line {}: {} has {}, {} has {}",
                    m.line,
                    report.left.display(),
                    m.left,
                    report.right.display(),
                    m.right
                );
            }

            if report.unpaired > 0 {
                error!("the files differ by {} lines", report.unpaired);
            }

            if !report.is_ok() {
                return Ok(false);
            }

            println!("OK");
        }
        Cmd::Merge { output, inputs } => {
            let written = connect4_nnue::merge(&output, &inputs)?;
            info!("merged {} databases into {}", inputs.len(), output.display());
            println!("{written}");
        }
    }

    Ok(true)
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
