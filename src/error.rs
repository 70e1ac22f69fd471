use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use machine_learning::MlErr;
use safetensors::SafeTensorError;

use crate::data::RecordErr;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, NnueErr>;

/// All errors that can occur while loading data, training or persisting a network.
#[derive(Debug)]
pub enum NnueErr {
    Io(io::Error),
    Sqlite(rusqlite::Error),
    Ml(MlErr),
    Json(serde_json::Error),
    SafeTensors(SafeTensorError),
    ThreadPool(rayon::ThreadPoolBuildError),
    /// A database given as input doesn't exist, caught before doing any work.
    MissingDatabase(PathBuf),
    /// The `positions` table doesn't match any known layout.
    UnknownSchema {
        path: PathBuf,
        columns: Vec<String>,
    },
    EmptyDataset(PathBuf),
    /// A record breaks one of the board invariants, `row` is its position in the batch or table.
    InvalidRecord {
        row: usize,
        reason: RecordErr,
    },
    /// Parallel input columns of different lengths.
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// The checkpoint exists but can't be used.
    Checkpoint {
        path: PathBuf,
        reason: String,
    },
    InvalidConfig(String),
    /// A line of a score file couldn't be parsed.
    MalformedScore {
        path: PathBuf,
        line: usize,
    },
}

impl Display for NnueErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Sqlite(e) => write!(f, "sqlite error: {e}"),
            Self::Ml(e) => write!(f, "network error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::SafeTensors(e) => write!(f, "safetensors error: {e}"),
            Self::ThreadPool(e) => write!(f, "failed to build the loader pool: {e}"),
            Self::MissingDatabase(path) => {
                write!(f, "database {} does not exist", path.display())
            }
            Self::UnknownSchema { path, columns } => write!(
                f,
                "unknown positions schema in {}: [{}]",
                path.display(),
                columns.join(", ")
            ),
            Self::EmptyDataset(path) => write!(f, "dataset {} has no positions", path.display()),
            Self::InvalidRecord { row, reason } => {
                write!(f, "invalid record at row {row}: {reason}")
            }
            Self::LengthMismatch {
                what,
                got,
                expected,
            } => write!(f, "length mismatch for {what}, got {got} and expected {expected}"),
            Self::Checkpoint { path, reason } => {
                write!(f, "unusable checkpoint {}: {reason}", path.display())
            }
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::MalformedScore { path, line } => {
                write!(f, "malformed score at {}:{line}", path.display())
            }
        }
    }
}

impl Error for NnueErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Sqlite(e) => Some(e),
            Self::Ml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::SafeTensors(e) => Some(e),
            Self::ThreadPool(e) => Some(e),
            Self::InvalidRecord { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

impl From<io::Error> for NnueErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rusqlite::Error> for NnueErr {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

impl From<MlErr> for NnueErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<serde_json::Error> for NnueErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<SafeTensorError> for NnueErr {
    fn from(e: SafeTensorError) -> Self {
        Self::SafeTensors(e)
    }
}

impl From<rayon::ThreadPoolBuildError> for NnueErr {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(e)
    }
}
