//! Error types for reporting sinks.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Metric columns for loader '{loader}' changed: expected {expected:?}, got {actual:?}")]
    ColumnMismatch {
        loader: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Failed to serialize hyperparameters: {0}")]
    Hparams(#[from] serde_yaml::Error),

    #[error("Epoch metrics need a loader key")]
    MissingLoaderKey,

    #[error("Logger is closed")]
    Closed,
}

impl ReportError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
