//! CSV metric logs and hyperparameter dumps under a run directory.
//!
//! Each loader gets `<logdir>/<loader>.csv` with a `step,<metric...>` header;
//! hyperparameters go to `<logdir>/hparams.yml`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use trainkit_core::MetricResult;
use trainkit_core::persistence;

use crate::MetricLogger;
use crate::context::{LogScope, StepContext};
use crate::error::ReportError;

const HPARAMS_FILE: &str = "hparams.yml";
const STEP_COLUMN: &str = "step";

/// One open per-loader CSV file and the metric columns its header fixed.
struct LoaderLog {
    path: PathBuf,
    columns: Vec<String>,
    writer: csv::Writer<BufWriter<File>>,
}

impl LoaderLog {
    /// Open `path` for appending. A new file gets a header from `metrics`; an
    /// existing one keeps the columns of the header already on disk.
    fn open(path: PathBuf, metrics: &MetricResult) -> Result<Self, ReportError> {
        let existing = path
            .metadata()
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        let columns: Vec<String> = if existing {
            let mut reader = ReaderBuilder::new()
                .has_headers(true)
                .from_path(&path)
                .map_err(|e| ReportError::csv(&path, e))?;
            let header = reader.headers().map_err(|e| ReportError::csv(&path, e))?;
            header.iter().skip(1).map(str::to_string).collect()
        } else {
            metrics.keys().cloned().collect()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ReportError::write(&path, e))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        if !existing {
            writer
                .write_record(std::iter::once(STEP_COLUMN).chain(columns.iter().map(String::as_str)))
                .map_err(|e| ReportError::csv(&path, e))?;
        }
        tracing::debug!(path = %path.display(), columns = columns.len(), "Opened metric log");
        Ok(Self {
            path,
            columns,
            writer,
        })
    }

    fn append(
        &mut self,
        loader: &str,
        step: u64,
        metrics: &MetricResult,
    ) -> Result<(), ReportError> {
        if !metrics.keys().eq(self.columns.iter()) {
            return Err(ReportError::ColumnMismatch {
                loader: loader.to_string(),
                expected: self.columns.clone(),
                actual: metrics.keys().cloned().collect(),
            });
        }
        let row = std::iter::once(step.to_string()).chain(metrics.values().map(f64::to_string));
        self.writer
            .write_record(row)
            .map_err(|e| ReportError::csv(&self.path, e))
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.writer
            .flush()
            .map_err(|e| ReportError::write(&self.path, e))
    }
}

/// Appends epoch-level metrics to one CSV file per loader.
pub struct LogdirLogger {
    logdir: PathBuf,
    loaders: HashMap<String, LoaderLog>,
    closed: bool,
}

impl LogdirLogger {
    /// Create the log directory if needed.
    pub fn new(logdir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let logdir = logdir.into();
        std::fs::create_dir_all(&logdir).map_err(|e| ReportError::write(&logdir, e))?;
        Ok(Self {
            logdir,
            loaders: HashMap::new(),
            closed: false,
        })
    }

    pub fn logdir(&self) -> &Path {
        &self.logdir
    }

    pub fn csv_path(&self, loader_key: &str) -> PathBuf {
        self.logdir.join(format!("{loader_key}.csv"))
    }
}

impl fmt::Debug for LogdirLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogdirLogger")
            .field("logdir", &self.logdir)
            .field("loaders", &self.loaders.keys().collect::<Vec<_>>())
            .field("closed", &self.closed)
            .finish()
    }
}

impl MetricLogger for LogdirLogger {
    fn log_metrics(
        &mut self,
        metrics: &MetricResult,
        scope: LogScope,
        context: &StepContext,
    ) -> Result<(), ReportError> {
        if self.closed {
            return Err(ReportError::Closed);
        }
        if scope != LogScope::Epoch {
            return Ok(());
        }
        let loader_key = context
            .loader_key
            .as_deref()
            .ok_or(ReportError::MissingLoaderKey)?;

        let log = match self.loaders.entry(loader_key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.logdir.join(format!("{loader_key}.csv"));
                entry.insert(LoaderLog::open(path, metrics)?)
            }
        };
        log.append(loader_key, context.stage_epoch_step, metrics)
    }

    fn log_hparams(
        &mut self,
        hparams: &serde_json::Value,
        experiment_key: Option<&str>,
    ) -> Result<(), ReportError> {
        let path = self.logdir.join(HPARAMS_FILE);
        let rendered = serde_yaml::to_string(hparams)?;
        persistence::atomic_write(&path, rendered.as_bytes())
            .map_err(|e| ReportError::write(&path, e))?;
        tracing::info!(
            experiment = experiment_key.unwrap_or("-"),
            path = %path.display(),
            "Hyperparameters saved"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        self.loaders.values_mut().try_for_each(LoaderLog::flush)
    }

    fn close(&mut self) -> Result<(), ReportError> {
        self.flush()?;
        self.loaders.clear();
        self.closed = true;
        Ok(())
    }
}

impl Drop for LogdirLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to flush metric logs on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn epoch(loss: f64) -> MetricResult {
        MetricResult::from([("loss_mean".to_string(), loss), ("loss_std".to_string(), 0.5)])
    }

    #[test]
    fn test_epoch_rows_with_header() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();

        for step in 1..=2 {
            let ctx = StepContext::for_loader("train").with_epoch(step, 2);
            logger
                .log_metrics(&epoch(step as f64 / 4.0), LogScope::Epoch, &ctx)
                .unwrap();
        }
        logger.close().unwrap();

        let csv = std::fs::read_to_string(dir.path().join("train.csv")).unwrap();
        assert_eq!(csv, "step,loss_mean,loss_std\n1,0.25,0.5\n2,0.5,0.5\n");
    }

    #[test]
    fn test_labels_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        let metrics = MetricResult::from([
            ("f1,macro_mean".to_string(), 0.5),
            ("f1,macro_std".to_string(), 0.25),
        ]);
        let ctx = StepContext::for_loader("valid").with_epoch(1, 1);
        logger.log_metrics(&metrics, LogScope::Epoch, &ctx).unwrap();
        logger.close().unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join("valid.csv")).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, vec!["step", "f1,macro_mean", "f1,macro_std"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(&rows[0][1], "0.5");
    }

    #[test]
    fn test_changed_columns_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        let first = StepContext::for_loader("train").with_epoch(1, 2);
        logger.log_metrics(&epoch(1.0), LogScope::Epoch, &first).unwrap();

        let mut widened = epoch(0.5);
        widened.insert("accuracy_mean".to_string(), 0.9);
        let second = StepContext::for_loader("train").with_epoch(2, 2);
        let err = logger
            .log_metrics(&widened, LogScope::Epoch, &second)
            .unwrap_err();
        match err {
            ReportError::ColumnMismatch {
                loader,
                expected,
                actual,
            } => {
                assert_eq!(loader, "train");
                assert_eq!(expected, vec!["loss_mean", "loss_std"]);
                assert_eq!(actual, vec!["accuracy_mean", "loss_mean", "loss_std"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        logger.close().unwrap();

        let csv = std::fs::read_to_string(dir.path().join("train.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_non_epoch_scopes_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        let ctx = StepContext::for_loader("train");
        logger
            .log_metrics(&epoch(1.0), LogScope::Loader, &ctx)
            .unwrap();
        assert!(!dir.path().join("train.csv").exists());
    }

    #[test]
    fn test_epoch_without_loader_key() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        let err = logger
            .log_metrics(&epoch(1.0), LogScope::Epoch, &StepContext::default())
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingLoaderKey));
    }

    #[test]
    fn test_reopen_appends_and_checks_existing_header() {
        let dir = TempDir::new().unwrap();
        let ctx = StepContext::for_loader("valid").with_epoch(1, 1);
        {
            let mut logger = LogdirLogger::new(dir.path()).unwrap();
            logger.log_metrics(&epoch(1.0), LogScope::Epoch, &ctx).unwrap();
        }
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        logger.log_metrics(&epoch(2.0), LogScope::Epoch, &ctx).unwrap();
        logger.flush().unwrap();

        let csv = std::fs::read_to_string(dir.path().join("valid.csv")).unwrap();
        assert_eq!(csv.matches("step,").count(), 1);
        assert_eq!(csv.lines().count(), 3);

        let other = MetricResult::from([("acc_mean".to_string(), 0.5)]);
        assert!(matches!(
            logger.log_metrics(&other, LogScope::Epoch, &ctx),
            Err(ReportError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn test_closed_logger_rejects_metrics() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        logger.close().unwrap();
        let ctx = StepContext::for_loader("train");
        assert!(matches!(
            logger.log_metrics(&epoch(1.0), LogScope::Epoch, &ctx),
            Err(ReportError::Closed)
        ));
    }

    #[test]
    fn test_hparams_yaml() {
        let dir = TempDir::new().unwrap();
        let mut logger = LogdirLogger::new(dir.path()).unwrap();
        logger
            .log_hparams(&json!({"lr": 0.1, "batch_size": 8}), Some("exp-1"))
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join("hparams.yml")).unwrap();
        let parsed: serde_json::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"lr": 0.1, "batch_size": 8}));
    }
}
