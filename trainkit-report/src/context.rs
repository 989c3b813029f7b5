//! Where in a run a batch of metrics was produced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Granularity of a metrics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogScope {
    Batch,
    Loader,
    Epoch,
    Stage,
    Experiment,
}

impl fmt::Display for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogScope::Batch => "batch",
            LogScope::Loader => "loader",
            LogScope::Epoch => "epoch",
            LogScope::Stage => "stage",
            LogScope::Experiment => "experiment",
        };
        f.write_str(name)
    }
}

/// Step counters and identifiers accompanying a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContext {
    pub experiment_key: Option<String>,
    pub global_sample_step: u64,
    pub global_batch_step: u64,
    pub global_epoch_step: u64,
    pub stage_key: String,
    pub stage_epoch_len: u64,
    pub stage_epoch_step: u64,
    pub loader_key: Option<String>,
    pub loader_batch_len: u64,
    pub loader_batch_step: u64,
    pub loader_sample_step: u64,
}

impl Default for StepContext {
    fn default() -> Self {
        Self {
            experiment_key: None,
            global_sample_step: 0,
            global_batch_step: 0,
            global_epoch_step: 0,
            stage_key: "infer".to_string(),
            stage_epoch_len: 0,
            stage_epoch_step: 0,
            loader_key: None,
            loader_batch_len: 0,
            loader_batch_step: 0,
            loader_sample_step: 0,
        }
    }
}

impl StepContext {
    pub fn for_loader(loader_key: impl Into<String>) -> Self {
        Self {
            loader_key: Some(loader_key.into()),
            ..Self::default()
        }
    }

    pub fn with_epoch(mut self, step: u64, len: u64) -> Self {
        self.stage_epoch_step = step;
        self.stage_epoch_len = len;
        self
    }
}
