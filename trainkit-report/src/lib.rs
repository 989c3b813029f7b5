//! # Trainkit Report
//!
//! Reporting sinks for metric output and hyperparameters. An orchestrator
//! collects [`MetricResult`](trainkit_core::MetricResult) values from its
//! metrics and forwards them here together with a [`StepContext`]; engines and
//! metrics never call a logger themselves.

pub mod console;
pub mod context;
pub mod error;
pub mod logdir;

pub use console::ConsoleLogger;
pub use context::{LogScope, StepContext};
pub use error::ReportError;
pub use logdir::LogdirLogger;

use trainkit_core::MetricResult;

/// A sink for metrics and hyperparameters.
pub trait MetricLogger {
    fn log_metrics(
        &mut self,
        metrics: &MetricResult,
        scope: LogScope,
        context: &StepContext,
    ) -> Result<(), ReportError>;

    fn log_hparams(
        &mut self,
        hparams: &serde_json::Value,
        experiment_key: Option<&str>,
    ) -> Result<(), ReportError>;

    fn flush(&mut self) -> Result<(), ReportError>;

    fn close(&mut self) -> Result<(), ReportError>;
}

/// Render metrics as `key=value` pairs in key order, separated by ` | `.
pub fn format_metrics(metrics: &MetricResult) -> String {
    metrics
        .iter()
        .map(|(key, value)| format!("{key}={value:.5}"))
        .collect::<Vec<_>>()
        .join(" | ")
}
