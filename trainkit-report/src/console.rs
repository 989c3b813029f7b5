//! Metrics rendered to the tracing output.

use trainkit_core::MetricResult;

use crate::context::{LogScope, StepContext};
use crate::error::ReportError;
use crate::{MetricLogger, format_metrics};

/// Logs loader-level metrics as one human-readable line each.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    scopes: Vec<LogScope>,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            scopes: vec![LogScope::Loader],
        }
    }

    /// Report these scopes instead of loader-level only.
    pub fn with_scopes(scopes: impl IntoIterator<Item = LogScope>) -> Self {
        Self {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// The line logged for a report, or `None` when the scope is filtered out.
    pub fn render(
        &self,
        metrics: &MetricResult,
        scope: LogScope,
        context: &StepContext,
    ) -> Option<String> {
        if !self.scopes.contains(&scope) {
            return None;
        }
        let source = context
            .loader_key
            .as_deref()
            .unwrap_or(context.stage_key.as_str());
        Some(format!(
            "{source} ({}/{}) {}",
            context.stage_epoch_step,
            context.stage_epoch_len,
            format_metrics(metrics)
        ))
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_metrics(
        &mut self,
        metrics: &MetricResult,
        scope: LogScope,
        context: &StepContext,
    ) -> Result<(), ReportError> {
        if let Some(line) = self.render(metrics, scope, context) {
            tracing::info!(%scope, "{line}");
        }
        Ok(())
    }

    fn log_hparams(
        &mut self,
        hparams: &serde_json::Value,
        experiment_key: Option<&str>,
    ) -> Result<(), ReportError> {
        tracing::info!(
            experiment = experiment_key.unwrap_or("-"),
            "Hparams: {hparams}"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ReportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}
