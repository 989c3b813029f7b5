//! Streaming metrics: running statistics over a stream of batches.
//!
//! Every metric kind reduces one batch observation to a `(value, weight)`
//! pair and folds it into a shared [`RunningStats`] accumulator. Raw
//! observations are never retained.

pub mod accuracy;
pub mod running;

pub use accuracy::binary_accuracy;
pub use running::RunningStats;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MetricError;

/// Name to scalar view of a metric, e.g. `accuracy_mean`, `accuracy_std`.
pub type MetricResult = BTreeMap<String, f64>;

/// Running summary of a metric stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
}

/// One batch worth of input to a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation<'a> {
    /// A pre-reduced batch value standing for `weight` elements.
    Scalar { value: f64, weight: u64 },
    /// Paired predictions and targets of equal length.
    Binary {
        predictions: &'a [f64],
        targets: &'a [f64],
    },
}

impl<'a> Observation<'a> {
    pub fn scalar(value: f64, weight: u64) -> Self {
        Observation::Scalar { value, weight }
    }

    pub fn binary(predictions: &'a [f64], targets: &'a [f64]) -> Self {
        Observation::Binary {
            predictions,
            targets,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Observation::Scalar { .. } => "scalar",
            Observation::Binary { .. } => "binary",
        }
    }
}

/// The batch reduction a metric applies before accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Average of pre-reduced scalar values, e.g. a per-batch loss.
    Average,
    /// Sign-agreement accuracy between predictions and targets.
    Accuracy,
}

impl MetricKind {
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Average => "average",
            MetricKind::Accuracy => "accuracy",
        }
    }

    /// Reduce a batch observation to `(value, weight)`.
    pub fn reduce(self, observation: Observation<'_>) -> Result<(f64, u64), MetricError> {
        match (self, observation) {
            (MetricKind::Average, Observation::Scalar { value, weight }) => Ok((value, weight)),
            (
                MetricKind::Accuracy,
                Observation::Binary {
                    predictions,
                    targets,
                },
            ) => binary_accuracy(predictions, targets),
            (kind, other) => Err(MetricError::UnsupportedObservation {
                metric: kind.name(),
                observation: other.kind_name(),
            }),
        }
    }
}

/// The reset / update / compute contract shared by all metrics.
pub trait Metric {
    type Output;

    /// Restore the just-constructed state.
    fn reset(&mut self);

    /// Fold one observation into the accumulated state.
    fn update(&mut self, observation: Observation<'_>) -> Result<(), MetricError>;

    /// Summary of the accumulated state. Does not mutate.
    fn compute(&self) -> Self::Output;

    /// Named scalar view of [`Metric::compute`].
    fn compute_key_value(&self) -> MetricResult;

    fn compute_on_call(&self) -> bool;

    /// Update, then return the running summary when `compute_on_call` is set.
    fn call(&mut self, observation: Observation<'_>) -> Result<Option<Self::Output>, MetricError> {
        self.update(observation)?;
        Ok(self.compute_on_call().then(|| self.compute()))
    }
}

/// A labelled metric: a batch reduction feeding a running accumulator.
#[derive(Debug, Clone)]
pub struct StreamingMetric {
    label: String,
    kind: MetricKind,
    compute_on_call: bool,
    stats: RunningStats,
}

impl StreamingMetric {
    pub fn new(kind: MetricKind, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind,
            compute_on_call: true,
            stats: RunningStats::new(),
        }
    }

    /// Accuracy metric reporting under the `accuracy` label.
    pub fn accuracy() -> Self {
        Self::new(MetricKind::Accuracy, "accuracy")
    }

    /// Average metric reporting under `label`.
    pub fn average(label: impl Into<String>) -> Self {
        Self::new(MetricKind::Average, label)
    }

    pub fn with_compute_on_call(mut self, compute_on_call: bool) -> Self {
        self.compute_on_call = compute_on_call;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    /// Keys reported by [`Metric::compute_key_value`].
    pub fn keys(&self) -> [String; 2] {
        [format!("{}_mean", self.label), format!("{}_std", self.label)]
    }
}

impl Metric for StreamingMetric {
    type Output = MetricSummary;

    fn reset(&mut self) {
        self.stats.reset();
    }

    fn update(&mut self, observation: Observation<'_>) -> Result<(), MetricError> {
        let (value, weight) = self.kind.reduce(observation)?;
        self.stats.update(value, weight)?;
        tracing::trace!(label = %self.label, value, weight, "Metric updated");
        Ok(())
    }

    fn compute(&self) -> MetricSummary {
        let (mean, std) = self.stats.compute();
        MetricSummary { mean, std }
    }

    fn compute_key_value(&self) -> MetricResult {
        let MetricSummary { mean, std } = self.compute();
        let [mean_key, std_key] = self.keys();
        MetricResult::from([(mean_key, mean), (std_key, std)])
    }

    fn compute_on_call(&self) -> bool {
        self.compute_on_call
    }
}
