//! Weighted running mean and standard deviation (Welford's method).

use crate::error::MetricError;

/// Online accumulator of weighted scalar observations.
///
/// Each update costs O(1) time and memory regardless of how many
/// observations came before. The variance uses Bessel's correction over the
/// cumulative weight.
#[derive(Debug, Clone)]
pub struct RunningStats {
    n: u64,
    num_samples: u64,
    last_value: f64,
    mean: f64,
    mean_old: f64,
    m_s: f64,
    std: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            n: 0,
            num_samples: 0,
            last_value: f64::NAN,
            mean: f64::NAN,
            mean_old: 0.0,
            m_s: 0.0,
            std: f64::NAN,
        }
    }

    /// Back to the just-constructed state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Fold in `value`, which stands for `weight` underlying elements.
    pub fn update(&mut self, value: f64, weight: u64) -> Result<(), MetricError> {
        if weight == 0 {
            return Err(MetricError::ZeroWeight);
        }

        self.last_value = value;
        self.n += 1;
        self.num_samples += weight;

        if self.n == 1 {
            self.mean = value;
            self.std = 0.0;
            self.mean_old = self.mean;
            self.m_s = 0.0;
        } else {
            let weight = weight as f64;
            let total = self.num_samples as f64;
            self.mean = self.mean_old + (value - self.mean_old) * weight / total;
            self.m_s += (value - self.mean_old) * (value - self.mean) * weight;
            self.mean_old = self.mean;
            self.std = (self.m_s / (total - 1.0)).sqrt();
        }
        Ok(())
    }

    /// `(mean, std)`; both NaN before the first update.
    pub fn compute(&self) -> (f64, f64) {
        (self.mean, self.std)
    }

    /// Number of updates folded in.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Cumulative weight of all updates.
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }

    /// Value passed to the most recent update; NaN before the first.
    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}
