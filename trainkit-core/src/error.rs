//! Error types for the Trainkit core library.
//!
//! Uses `thiserror` for public API error types. Every error propagates to the
//! immediate caller; nothing in this crate retries.

use std::path::PathBuf;

use crate::engine::{ComponentSlot, EngineState};

/// Error type returned by component factories passed to `init_components`.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for the Trainkit core library.
#[derive(Debug, thiserror::Error)]
pub enum TrainkitError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by engines and checkpoint stores.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to construct {component}: {source}")]
    Construction {
        component: ComponentSlot,
        #[source]
        source: FactoryError,
    },

    #[error("No checkpoint saved at '{path}'")]
    CheckpointNotFound { path: String },

    #[error("Checkpoint entry '{key}' could not be (de)serialized: {message}")]
    Serialization { key: String, message: String },

    #[error("Collective mismatch: expected {expected}, got {actual}")]
    CollectiveMismatch { expected: String, actual: String },

    #[error("Cannot {operation} while engine is {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("Invalid checkpoint path '{path}'")]
    InvalidPath { path: String },

    #[error("Checkpoint '{path}' is corrupted: expected digest {expected}, found {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid execution context: rank {rank}, world size {world_size}")]
    InvalidContext { rank: i64, world_size: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn serialization(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            key: key.into(),
            message: err.to_string(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::CheckpointNotFound { path: path.into() }
    }
}

/// Errors raised while folding observations into a metric.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    #[error("Length mismatch: {predictions} predictions vs {targets} targets")]
    LengthMismatch { predictions: usize, targets: usize },

    #[error("Cannot reduce an empty batch")]
    EmptyBatch,

    #[error("Observation weight must be positive")]
    ZeroWeight,

    #[error("Metric '{metric}' does not accept {observation} observations")]
    UnsupportedObservation {
        metric: &'static str,
        observation: &'static str,
    },
}

/// Errors from loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for results across the core library.
pub type Result<T> = std::result::Result<T, TrainkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_names_component() {
        let err = EngineError::Construction {
            component: ComponentSlot::Optimizer,
            source: "bad learning rate".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("optimizer"));
        assert!(msg.contains("bad learning rate"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_not_found_message() {
        let err = EngineError::not_found("runs/best");
        assert_eq!(err.to_string(), "No checkpoint saved at 'runs/best'");
    }

    #[test]
    fn test_metric_error_converts_to_top_level() {
        let err: TrainkitError = MetricError::LengthMismatch {
            predictions: 3,
            targets: 2,
        }
        .into();
        assert!(matches!(err, TrainkitError::Metric(_)));
        assert!(err.to_string().contains("3 predictions vs 2 targets"));
    }
}
