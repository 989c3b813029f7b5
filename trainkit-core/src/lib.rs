//! # Trainkit Core
//!
//! Two contracts that keep a training loop independent of where and how it runs:
//!
//! - **Engines** own process topology, device placement, tensor sync,
//!   component construction, and checkpoint persistence.
//! - **Metrics** keep numerically stable running statistics over a stream of
//!   batches without retaining raw observations.
//!
//! Reporting sinks live in `trainkit-report`; an orchestrator hands
//! [`MetricResult`] values to them.

pub mod config;
pub mod engine;
pub mod error;
pub mod metric;
pub mod persistence;
pub mod telemetry;

// Re-export commonly used types at the crate root.
pub use config::{TrainkitConfig, load_config, save_config};
pub use engine::{
    AnyEngine, Checkpoint, CheckpointStore, ComponentBundle, ComponentFactories, ComponentSlot,
    Device, Engine, EngineState, ExecutionContext, FileCheckpointStore, InMemoryCheckpointStore,
    Model, Optimizer, ReferenceEngine, build_engine,
};
pub use error::{ConfigError, EngineError, FactoryError, MetricError, Result, TrainkitError};
pub use metric::{
    Metric, MetricKind, MetricResult, MetricSummary, Observation, RunningStats, StreamingMetric,
};
