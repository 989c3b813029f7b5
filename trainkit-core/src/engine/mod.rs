//! Execution engines: the layer between a training loop and the hardware,
//! process topology, and checkpoint storage it runs on.
//!
//! A loop written against [`Engine`] does not change when the engine is
//! swapped for a multi-device or mixed-precision variant. Engines are chosen at
//! construction time through [`build_engine`]; [`AnyEngine`] dispatches to the
//! selected variant.

pub mod checkpoint;
pub mod components;
mod finite;
pub mod reference;
pub mod store;

pub use checkpoint::Checkpoint;
pub use components::{ComponentBundle, ComponentFactories, ComponentSlot};
pub use reference::ReferenceEngine;
pub use store::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, ManifestEntry};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::{EngineConfig, EngineKind};
use crate::error::EngineError;

/// Process topology of an engine.
///
/// Deserialization goes through [`ExecutionContext::new`], so a decoded
/// context satisfies the same rank/world-size rules as a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawExecutionContext")]
pub struct ExecutionContext {
    /// Zero-based process rank, or `-1` outside distributed execution.
    pub rank: i64,
    pub world_size: usize,
}

#[derive(Deserialize)]
struct RawExecutionContext {
    rank: i64,
    world_size: usize,
}

impl TryFrom<RawExecutionContext> for ExecutionContext {
    type Error = EngineError;

    fn try_from(raw: RawExecutionContext) -> Result<Self, EngineError> {
        Self::new(raw.rank, raw.world_size)
    }
}

impl ExecutionContext {
    /// Context of a single process running outside any process group.
    pub const NON_DISTRIBUTED: Self = Self {
        rank: -1,
        world_size: 1,
    };

    pub fn new(rank: i64, world_size: usize) -> Result<Self, EngineError> {
        let valid = match rank {
            -1 => world_size == 1,
            r if r >= 0 => world_size >= 1 && (r as usize) < world_size,
            _ => false,
        };
        if !valid {
            return Err(EngineError::InvalidContext { rank, world_size });
        }
        Ok(Self { rank, world_size })
    }

    pub fn is_distributed(&self) -> bool {
        self.rank >= 0
    }

    /// Whether this process should perform once-per-run side effects such as
    /// writing checkpoints or reports.
    pub fn is_main_process(&self) -> bool {
        self.rank <= 0
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::NON_DISTRIBUTED
    }
}

/// Device an engine places tensors and modules on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

/// Lifecycle of an engine's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Uninitialized,
    Initialized,
    /// Terminal.
    Deinitialized,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => f.write_str("uninitialized"),
            EngineState::Initialized => f.write_str("initialized"),
            EngineState::Deinitialized => f.write_str("deinitialized"),
        }
    }
}

/// A model whose accumulated gradients can be cleared.
pub trait Model {
    fn zero_grad(&mut self);
}

/// An optimizer that updates a model from its accumulated gradients.
pub trait Optimizer<M: ?Sized> {
    fn step(&mut self, model: &mut M);
}

/// Contract between a training loop and its execution environment.
///
/// Engines are driven from a single thread; callers serialize access.
/// `sync_tensor` is a collective: in a process group every rank must call it
/// the same number of times, in the same order, with matching shapes.
pub trait Engine {
    /// Process rank, `-1` when not distributed.
    fn rank(&self) -> i64;

    /// Number of cooperating processes, at least 1.
    fn world_size(&self) -> usize;

    fn device(&self) -> Device;

    fn state(&self) -> EngineState;

    fn context(&self) -> ExecutionContext {
        ExecutionContext {
            rank: self.rank(),
            world_size: self.world_size(),
        }
    }

    /// Move a tensor or module onto this engine's device.
    fn sync_device<T>(&self, value: T) -> T;

    /// Reduce `value` across the process group so every rank observes the
    /// same result.
    fn sync_tensor<T>(&self, value: T) -> Result<T, EngineError>;

    /// Build components in the order model, criterion, optimizer, scheduler.
    fn init_components<M, C, O, S>(
        &mut self,
        factories: ComponentFactories<'_, M, C, O, S>,
    ) -> Result<ComponentBundle<M, C, O, S>, EngineError>;

    /// Release topology-scoped resources. Terminal.
    fn deinit_components(&mut self) -> Result<(), EngineError>;

    fn pack_checkpoint<M, C, O, S, K>(
        &self,
        bundle: &ComponentBundle<M, C, O, S>,
        extra: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Checkpoint, EngineError>
    where
        M: Serialize,
        C: Serialize,
        O: Serialize,
        S: Serialize,
        K: Into<String>;

    fn unpack_checkpoint<M, C, O, S>(
        &self,
        checkpoint: &Checkpoint,
        bundle: &mut ComponentBundle<M, C, O, S>,
    ) -> Result<(), EngineError>
    where
        M: DeserializeOwned,
        C: DeserializeOwned,
        O: DeserializeOwned,
        S: DeserializeOwned;

    fn save_checkpoint(&self, checkpoint: &Checkpoint, path: &str) -> Result<(), EngineError>;

    fn load_checkpoint(&self, path: &str) -> Result<Checkpoint, EngineError>;

    fn zero_grad<M: Model, O>(&self, model: &mut M, optimizer: &mut O);

    fn optimizer_step<M, O: Optimizer<M>>(&self, model: &mut M, optimizer: &mut O);
}

/// Engine selected from configuration.
#[derive(Debug)]
pub enum AnyEngine {
    Reference(ReferenceEngine),
}

/// Construct the engine named by `config` on top of `store`.
pub fn build_engine(config: &EngineConfig, store: Arc<dyn CheckpointStore>) -> AnyEngine {
    match config.kind {
        EngineKind::Reference => {
            if config.device != Device::Cpu {
                tracing::warn!(
                    device = %config.device,
                    "Reference engine runs on cpu; ignoring configured device"
                );
            }
            AnyEngine::Reference(ReferenceEngine::with_store(store))
        }
    }
}

impl Engine for AnyEngine {
    fn rank(&self) -> i64 {
        match self {
            AnyEngine::Reference(e) => e.rank(),
        }
    }

    fn world_size(&self) -> usize {
        match self {
            AnyEngine::Reference(e) => e.world_size(),
        }
    }

    fn device(&self) -> Device {
        match self {
            AnyEngine::Reference(e) => e.device(),
        }
    }

    fn state(&self) -> EngineState {
        match self {
            AnyEngine::Reference(e) => e.state(),
        }
    }

    fn sync_device<T>(&self, value: T) -> T {
        match self {
            AnyEngine::Reference(e) => e.sync_device(value),
        }
    }

    fn sync_tensor<T>(&self, value: T) -> Result<T, EngineError> {
        match self {
            AnyEngine::Reference(e) => e.sync_tensor(value),
        }
    }

    fn init_components<M, C, O, S>(
        &mut self,
        factories: ComponentFactories<'_, M, C, O, S>,
    ) -> Result<ComponentBundle<M, C, O, S>, EngineError> {
        match self {
            AnyEngine::Reference(e) => e.init_components(factories),
        }
    }

    fn deinit_components(&mut self) -> Result<(), EngineError> {
        match self {
            AnyEngine::Reference(e) => e.deinit_components(),
        }
    }

    fn pack_checkpoint<M, C, O, S, K>(
        &self,
        bundle: &ComponentBundle<M, C, O, S>,
        extra: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Checkpoint, EngineError>
    where
        M: Serialize,
        C: Serialize,
        O: Serialize,
        S: Serialize,
        K: Into<String>,
    {
        match self {
            AnyEngine::Reference(e) => e.pack_checkpoint(bundle, extra),
        }
    }

    fn unpack_checkpoint<M, C, O, S>(
        &self,
        checkpoint: &Checkpoint,
        bundle: &mut ComponentBundle<M, C, O, S>,
    ) -> Result<(), EngineError>
    where
        M: DeserializeOwned,
        C: DeserializeOwned,
        O: DeserializeOwned,
        S: DeserializeOwned,
    {
        match self {
            AnyEngine::Reference(e) => e.unpack_checkpoint(checkpoint, bundle),
        }
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint, path: &str) -> Result<(), EngineError> {
        match self {
            AnyEngine::Reference(e) => e.save_checkpoint(checkpoint, path),
        }
    }

    fn load_checkpoint(&self, path: &str) -> Result<Checkpoint, EngineError> {
        match self {
            AnyEngine::Reference(e) => e.load_checkpoint(path),
        }
    }

    fn zero_grad<M: Model, O>(&self, model: &mut M, optimizer: &mut O) {
        match self {
            AnyEngine::Reference(e) => e.zero_grad(model, optimizer),
        }
    }

    fn optimizer_step<M, O: Optimizer<M>>(&self, model: &mut M, optimizer: &mut O) {
        match self {
            AnyEngine::Reference(e) => e.optimizer_step(model, optimizer),
        }
    }
}
