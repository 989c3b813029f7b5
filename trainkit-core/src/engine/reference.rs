//! Single-process reference engine.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::checkpoint::Checkpoint;
use super::components::{ComponentBundle, ComponentFactories, ComponentSlot};
use super::store::{CheckpointStore, InMemoryCheckpointStore};
use super::{Device, Engine, EngineState, Model, Optimizer};
use crate::error::EngineError;

/// Engine for a single process on the CPU.
///
/// Rank is always `-1` and world size always `1`; device and tensor sync are
/// identity. Checkpoints go to the injected store.
#[derive(Debug)]
pub struct ReferenceEngine {
    store: Arc<dyn CheckpointStore>,
    state: EngineState,
}

impl ReferenceEngine {
    /// Reference engine backed by an in-memory checkpoint store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryCheckpointStore::new()))
    }

    pub fn with_store(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            state: EngineState::Uninitialized,
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ReferenceEngine {
    fn rank(&self) -> i64 {
        -1
    }

    fn world_size(&self) -> usize {
        1
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn sync_device<T>(&self, value: T) -> T {
        value
    }

    fn sync_tensor<T>(&self, value: T) -> Result<T, EngineError> {
        Ok(value)
    }

    fn init_components<M, C, O, S>(
        &mut self,
        factories: ComponentFactories<'_, M, C, O, S>,
    ) -> Result<ComponentBundle<M, C, O, S>, EngineError> {
        if self.state == EngineState::Deinitialized {
            return Err(EngineError::InvalidState {
                operation: "init_components",
                state: self.state,
            });
        }

        let provided: Vec<&str> = ComponentSlot::ALL
            .iter()
            .filter(|slot| factories.provides(**slot))
            .map(|slot| slot.key())
            .collect();
        tracing::debug!(?provided, "Initializing components");

        let bundle = factories.construct()?;
        self.state = EngineState::Initialized;
        tracing::info!(device = %self.device(), "Components initialized");
        Ok(bundle)
    }

    fn deinit_components(&mut self) -> Result<(), EngineError> {
        if self.state == EngineState::Deinitialized {
            tracing::warn!("deinit_components called on an already deinitialized engine");
            return Ok(());
        }
        self.state = EngineState::Deinitialized;
        tracing::info!("Components deinitialized");
        Ok(())
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
        Checkpoint::pack(bundle, extra)
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
        checkpoint.unpack_into(bundle)
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint, path: &str) -> Result<(), EngineError> {
        let blob = checkpoint.to_bytes()?;
        self.store.put(path, &blob)?;
        tracing::info!(path, size_bytes = blob.len(), "Checkpoint saved");
        Ok(())
    }

    fn load_checkpoint(&self, path: &str) -> Result<Checkpoint, EngineError> {
        let blob = self.store.get(path)?;
        let checkpoint = Checkpoint::from_bytes(&blob)?;
        tracing::info!(path, keys = checkpoint.len(), "Checkpoint loaded");
        Ok(checkpoint)
    }

    fn zero_grad<M: Model, O>(&self, model: &mut M, _optimizer: &mut O) {
        model.zero_grad();
    }

    fn optimizer_step<M, O: Optimizer<M>>(&self, model: &mut M, optimizer: &mut O) {
        optimizer.step(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionContext;
    use serde_json::json;

    struct Weights {
        value: f64,
        grad: f64,
    }

    impl Model for Weights {
        fn zero_grad(&mut self) {
            self.grad = 0.0;
        }
    }

    struct Sgd {
        lr: f64,
    }

    impl Optimizer<Weights> for Sgd {
        fn step(&mut self, model: &mut Weights) {
            model.value -= self.lr * model.grad;
        }
    }

    #[test]
    fn test_topology_is_constant() {
        let mut engine = ReferenceEngine::new();
        assert_eq!(engine.rank(), -1);
        assert_eq!(engine.world_size(), 1);
        engine
            .init_components(ComponentFactories::<u8, u8, u8, u8>::new())
            .unwrap();
        engine.deinit_components().unwrap();
        assert_eq!(engine.context(), ExecutionContext::NON_DISTRIBUTED);
    }

    #[test]
    fn test_sync_is_identity() {
        let engine = ReferenceEngine::new();
        assert_eq!(engine.sync_device(vec![1.0, 2.0]), vec![1.0, 2.0]);
        assert_eq!(engine.sync_tensor(0.25).unwrap(), 0.25);
    }

    #[test]
    fn test_optimizer_receives_model() {
        let mut engine = ReferenceEngine::new();
        let bundle = engine
            .init_components(
                ComponentFactories::<i32, i32, (Option<i32>, f64), (Option<i32>, f64)>::new()
                    .model(|| Ok(1))
                    .criterion(|| Ok(2))
                    .optimizer(|model| Ok((model.copied(), 0.02)))
                    .scheduler(|optimizer| Ok(*optimizer.unwrap())),
            )
            .unwrap();

        assert_eq!(bundle.optimizer, Some((Some(1), 0.02)));
        assert_eq!(bundle.scheduler, Some((Some(1), 0.02)));
        assert_eq!(engine.state(), EngineState::Initialized);
    }

    #[test]
    fn test_factory_error_propagates() {
        let mut engine = ReferenceEngine::new();
        let err = engine
            .init_components(
                ComponentFactories::<i32, (), (), ()>::new().model(|| Err("no weights".into())),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Construction {
                component: ComponentSlot::Model,
                ..
            }
        ));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_init_after_deinit_is_rejected() {
        let mut engine = ReferenceEngine::new();
        engine.deinit_components().unwrap();
        engine.deinit_components().unwrap();
        let err = engine
            .init_components(ComponentFactories::<u8, u8, u8, u8>::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[test]
    fn test_save_then_load_returns_equal_checkpoint() {
        let engine = ReferenceEngine::new();
        let bundle = ComponentBundle {
            model: Some("M"),
            criterion: Some("C"),
            optimizer: Some("O"),
            scheduler: Some("S"),
        };
        let ckpt = engine
            .pack_checkpoint(&bundle, [("extra_key", json!(1))])
            .unwrap();
        assert_eq!(ckpt.len(), 5);

        engine.save_checkpoint(&ckpt, "p").unwrap();
        assert_eq!(engine.load_checkpoint("p").unwrap(), ckpt);
    }

    #[test]
    fn test_load_unseen_path() {
        let engine = ReferenceEngine::new();
        assert!(matches!(
            engine.load_checkpoint("unseen"),
            Err(EngineError::CheckpointNotFound { .. })
        ));
    }

    #[test]
    fn test_unpack_writes_back_into_bundle() {
        let engine = ReferenceEngine::new();
        let saved = ComponentBundle {
            model: Some(vec![0.5, -0.5]),
            criterion: None::<String>,
            optimizer: Some(0.25_f64),
            scheduler: Some(10u32),
        };
        let ckpt = engine
            .pack_checkpoint(&saved, Vec::<(String, Value)>::new())
            .unwrap();

        let mut restored: ComponentBundle<Vec<f64>, String, f64, u32> = ComponentBundle::empty();
        engine.unpack_checkpoint(&ckpt, &mut restored).unwrap();
        assert_eq!(restored, saved);
    }

    #[test]
    fn test_zero_grad_and_step() {
        let engine = ReferenceEngine::new();
        let mut model = Weights {
            value: 1.0,
            grad: 2.0,
        };
        let mut optimizer = Sgd { lr: 0.5 };

        engine.optimizer_step(&mut model, &mut optimizer);
        assert_eq!(model.value, 0.0);
        engine.zero_grad(&mut model, &mut optimizer);
        assert_eq!(model.grad, 0.0);
    }
}
