//! Checkpoint contents: fixed component keys plus caller extensions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::components::{ComponentBundle, ComponentSlot};
use super::finite::ensure_finite;
use crate::error::EngineError;

/// A snapshot of component state keyed by name.
///
/// Always carries `model`, `criterion`, `optimizer` and `scheduler` once
/// packed (empty slots are stored as `null`), plus any extension keys.
/// Keys iterate in insertion order: the four fixed keys first, then
/// extensions in the order given.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(Map<String, Value>);

impl Checkpoint {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a checkpoint from a bundle, then merge `extra` on top.
    ///
    /// An extension key equal to a fixed key replaces the packed component
    /// and keeps its position. Components holding NaN or infinite floats are
    /// rejected with [`EngineError::Serialization`].
    pub fn pack<M, C, O, S, K>(
        bundle: &ComponentBundle<M, C, O, S>,
        extra: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Self, EngineError>
    where
        M: Serialize,
        C: Serialize,
        O: Serialize,
        S: Serialize,
        K: Into<String>,
    {
        let mut checkpoint = Self::new();
        checkpoint.insert_component(ComponentSlot::Model, &bundle.model)?;
        checkpoint.insert_component(ComponentSlot::Criterion, &bundle.criterion)?;
        checkpoint.insert_component(ComponentSlot::Optimizer, &bundle.optimizer)?;
        checkpoint.insert_component(ComponentSlot::Scheduler, &bundle.scheduler)?;
        for (key, value) in extra {
            checkpoint.insert(key, value);
        }
        Ok(checkpoint)
    }

    /// Restore every fixed slot of `bundle` from this checkpoint.
    ///
    /// All four entries are decoded before any slot is written, so a failure
    /// leaves the bundle untouched. A `null` entry empties its slot.
    pub fn unpack_into<M, C, O, S>(
        &self,
        bundle: &mut ComponentBundle<M, C, O, S>,
    ) -> Result<(), EngineError>
    where
        M: DeserializeOwned,
        C: DeserializeOwned,
        O: DeserializeOwned,
        S: DeserializeOwned,
    {
        let model = self.component(ComponentSlot::Model)?;
        let criterion = self.component(ComponentSlot::Criterion)?;
        let optimizer = self.component(ComponentSlot::Optimizer)?;
        let scheduler = self.component(ComponentSlot::Scheduler)?;

        bundle.model = model;
        bundle.criterion = criterion;
        bundle.optimizer = optimizer;
        bundle.scheduler = scheduler;
        Ok(())
    }

    /// Decode a single fixed slot.
    pub fn component<T: DeserializeOwned>(
        &self,
        slot: ComponentSlot,
    ) -> Result<Option<T>, EngineError> {
        let value = self
            .0
            .get(slot.key())
            .ok_or_else(|| EngineError::serialization(slot.key(), "missing fixed key"))?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| EngineError::serialization(slot.key(), e))
    }

    fn insert_component<T: Serialize>(
        &mut self,
        slot: ComponentSlot,
        component: &Option<T>,
    ) -> Result<(), EngineError> {
        ensure_finite(component).map_err(|e| EngineError::serialization(slot.key(), e))?;
        let value =
            serde_json::to_value(component).map_err(|e| EngineError::serialization(slot.key(), e))?;
        self.0.insert(slot.key().to_string(), value);
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Keys that are not one of the four fixed slots.
    pub fn extension_keys(&self) -> impl Iterator<Item = &str> {
        self.keys()
            .filter(|k| !ComponentSlot::ALL.iter().any(|slot| slot.key() == *k))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as a JSON blob for a checkpoint store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(self).map_err(|e| EngineError::serialization("<checkpoint>", e))
    }

    /// Decode a blob written by [`Checkpoint::to_bytes`].
    pub fn from_bytes(blob: &[u8]) -> Result<Self, EngineError> {
        serde_json::from_slice(blob).map_err(|e| EngineError::serialization("<checkpoint>", e))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Checkpoint {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
