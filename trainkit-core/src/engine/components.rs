//! Component slots, bundles, and the factories that build them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, FactoryError};

/// One of the four fixed component slots an engine orchestrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSlot {
    Model,
    Criterion,
    Optimizer,
    Scheduler,
}

impl ComponentSlot {
    /// Slots in construction order.
    pub const ALL: [ComponentSlot; 4] = [
        ComponentSlot::Model,
        ComponentSlot::Criterion,
        ComponentSlot::Optimizer,
        ComponentSlot::Scheduler,
    ];

    /// Checkpoint key for this slot.
    pub fn key(self) -> &'static str {
        match self {
            ComponentSlot::Model => "model",
            ComponentSlot::Criterion => "criterion",
            ComponentSlot::Optimizer => "optimizer",
            ComponentSlot::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for ComponentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The components built by `init_components`. Any slot may be empty when its
/// factory was not supplied; the engine never looks inside the values.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentBundle<M, C, O, S> {
    pub model: Option<M>,
    pub criterion: Option<C>,
    pub optimizer: Option<O>,
    pub scheduler: Option<S>,
}

impl<M, C, O, S> ComponentBundle<M, C, O, S> {
    /// A bundle with every slot empty.
    pub fn empty() -> Self {
        Self {
            model: None,
            criterion: None,
            optimizer: None,
            scheduler: None,
        }
    }

    /// Whether the given slot holds a component.
    pub fn is_filled(&self, slot: ComponentSlot) -> bool {
        match slot {
            ComponentSlot::Model => self.model.is_some(),
            ComponentSlot::Criterion => self.criterion.is_some(),
            ComponentSlot::Optimizer => self.optimizer.is_some(),
            ComponentSlot::Scheduler => self.scheduler.is_some(),
        }
    }
}

impl<M, C, O, S> Default for ComponentBundle<M, C, O, S> {
    fn default() -> Self {
        Self::empty()
    }
}

type ModelFn<'a, M> = Box<dyn FnOnce() -> Result<M, FactoryError> + 'a>;
type CriterionFn<'a, C> = Box<dyn FnOnce() -> Result<C, FactoryError> + 'a>;
type OptimizerFn<'a, M, O> = Box<dyn FnOnce(Option<&M>) -> Result<O, FactoryError> + 'a>;
type SchedulerFn<'a, O, S> = Box<dyn FnOnce(Option<&O>) -> Result<S, FactoryError> + 'a>;

/// Factories for the four component slots.
///
/// The optimizer factory receives the freshly built model and the scheduler
/// factory receives the freshly built optimizer. An unset upstream factory
/// means the downstream factory is handed `None`.
pub struct ComponentFactories<'a, M, C, O, S> {
    model_fn: Option<ModelFn<'a, M>>,
    criterion_fn: Option<CriterionFn<'a, C>>,
    optimizer_fn: Option<OptimizerFn<'a, M, O>>,
    scheduler_fn: Option<SchedulerFn<'a, O, S>>,
}

impl<'a, M, C, O, S> ComponentFactories<'a, M, C, O, S> {
    pub fn new() -> Self {
        Self {
            model_fn: None,
            criterion_fn: None,
            optimizer_fn: None,
            scheduler_fn: None,
        }
    }

    pub fn model(mut self, f: impl FnOnce() -> Result<M, FactoryError> + 'a) -> Self {
        self.model_fn = Some(Box::new(f));
        self
    }

    pub fn criterion(mut self, f: impl FnOnce() -> Result<C, FactoryError> + 'a) -> Self {
        self.criterion_fn = Some(Box::new(f));
        self
    }

    pub fn optimizer(mut self, f: impl FnOnce(Option<&M>) -> Result<O, FactoryError> + 'a) -> Self {
        self.optimizer_fn = Some(Box::new(f));
        self
    }

    pub fn scheduler(mut self, f: impl FnOnce(Option<&O>) -> Result<S, FactoryError> + 'a) -> Self {
        self.scheduler_fn = Some(Box::new(f));
        self
    }

    /// Whether a factory was supplied for `slot`.
    pub fn provides(&self, slot: ComponentSlot) -> bool {
        match slot {
            ComponentSlot::Model => self.model_fn.is_some(),
            ComponentSlot::Criterion => self.criterion_fn.is_some(),
            ComponentSlot::Optimizer => self.optimizer_fn.is_some(),
            ComponentSlot::Scheduler => self.scheduler_fn.is_some(),
        }
    }

    /// Run the factories in order model, criterion, optimizer, scheduler.
    /// The first failure aborts construction.
    pub(crate) fn construct(self) -> Result<ComponentBundle<M, C, O, S>, EngineError> {
        let model = invoke(ComponentSlot::Model, self.model_fn.map(|f| f()))?;
        let criterion = invoke(ComponentSlot::Criterion, self.criterion_fn.map(|f| f()))?;
        let optimizer = invoke(
            ComponentSlot::Optimizer,
            self.optimizer_fn.map(|f| f(model.as_ref())),
        )?;
        let scheduler = invoke(
            ComponentSlot::Scheduler,
            self.scheduler_fn.map(|f| f(optimizer.as_ref())),
        )?;

        Ok(ComponentBundle {
            model,
            criterion,
            optimizer,
            scheduler,
        })
    }
}

impl<M, C, O, S> Default for ComponentFactories<'_, M, C, O, S> {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke<T>(
    component: ComponentSlot,
    result: Option<Result<T, FactoryError>>,
) -> Result<Option<T>, EngineError> {
    result
        .transpose()
        .map_err(|source| EngineError::Construction { component, source })
}
