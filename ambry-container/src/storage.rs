//! Instance storage — the cache slot behind one registration.
//!
//! Each [`ServiceEntry`](crate::entry::ServiceEntry) owns exactly one
//! storage, produced by its scope's `make_storage()`. Storage is a pure
//! retention policy: it knows nothing about the container, only about the
//! erased instance it may or may not be holding and the graph it was
//! cached under.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::graph::GraphIdentifier;

/// A resolved service instance, type-erased for storage.
///
/// The concrete shape is recovered at the resolution call site, which
/// statically knows the service type behind the key it looked up.
pub type SharedInstance = Arc<dyn Any + Send + Sync>;

/// Retention policy for the instances one registration produces.
pub trait InstanceStorage: Send {
    /// Returns the instance cached for `graph`, if the policy holds one.
    fn instance(&self, graph: GraphIdentifier) -> Option<SharedInstance>;

    /// Records a freshly produced instance under `graph`.
    fn set_instance(&mut self, instance: SharedInstance, graph: GraphIdentifier);

    /// Invoked once the graph a cached instance belongs to finishes
    /// resolving. Policies release per-graph bookkeeping here.
    fn graph_resolution_completed(&mut self) {}

    /// Drops whatever the policy retains. Invoked by scope resets.
    fn reset(&mut self);
}

/// Never retains anything; every resolution invokes the factory.
pub struct TransientStorage;

impl InstanceStorage for TransientStorage {
    fn instance(&self, _graph: GraphIdentifier) -> Option<SharedInstance> {
        None
    }

    fn set_instance(&mut self, _instance: SharedInstance, _graph: GraphIdentifier) {}

    fn reset(&mut self) {}
}

/// Retains the instance for the lifetime of the owning registration,
/// until an explicit scope reset.
#[derive(Default)]
pub struct PermanentStorage {
    instance: Option<SharedInstance>,
}

impl InstanceStorage for PermanentStorage {
    fn instance(&self, _graph: GraphIdentifier) -> Option<SharedInstance> {
        self.instance.clone()
    }

    fn set_instance(&mut self, instance: SharedInstance, _graph: GraphIdentifier) {
        self.instance = Some(instance);
    }

    fn reset(&mut self) {
        self.instance = None;
    }
}

/// Retains instances per object graph.
///
/// The strong slot pins the newest instance until its graph completes.
/// The per-graph map stays weak: a re-entered graph (through a captured
/// identifier) can recover an instance its callers still hold, without
/// storage extending that instance's life on its own.
#[derive(Default)]
pub struct GraphStorage {
    instance: Option<SharedInstance>,
    instances: HashMap<GraphIdentifier, Weak<dyn Any + Send + Sync>>,
}

impl InstanceStorage for GraphStorage {
    fn instance(&self, graph: GraphIdentifier) -> Option<SharedInstance> {
        self.instances.get(&graph).and_then(Weak::upgrade)
    }

    fn set_instance(&mut self, instance: SharedInstance, graph: GraphIdentifier) {
        self.instances.insert(graph, Arc::downgrade(&instance));
        self.instance = Some(instance);
    }

    fn graph_resolution_completed(&mut self) {
        self.instance = None;
        self.instances.retain(|_, weak| weak.strong_count() > 0);
    }

    fn reset(&mut self) {
        self.instance = None;
    }
}

/// Retains the instance only while some caller keeps it alive; once the
/// last owner drops it, the next resolution recreates it.
#[derive(Default)]
pub struct WeakStorage {
    instance: Option<Weak<dyn Any + Send + Sync>>,
}

impl InstanceStorage for WeakStorage {
    fn instance(&self, _graph: GraphIdentifier) -> Option<SharedInstance> {
        self.instance.as_ref().and_then(Weak::upgrade)
    }

    fn set_instance(&mut self, instance: SharedInstance, _graph: GraphIdentifier) {
        self.instance = Some(Arc::downgrade(&instance));
    }

    fn reset(&mut self) {
        self.instance = None;
    }
}

/// Chains several storages, used when a scope composes with a parent
/// scope. Lookups take the first hit in order; writes, completions and
/// resets fan out to every component.
pub struct CompositeStorage {
    components: Vec<Box<dyn InstanceStorage>>,
}

impl CompositeStorage {
    pub fn new(components: Vec<Box<dyn InstanceStorage>>) -> Self {
        Self { components }
    }
}

impl InstanceStorage for CompositeStorage {
    fn instance(&self, graph: GraphIdentifier) -> Option<SharedInstance> {
        self.components.iter().find_map(|component| component.instance(graph))
    }

    fn set_instance(&mut self, instance: SharedInstance, graph: GraphIdentifier) {
        for component in &mut self.components {
            component.set_instance(instance.clone(), graph);
        }
    }

    fn graph_resolution_completed(&mut self) {
        for component in &mut self.components {
            component.graph_resolution_completed();
        }
    }

    fn reset(&mut self) {
        for component in &mut self.components {
            component.reset();
        }
    }
}
