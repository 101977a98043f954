//! Object scopes — named instance-retention policies.
//!
//! A scope describes *how long* the instances of a registration live:
//! - [`ObjectScope::transient`] — never shared, a fresh instance per resolution
//! - [`ObjectScope::graph`] — shared within one object graph (the default)
//! - [`ObjectScope::container`] — shared for the life of the container, until reset
//! - [`ObjectScope::weak`] — shared while some caller keeps the instance alive
//!
//! A scope is a value shared by many registrations; each registration gets
//! its own private [`InstanceStorage`] from [`ObjectScope::make_storage`].
//! Custom scopes can compose with a parent scope, stacking the child policy
//! on top of the parent's.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::storage::{
    CompositeStorage, GraphStorage, InstanceStorage, PermanentStorage, TransientStorage,
    WeakStorage,
};

type StorageFactory = dyn Fn() -> Box<dyn InstanceStorage> + Send + Sync;

/// A named instance-retention policy.
///
/// Scopes are compared by identity: `reset_object_scope` clears exactly the
/// registrations whose scope is the *same* `Arc` allocation, which is why
/// the predefined scopes hand out one shared value per policy and why the
/// constructors return `Arc<ObjectScope>` directly.
pub struct ObjectScope {
    storage_factory: Box<StorageFactory>,
    description: String,
    parent: Option<Arc<ObjectScope>>,
}

impl ObjectScope {
    /// Creates a custom scope from a storage factory.
    pub fn new(
        description: impl Into<String>,
        storage_factory: impl Fn() -> Box<dyn InstanceStorage> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage_factory: Box::new(storage_factory),
            description: description.into(),
            parent: None,
        })
    }

    /// Creates a custom scope whose storage composes with `parent`'s.
    ///
    /// Lookups consult the child policy first and fall back to the parent's;
    /// writes go to both. This lets a scope add semantics (say, graph
    /// bounding) on top of an existing policy.
    pub fn with_parent(
        description: impl Into<String>,
        storage_factory: impl Fn() -> Box<dyn InstanceStorage> + Send + Sync + 'static,
        parent: &Arc<ObjectScope>,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage_factory: Box::new(storage_factory),
            description: description.into(),
            parent: Some(parent.clone()),
        })
    }

    /// Produces the private storage for one registration.
    ///
    /// Invoked once per registration (and again if the registration is
    /// moved to a different scope).
    pub fn make_storage(&self) -> Box<dyn InstanceStorage> {
        match &self.parent {
            Some(parent) => Box::new(CompositeStorage::new(vec![
                (self.storage_factory)(),
                parent.make_storage(),
            ])),
            None => (self.storage_factory)(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parent(&self) -> Option<&Arc<ObjectScope>> {
        self.parent.as_ref()
    }

    /// Never cache; every resolution runs the factory.
    pub fn transient() -> Arc<ObjectScope> {
        TRANSIENT.clone()
    }

    /// Cache within one object graph. This is the default scope.
    pub fn graph() -> Arc<ObjectScope> {
        GRAPH.clone()
    }

    /// Cache for the life of the container, until the scope is reset.
    pub fn container() -> Arc<ObjectScope> {
        CONTAINER.clone()
    }

    /// Cache while some caller keeps the produced instance alive.
    pub fn weak() -> Arc<ObjectScope> {
        WEAK.clone()
    }
}

static TRANSIENT: Lazy<Arc<ObjectScope>> =
    Lazy::new(|| ObjectScope::new("transient", || Box::new(TransientStorage)));

static GRAPH: Lazy<Arc<ObjectScope>> =
    Lazy::new(|| ObjectScope::new("graph", || Box::new(GraphStorage::default())));

static CONTAINER: Lazy<Arc<ObjectScope>> =
    Lazy::new(|| ObjectScope::new("container", || Box::new(PermanentStorage::default())));

static WEAK: Lazy<Arc<ObjectScope>> =
    Lazy::new(|| ObjectScope::new("weak", || Box::new(WeakStorage::default())));

impl fmt::Display for ObjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

impl fmt::Debug for ObjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "ObjectScope({}, parent: {})", self.description, parent),
            None => write!(f, "ObjectScope({})", self.description),
        }
    }
}
