//! Service entries — one registered construction recipe.
//!
//! A [`ServiceEntry`] is created by `Container::register*` and stored under
//! its [`ServiceKey`]. The factory and the completion callback are held
//! type-erased; the resolution call site, which statically knows the
//! service and argument shapes behind the key it looked up, recovers them.
//!
//! [`Registration`] is the typed handle `register` returns for chained
//! configuration of the freshly created entry.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::container::{Container, WeakContainer};
use crate::graph::GraphIdentifier;
use crate::key::ServiceKey;
use crate::scope::ObjectScope;
use crate::storage::{InstanceStorage, SharedInstance};

/// Concrete factory shape stored (erased) inside an entry.
pub(crate) type FactoryFn<S, A> = Arc<dyn Fn(&Container, A) -> S + Send + Sync>;

/// Callback run right after a produced instance has been cached.
pub type CompletionCallback<S> = Arc<dyn Fn(&Container, &Arc<S>) + Send + Sync>;

type ErasedFactory = Box<dyn Any + Send + Sync>;
type ErasedCallback = Box<dyn Any + Send + Sync>;

/// One registration: identity, factory, retention policy and cache slot.
pub struct ServiceEntry {
    key: ServiceKey,
    factory: ErasedFactory,
    scope: Mutex<Arc<ObjectScope>>,
    storage: Mutex<Box<dyn InstanceStorage>>,
    completed: Mutex<Option<ErasedCallback>>,
    owner: Mutex<Option<WeakContainer>>,
}

impl ServiceEntry {
    pub(crate) fn new<S, A>(key: ServiceKey, factory: FactoryFn<S, A>, scope: Arc<ObjectScope>) -> Self
    where
        S: Send + Sync + 'static,
        A: 'static,
    {
        Self {
            key,
            factory: Box::new(factory),
            storage: Mutex::new(scope.make_storage()),
            scope: Mutex::new(scope),
            completed: Mutex::new(None),
            owner: Mutex::new(None),
        }
    }

    /// The key this entry is registered under.
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The retention policy currently assigned to this entry.
    pub fn object_scope(&self) -> Arc<ObjectScope> {
        self.scope.lock().clone()
    }

    /// The container this entry was registered on, while it is alive.
    pub fn owner(&self) -> Option<Container> {
        self.owner.lock().as_ref().and_then(WeakContainer::upgrade)
    }

    pub(crate) fn set_owner(&self, container: &Container) {
        *self.owner.lock() = Some(container.downgrade());
    }

    /// Swapping the scope rebuilds the storage, dropping anything the old
    /// policy had cached.
    pub(crate) fn set_object_scope(&self, scope: Arc<ObjectScope>) {
        *self.storage.lock() = scope.make_storage();
        *self.scope.lock() = scope;
    }

    pub(crate) fn typed_factory<S, A>(&self) -> Option<FactoryFn<S, A>>
    where
        S: Send + Sync + 'static,
        A: 'static,
    {
        self.factory.downcast_ref::<FactoryFn<S, A>>().cloned()
    }

    pub(crate) fn cached_instance(&self, graph: GraphIdentifier) -> Option<SharedInstance> {
        self.storage.lock().instance(graph)
    }

    pub(crate) fn store_instance(&self, instance: SharedInstance, graph: GraphIdentifier) {
        self.storage.lock().set_instance(instance, graph);
    }

    pub(crate) fn graph_resolution_completed(&self) {
        self.storage.lock().graph_resolution_completed();
    }

    pub(crate) fn reset_storage(&self) {
        self.storage.lock().reset();
    }

    pub(crate) fn set_completed(&self, callback: ErasedCallback) {
        *self.completed.lock() = Some(callback);
    }

    pub(crate) fn completion_callback<S: Send + Sync + 'static>(
        &self,
    ) -> Option<CompletionCallback<S>> {
        self.completed
            .lock()
            .as_ref()
            .and_then(|callback| callback.downcast_ref::<CompletionCallback<S>>())
            .cloned()
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("key", &self.key)
            .field("scope", &self.object_scope().description())
            .finish()
    }
}

/// Typed handle returned by `register`, for chained configuration.
///
/// ```rust,ignore
/// container
///     .register::<Database>(|_| Database::connect())
///     .in_object_scope(&ObjectScope::container())
///     .init_completed(|resolver, database| { /* post-construction wiring */ });
/// ```
pub struct Registration<S> {
    entry: Arc<ServiceEntry>,
    _service: PhantomData<fn() -> S>,
}

impl<S: Send + Sync + 'static> Registration<S> {
    pub(crate) fn new(entry: Arc<ServiceEntry>) -> Self {
        Self { entry, _service: PhantomData }
    }

    /// The underlying entry.
    pub fn entry(&self) -> &Arc<ServiceEntry> {
        &self.entry
    }

    /// Overrides the retention policy for this registration.
    ///
    /// Replacing the scope discards anything the previous policy cached.
    pub fn in_object_scope(self, scope: &Arc<ObjectScope>) -> Self {
        self.entry.set_object_scope(scope.clone());
        self
    }

    /// Attaches a callback invoked right after a produced instance is
    /// cached, with the container and the instance.
    ///
    /// This is the hook for wiring mutual references: one side returns a
    /// partially initialized instance from its factory and fills the
    /// back-reference here, once both instances exist. The instance is
    /// cached before the callback runs, so a resolution performed inside
    /// the callback observes it. It is not a cycle breaker for factories
    /// that eagerly resolve each other in their bodies; those still
    /// recurse until the depth ceiling aborts.
    pub fn init_completed(self, callback: impl Fn(&Container, &Arc<S>) + Send + Sync + 'static) -> Self {
        let callback: CompletionCallback<S> = Arc::new(callback);
        self.entry.set_completed(Box::new(callback));
        self
    }
}

impl<S> fmt::Debug for Registration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("key", self.entry.key()).finish()
    }
}
