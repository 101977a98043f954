//! # The Container — registrations and the resolution engine
//!
//! A [`Container`] owns a map of [`ServiceEntry`] keyed by [`ServiceKey`],
//! an optional parent forming a lookup chain, and the state of the object
//! graph currently being resolved. Registration hands the container a
//! factory; resolution walks the chain for a matching entry, runs the
//! factory for cache misses, and shares instances according to each
//! entry's object scope.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container ──┐ parent
//!                                           ▼
//!                               Container (ancestor registrations
//!                                          visible to descendants)
//! ```
//!
//! # Examples
//! ```rust
//! use ambry_container::container::Container;
//! use ambry_container::scope::ObjectScope;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str);
//! }
//!
//! struct StdoutLogger;
//! impl Logger for StdoutLogger {
//!     fn log(&self, message: &str) { println!("{message}"); }
//! }
//!
//! struct Audit {
//!     logger: Arc<Box<dyn Logger>>,
//! }
//!
//! let container = Container::new();
//! container
//!     .register::<Box<dyn Logger>>(|_| Box::new(StdoutLogger))
//!     .in_object_scope(&ObjectScope::container());
//! container.register::<Audit>(|resolver| Audit {
//!     logger: resolver.resolve().expect("logger is registered"),
//! });
//!
//! let audit = container.resolve::<Audit>().expect("audit is registered");
//! audit.logger.log("ready");
//! ```
//!
//! # Concurrency
//! Every container serializes its work through one re-entrant lock: a
//! resolution or mutation runs to completion before another thread's
//! begins, while nested resolutions on the same call stack re-enter
//! freely. A child briefly takes its ancestors' locks during lookups and
//! depth accounting; locks are only ever taken in child-to-ancestor
//! order, and the chain is a tree, so the ordering is acyclic.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, error, trace};

use crate::arguments::Arguments;
use crate::behavior::Behavior;
use crate::debug::{DebugHelper, LoggingDebugHelper};
use crate::entry::{FactoryFn, Registration, ServiceEntry};
use crate::error::{MissingRegistration, ResolutionError};
use crate::graph::GraphIdentifier;
use crate::key::{KeyOption, ServiceKey};
use crate::scope::ObjectScope;
use crate::storage::SharedInstance;
use crate::wrapper::{InstanceProducer, Lazy, Provider};

/// Hard ceiling on nested resolution depth across the container chain.
///
/// Exceeding it means factories are recursing into each other without
/// converging — almost always two registrations eagerly resolving one
/// another — and the process is aborted rather than left to recurse.
const MAX_RESOLUTION_DEPTH: usize = 200;

/// The key under which the ambient [`GraphIdentifier`] answers directly.
fn ambient_graph_key() -> ServiceKey {
    ServiceKey::new::<GraphIdentifier, ()>(None, None)
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Configures and creates a [`Container`].
///
/// ```rust,ignore
/// let child = Container::builder()
///     .parent(&root)
///     .default_object_scope(&ObjectScope::container())
///     .build();
/// ```
pub struct ContainerBuilder {
    parent: Option<Container>,
    default_scope: Arc<ObjectScope>,
    behaviors: Vec<Arc<dyn Behavior>>,
    debug_helper: Arc<dyn DebugHelper>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            parent: None,
            default_scope: ObjectScope::graph(),
            behaviors: Vec::new(),
            debug_helper: Arc::new(LoggingDebugHelper),
        }
    }

    /// Chains the new container under `parent`: lookups that miss locally
    /// fall back to the parent, while the parent never sees the child's
    /// registrations.
    pub fn parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Scope assigned to registrations that do not pick one explicitly.
    /// Defaults to [`ObjectScope::graph`].
    pub fn default_object_scope(mut self, scope: &Arc<ObjectScope>) -> Self {
        self.default_scope = scope.clone();
        self
    }

    /// Attaches a registration observer from the start.
    pub fn behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    /// Replaces the resolution-failure diagnostics hook.
    pub fn debug_helper(mut self, helper: Arc<dyn DebugHelper>) -> Self {
        self.debug_helper = helper;
        self
    }

    pub fn build(self) -> Container {
        let container = Container {
            inner: Arc::new(ContainerInner {
                state: ReentrantMutex::new(RefCell::new(ContainerState {
                    services: HashMap::new(),
                    resolution_depth: 0,
                    current_graph: None,
                    graph_in_flight: Vec::new(),
                    behaviors: self.behaviors,
                })),
                parent: self.parent,
                default_scope: self.default_scope,
                debug_helper: self.debug_helper,
            }),
        };
        debug!(has_parent = container.parent().is_some(), "container ready");
        container
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

struct ContainerState {
    services: HashMap<ServiceKey, Arc<ServiceEntry>>,
    resolution_depth: usize,
    current_graph: Option<GraphIdentifier>,
    graph_in_flight: Vec<Arc<ServiceEntry>>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

pub(crate) struct ContainerInner {
    state: ReentrantMutex<RefCell<ContainerState>>,
    parent: Option<Container>,
    default_scope: Arc<ObjectScope>,
    debug_helper: Arc<dyn DebugHelper>,
}

/// A node owning service registrations and resolution state, optionally
/// chained under a parent container.
///
/// `Container` is a cheap handle; clones share the same underlying node.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Non-owning container handle, held by entries and deferred wrappers so
/// they never extend the container's lifetime.
#[derive(Clone)]
pub(crate) struct WeakContainer(Weak<ContainerInner>);

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Option<Container> {
        self.0.upgrade().map(|inner| Container { inner })
    }
}

impl Container {
    /// Creates a root container with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// The parent this container falls back to, if any.
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Scope assigned to registrations that do not pick one explicitly.
    pub fn default_object_scope(&self) -> &Arc<ObjectScope> {
        &self.inner.default_scope
    }

    /// Whether two handles refer to the same container node.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer(Arc::downgrade(&self.inner))
    }

    fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<ContainerState>> {
        self.inner.state.lock()
    }

    // ── Registration ──

    /// Registers a factory for service type `S`.
    ///
    /// Registering under an already-taken key silently replaces the prior
    /// entry. Returns a [`Registration`] handle for chained configuration.
    pub fn register<S: Send + Sync + 'static>(
        &self,
        factory: impl Fn(&Container) -> S + Send + Sync + 'static,
    ) -> Registration<S> {
        self.register_with::<S, ()>(None, move |container, _: ()| factory(container))
    }

    /// Registers a named factory for service type `S`.
    ///
    /// Names let several registrations of one type coexist; resolution
    /// picks by name.
    pub fn register_named<S: Send + Sync + 'static>(
        &self,
        name: &str,
        factory: impl Fn(&Container) -> S + Send + Sync + 'static,
    ) -> Registration<S> {
        self.register_with::<S, ()>(Some(name), move |container, _: ()| factory(container))
    }

    /// Registers a factory taking an argument tuple in addition to the
    /// container. The argument shape becomes part of the registration key.
    pub fn register_with<S, A>(
        &self,
        name: Option<&str>,
        factory: impl Fn(&Container, A) -> S + Send + Sync + 'static,
    ) -> Registration<S>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        self.register_keyed(name, None, factory)
    }

    /// Extension point: registration with an explicit [`KeyOption`]
    /// discriminator. Plugins building on the container use this to keep
    /// their registrations out of the ordinary namespace.
    pub fn register_keyed<S, A>(
        &self,
        name: Option<&str>,
        option: Option<KeyOption>,
        factory: impl Fn(&Container, A) -> S + Send + Sync + 'static,
    ) -> Registration<S>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let _serialized = self.lock();

        let key = ServiceKey::new::<S, A>(name, option);
        let factory: FactoryFn<S, A> = Arc::new(factory);
        let entry = Arc::new(ServiceEntry::new::<S, A>(
            key.clone(),
            factory,
            self.inner.default_scope.clone(),
        ));
        entry.set_owner(self);
        debug!(key = %entry.key(), scope = %entry.object_scope(), "registered service");

        let behaviors = {
            let guard = self.lock();
            let mut state = guard.borrow_mut();
            state.services.insert(key, entry.clone());
            state.behaviors.clone()
        };
        for behavior in behaviors {
            behavior.container_did_register(self, &entry, entry.key().name());
        }

        Registration::new(entry)
    }

    /// Attaches a registration observer. Only registrations made after
    /// this call are reported.
    pub fn add_behavior(&self, behavior: impl Behavior + 'static) {
        let guard = self.lock();
        guard.borrow_mut().behaviors.push(Arc::new(behavior));
    }

    /// Clears the local registration map. Ancestors and descendants are
    /// untouched; lookups keep falling back to ancestors afterwards.
    pub fn remove_all(&self) {
        let guard = self.lock();
        let removed = {
            let mut state = guard.borrow_mut();
            let count = state.services.len();
            state.services.clear();
            count
        };
        debug!(removed, "cleared local registrations");
    }

    /// True if a registration for `S` under `name` exists here or on any
    /// ancestor, whatever its argument shape or option.
    pub fn has_any_registration<S: 'static>(&self, name: Option<&str>) -> bool {
        let local = {
            let guard = self.lock();
            let state = guard.borrow();
            state
                .services
                .keys()
                .any(|key| key.service_type() == TypeId::of::<S>() && key.name() == name)
        };
        local
            || self
                .parent()
                .is_some_and(|parent| parent.has_any_registration::<S>(name))
    }

    /// Discards cached instances of every local registration assigned to
    /// `scope`, then cascades to ancestors. Matching is by scope identity
    /// (the same `Arc`), so resetting a shared scope from any node in the
    /// hierarchy clears it consistently chain-wide.
    pub fn reset_object_scope(&self, scope: &Arc<ObjectScope>) {
        let matching: Vec<Arc<ServiceEntry>> = {
            let guard = self.lock();
            let state = guard.borrow();
            state
                .services
                .values()
                .filter(|entry| Arc::ptr_eq(&entry.object_scope(), scope))
                .cloned()
                .collect()
        };
        debug!(scope = %scope, entries = matching.len(), "resetting object scope");
        for entry in &matching {
            entry.reset_storage();
        }
        if let Some(parent) = self.parent() {
            parent.reset_object_scope(scope);
        }
    }

    // ── Resolution ──

    /// Resolves an instance of `S`, or `None` when nothing is registered
    /// for it. Absence is an expected outcome, not an error.
    pub fn resolve<S: Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.resolve_with::<S, ()>(None, ())
    }

    /// Resolves a named registration of `S`.
    pub fn resolve_named<S: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<S>> {
        self.resolve_with::<S, ()>(Some(name), ())
    }

    /// Resolves `S` passing an argument tuple through to the factory.
    pub fn resolve_with<S, A>(&self, name: Option<&str>, arguments: A) -> Option<Arc<S>>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        self.try_resolve_with::<S, A>(name, arguments).ok()
    }

    /// Like [`resolve`](Container::resolve) but surfaces the failure
    /// details instead of collapsing them to `None`.
    pub fn try_resolve<S: Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolutionError> {
        self.try_resolve_with::<S, ()>(None, ())
    }

    /// Like [`resolve_named`](Container::resolve_named) with failure details.
    pub fn try_resolve_named<S: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<S>, ResolutionError> {
        self.try_resolve_with::<S, ()>(Some(name), ())
    }

    /// Like [`resolve_with`](Container::resolve_with) with failure details.
    pub fn try_resolve_with<S, A>(
        &self,
        name: Option<&str>,
        arguments: A,
    ) -> Result<Arc<S>, ResolutionError>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        self.resolve_keyed(name, None, arguments)
    }

    /// Extension point: resolution with an explicit [`KeyOption`],
    /// pairing [`register_keyed`](Container::register_keyed).
    pub fn resolve_keyed<S, A>(
        &self,
        name: Option<&str>,
        option: Option<KeyOption>,
        arguments: A,
    ) -> Result<Arc<S>, ResolutionError>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let _serialized = self.lock();

        let key = ServiceKey::new::<S, A>(name, option);
        trace!(key = %key, "resolving");

        // A factory may request the ambient graph token as a dependency.
        if key == ambient_graph_key() {
            return match self.current_object_graph() {
                Some(graph) => {
                    let shared: SharedInstance = Arc::new(graph);
                    shared
                        .downcast::<S>()
                        .map_err(|_| ResolutionError::ShapeMismatch { key })
                }
                None => Err(ResolutionError::Missing(self.missing_for(key))),
            };
        }

        if let Some(entry) = self.entry_for_key(&key) {
            return self.resolve_entry::<S, A>(&entry, arguments);
        }

        let missing = self.missing_for(key);
        self.inner.debug_helper.resolution_failed(&missing);
        Err(ResolutionError::Missing(missing))
    }

    /// Temporarily overrides the active object graph for the duration of
    /// `body`, restoring the prior value afterwards even if `body` panics.
    /// Deferred wrappers use this to re-enter the graph they captured.
    pub fn with_object_graph<T>(
        &self,
        identifier: GraphIdentifier,
        body: impl FnOnce(&Container) -> T,
    ) -> T {
        let _serialized = self.lock();
        let previous = {
            let guard = self.lock();
            let mut state = guard.borrow_mut();
            std::mem::replace(&mut state.current_graph, Some(identifier))
        };
        let _restore = RestoreGraph { container: self, previous };
        body(self)
    }

    /// The identifier of the object graph currently being resolved, if any.
    pub fn current_object_graph(&self) -> Option<GraphIdentifier> {
        self.lock().borrow().current_graph
    }

    // ── Deferred-resolution wrappers ──

    /// A [`Lazy`] for `S`: resolves on first access, re-entering the
    /// object graph active right now, and caches the result.
    ///
    /// Construction always succeeds; when `S` has no registration the
    /// wrapper carries no producer and every access yields `None`.
    pub fn lazy<S: Send + Sync + 'static>(&self) -> Lazy<S> {
        self.lazy_with::<S, ()>(None, ())
    }

    /// A [`Lazy`] for a named registration of `S`.
    pub fn lazy_named<S: Send + Sync + 'static>(&self, name: &str) -> Lazy<S> {
        self.lazy_with::<S, ()>(Some(name), ())
    }

    /// A [`Lazy`] for `S` replaying the given argument tuple.
    pub fn lazy_with<S, A>(&self, name: Option<&str>, arguments: A) -> Lazy<S>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let _serialized = self.lock();
        Lazy::new(
            self.instance_producer::<S, A>(name, None, arguments),
            self.current_object_graph(),
        )
    }

    /// A [`Provider`] for `S`: every access performs a fresh resolution.
    pub fn provider<S: Send + Sync + 'static>(&self) -> Provider<S> {
        self.provider_with::<S, ()>(None, ())
    }

    /// A [`Provider`] for a named registration of `S`.
    pub fn provider_named<S: Send + Sync + 'static>(&self, name: &str) -> Provider<S> {
        self.provider_with::<S, ()>(Some(name), ())
    }

    /// A [`Provider`] for `S` replaying the given argument tuple.
    pub fn provider_with<S, A>(&self, name: Option<&str>, arguments: A) -> Provider<S>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let _serialized = self.lock();
        Provider::new(self.instance_producer::<S, A>(name, None, arguments))
    }

    /// Optional passthrough: resolves immediately, without engaging the
    /// failure diagnostics — absence here is as ordinary as presence.
    pub fn optional<S: Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.optional_with::<S, ()>(None, ())
    }

    /// Optional passthrough for a named registration.
    pub fn optional_named<S: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<S>> {
        self.optional_with::<S, ()>(Some(name), ())
    }

    /// Optional passthrough with arguments.
    pub fn optional_with<S, A>(&self, name: Option<&str>, arguments: A) -> Option<Arc<S>>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let _serialized = self.lock();
        self.instance_producer::<S, A>(name, None, arguments)
            .and_then(|produce| produce(None))
    }

    // ── Engine internals ──

    fn entry_for_key(&self, key: &ServiceKey) -> Option<Arc<ServiceEntry>> {
        let local = {
            let guard = self.lock();
            let found = guard.borrow().services.get(key).cloned();
            found
        };
        local.or_else(|| self.parent().and_then(|parent| parent.entry_for_key(key)))
    }

    fn resolve_entry<S, A>(
        &self,
        entry: &Arc<ServiceEntry>,
        arguments: A,
    ) -> Result<Arc<S>, ResolutionError>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        self.increment_resolution_depth();
        let result = self.resolve_entry_inner(entry, arguments);
        self.decrement_resolution_depth();
        result
    }

    fn resolve_entry_inner<S, A>(
        &self,
        entry: &Arc<ServiceEntry>,
        arguments: A,
    ) -> Result<Arc<S>, ResolutionError>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let Some(graph) = self.current_object_graph() else {
            panic!(
                "resolution is running without an active object graph; a container shared \
                 between threads must only be driven through its own handles"
            );
        };

        if let Some(cached) = entry.cached_instance(graph).and_then(downcast_shared::<S>) {
            return Ok(cached);
        }

        let factory = entry.typed_factory::<S, A>().ok_or_else(|| {
            error!(key = %entry.key(), "factory shape does not match the resolution request");
            ResolutionError::ShapeMismatch { key: entry.key().clone() }
        })?;
        let produced = factory(self, arguments);

        // The factory may have populated this entry through a nested
        // resolution; the instance stored first wins, so one graph never
        // observes two instances of a shared registration.
        if let Some(cached) = entry.cached_instance(graph).and_then(downcast_shared::<S>) {
            return Ok(cached);
        }

        let instance = Arc::new(produced);
        let shared: SharedInstance = instance.clone();
        entry.store_instance(shared, graph);
        self.record_in_flight(entry);

        if let Some(callback) = entry.completion_callback::<S>() {
            callback(self, &instance);
        }

        Ok(instance)
    }

    /// Replays `resolve_entry` for a deferred wrapper, optionally
    /// re-entering a captured graph.
    pub(crate) fn resolve_entry_with_graph<S, A>(
        &self,
        entry: &Arc<ServiceEntry>,
        arguments: A,
        graph: Option<GraphIdentifier>,
    ) -> Option<Arc<S>>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let _serialized = self.lock();
        let result = match graph {
            Some(identifier) => self.with_object_graph(identifier, |container| {
                container.resolve_entry::<S, A>(entry, arguments)
            }),
            None => self.resolve_entry(entry, arguments),
        };
        match result {
            Ok(instance) => Some(instance),
            Err(resolution_error) => {
                error!(error = %resolution_error, "deferred resolution failed");
                None
            }
        }
    }

    fn instance_producer<S, A>(
        &self,
        name: Option<&str>,
        option: Option<KeyOption>,
        arguments: A,
    ) -> Option<InstanceProducer<S>>
    where
        S: Send + Sync + 'static,
        A: Arguments,
    {
        let entry = self.entry_for_key(&ServiceKey::new::<S, A>(name, option))?;
        let container = self.downgrade();
        Some(Arc::new(move |graph| {
            let container = container.upgrade()?;
            container.resolve_entry_with_graph::<S, A>(&entry, arguments.clone(), graph)
        }))
    }

    fn increment_resolution_depth(&self) {
        if let Some(parent) = self.parent() {
            parent.increment_resolution_depth();
        }
        let guard = self.lock();
        let mut state = guard.borrow_mut();
        if state.resolution_depth == 0 && state.current_graph.is_none() {
            let graph = GraphIdentifier::new();
            trace!(?graph, "opening object graph");
            state.current_graph = Some(graph);
        }
        if state.resolution_depth >= MAX_RESOLUTION_DEPTH {
            drop(state);
            panic!(
                "circular dependency detected: resolution exceeded depth {MAX_RESOLUTION_DEPTH}. \
                 Factories are eagerly resolving each other; return the instance without the \
                 back-reference and wire it in an init_completed callback, or take a Lazy of the \
                 other service instead"
            );
        }
        state.resolution_depth += 1;
    }

    fn decrement_resolution_depth(&self) {
        if let Some(parent) = self.parent() {
            parent.decrement_resolution_depth();
        }
        let completed = {
            let guard = self.lock();
            let mut state = guard.borrow_mut();
            debug_assert!(state.resolution_depth > 0, "resolution depth underflow");
            state.resolution_depth = state.resolution_depth.saturating_sub(1);
            if state.resolution_depth == 0 {
                state.current_graph = None;
                Some(std::mem::take(&mut state.graph_in_flight))
            } else {
                None
            }
        };
        if let Some(entries) = completed {
            if !entries.is_empty() {
                trace!(entries = entries.len(), "object graph completed");
            }
            for entry in &entries {
                entry.graph_resolution_completed();
            }
        }
    }

    fn record_in_flight(&self, entry: &Arc<ServiceEntry>) {
        let guard = self.lock();
        let mut state = guard.borrow_mut();
        if !state.graph_in_flight.iter().any(|seen| Arc::ptr_eq(seen, entry)) {
            state.graph_in_flight.push(entry.clone());
        }
    }

    fn missing_for(&self, requested: ServiceKey) -> MissingRegistration {
        MissingRegistration {
            requested,
            available: self.registration_snapshot(),
        }
    }

    /// Flattened view of every key registered across the chain, child
    /// registrations shadowing identically-keyed ancestor ones.
    fn registration_snapshot(&self) -> Vec<ServiceKey> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        self.collect_registrations(&mut seen, &mut keys);
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        keys
    }

    fn collect_registrations(&self, seen: &mut HashSet<ServiceKey>, out: &mut Vec<ServiceKey>) {
        {
            let guard = self.lock();
            for key in guard.borrow().services.keys() {
                if seen.insert(key.clone()) {
                    out.push(key.clone());
                }
            }
        }
        if let Some(parent) = self.parent() {
            parent.collect_registrations(seen, out);
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registrations = self.lock().borrow().services.len();
        f.debug_struct("Container")
            .field("registrations", &registrations)
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}

fn downcast_shared<S: Send + Sync + 'static>(instance: SharedInstance) -> Option<Arc<S>> {
    instance.downcast::<S>().ok()
}

/// Puts the overridden graph back when `with_object_graph` ends, unwind
/// included.
struct RestoreGraph<'a> {
    container: &'a Container,
    previous: Option<GraphIdentifier>,
}

impl Drop for RestoreGraph<'_> {
    fn drop(&mut self) {
        let guard = self.container.lock();
        guard.borrow_mut().current_graph = self.previous;
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::behavior::Behavior;
    pub use crate::debug::{DebugHelper, LoggingDebugHelper};
    pub use crate::entry::Registration;
    pub use crate::error::{MissingRegistration, ResolutionError};
    pub use crate::graph::GraphIdentifier;
    pub use crate::key::{KeyOption, ServiceKey};
    pub use crate::scope::ObjectScope;
    pub use crate::wrapper::{Lazy, Provider};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::OnceCell;
    use parking_lot::Mutex;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ambry=trace")
            .try_init();
    }

    #[derive(Debug)]
    struct Database {
        url: String,
    }

    struct Config {
        source: &'static str,
    }

    fn counting_database(calls: &Arc<AtomicUsize>) -> impl Fn(&Container) -> Database + Send + Sync + 'static {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Database { url: "postgres://localhost".into() }
        }
    }

    #[test]
    fn container_handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Container>();
    }

    #[test]
    fn resolves_a_registered_service() {
        init_tracing();
        let container = Container::new();
        container.register::<Database>(|_| Database { url: "postgres://localhost".into() });

        let database = container.resolve::<Database>().unwrap();
        assert_eq!(database.url, "postgres://localhost");
    }

    #[test]
    fn resolves_nested_dependencies() {
        struct Repository {
            database: Arc<Database>,
        }

        let container = Container::new();
        container.register::<Database>(|_| Database { url: "postgres://db".into() });
        container.register::<Repository>(|resolver| Repository {
            database: resolver.resolve().unwrap(),
        });

        let repository = container.resolve::<Repository>().unwrap();
        assert_eq!(repository.database.url, "postgres://db");
    }

    #[test]
    fn missing_registration_resolves_to_none() {
        let container = Container::new();
        assert!(container.resolve::<Database>().is_none());
    }

    #[test]
    fn try_resolve_reports_the_missing_key() {
        let container = Container::new();
        let error = container.try_resolve::<Database>().unwrap_err();
        match error {
            ResolutionError::Missing(missing) => {
                assert_eq!(missing.requested.service_type(), TypeId::of::<Database>());
                assert!(missing.available.is_empty());
            }
            other => panic!("expected Missing, got: {other:?}"),
        }
    }

    // Graph scope: shared within one top-level resolve, distinct across them.
    #[test]
    fn graph_scope_shares_within_one_graph_only() {
        struct Consumer {
            first: Arc<Database>,
            second: Arc<Database>,
        }

        let container = Container::new();
        container.register::<Database>(|_| Database { url: "graph".into() });
        container.register::<Consumer>(|resolver| Consumer {
            first: resolver.resolve().unwrap(),
            second: resolver.resolve().unwrap(),
        });

        let a = container.resolve::<Consumer>().unwrap();
        assert!(Arc::ptr_eq(&a.first, &a.second));

        let b = container.resolve::<Consumer>().unwrap();
        assert!(!Arc::ptr_eq(&a.first, &b.first));
    }

    #[test]
    fn transient_scope_never_shares() {
        struct Consumer {
            first: Arc<Database>,
            second: Arc<Database>,
        }

        let container = Container::new();
        container
            .register::<Database>(|_| Database { url: "transient".into() })
            .in_object_scope(&ObjectScope::transient());
        container.register::<Consumer>(|resolver| Consumer {
            first: resolver.resolve().unwrap(),
            second: resolver.resolve().unwrap(),
        });

        let consumer = container.resolve::<Consumer>().unwrap();
        assert!(!Arc::ptr_eq(&consumer.first, &consumer.second));
    }

    #[test]
    fn container_scope_shares_until_reset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container
            .register::<Database>(counting_database(&calls))
            .in_object_scope(&ObjectScope::container());

        let first = container.resolve::<Database>().unwrap();
        let second = container.resolve::<Database>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        container.reset_object_scope(&ObjectScope::container());
        let third = container.resolve::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn weak_scope_follows_caller_liveness() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container
            .register::<Database>(counting_database(&calls))
            .in_object_scope(&ObjectScope::weak());

        let held = container.resolve::<Database>().unwrap();
        let shared = container.resolve::<Database>().unwrap();
        assert!(Arc::ptr_eq(&held, &shared));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(held);
        drop(shared);
        let _fresh = container.resolve::<Database>().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn scope_with_parent_composes_policies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = ObjectScope::with_parent(
            "session",
            || Box::new(crate::storage::GraphStorage::default()),
            &ObjectScope::container(),
        );

        let container = Container::new();
        container
            .register::<Database>(counting_database(&calls))
            .in_object_scope(&session);

        let first = container.resolve::<Database>().unwrap();
        let second = container.resolve::<Database>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        container.reset_object_scope(&session);
        let third = container.resolve::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn reregistration_replaces_the_factory() {
        let container = Container::new();
        container.register::<Config>(|_| Config { source: "first" });
        container.register::<Config>(|_| Config { source: "second" });

        assert_eq!(container.resolve::<Config>().unwrap().source, "second");
    }

    #[test]
    fn named_registrations_coexist() {
        let container = Container::new();
        container.register_named::<Database>("primary", |_| Database { url: "primary".into() });
        container.register_named::<Database>("replica", |_| Database { url: "replica".into() });

        assert_eq!(container.resolve_named::<Database>("primary").unwrap().url, "primary");
        assert_eq!(container.resolve_named::<Database>("replica").unwrap().url, "replica");
        // The unnamed key was never registered.
        assert!(container.resolve::<Database>().is_none());
    }

    #[test]
    fn factories_receive_argument_tuples() {
        struct Connection {
            url: String,
            port: u16,
        }

        let container = Container::new();
        container.register_with::<Connection, (String, u16)>(None, |_, (url, port)| Connection {
            url,
            port,
        });

        let connection = container
            .resolve_with::<Connection, (String, u16)>(None, ("localhost".into(), 5432))
            .unwrap();
        assert_eq!(connection.url, "localhost");
        assert_eq!(connection.port, 5432);

        // The argument shape is part of the key; the unit-argument key
        // matches nothing.
        assert!(container.resolve::<Connection>().is_none());
    }

    #[test]
    fn key_options_partition_the_namespace() {
        struct PluginMarker;

        let container = Container::new();
        container.register_keyed::<Config, ()>(
            None,
            Some(KeyOption::of::<PluginMarker>()),
            |_, _: ()| Config { source: "plugin" },
        );

        assert!(container.resolve::<Config>().is_none());
        let config = container
            .resolve_keyed::<Config, ()>(None, Some(KeyOption::of::<PluginMarker>()), ())
            .unwrap();
        assert_eq!(config.source, "plugin");
    }

    // ── Hierarchy ──

    #[test]
    fn child_resolves_ancestor_registrations() {
        let parent = Container::new();
        parent.register::<Database>(|_| Database { url: "ancestor".into() });

        let child = Container::builder().parent(&parent).build();
        assert_eq!(child.resolve::<Database>().unwrap().url, "ancestor");
    }

    #[test]
    fn child_registrations_stay_invisible_upwards_and_sideways() {
        let parent = Container::new();
        let child = Container::builder().parent(&parent).build();
        let sibling = Container::builder().parent(&parent).build();

        child.register::<Config>(|_| Config { source: "child" });

        assert!(child.resolve::<Config>().is_some());
        assert!(parent.resolve::<Config>().is_none());
        assert!(sibling.resolve::<Config>().is_none());
    }

    #[test]
    fn child_registration_shadows_the_ancestor() {
        let parent = Container::new();
        parent.register::<Config>(|_| Config { source: "parent" });
        let child = Container::builder().parent(&parent).build();
        child.register::<Config>(|_| Config { source: "child" });

        assert_eq!(child.resolve::<Config>().unwrap().source, "child");
        assert_eq!(parent.resolve::<Config>().unwrap().source, "parent");
    }

    #[test]
    fn scope_reset_on_a_child_cascades_to_ancestors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parent = Container::new();
        parent
            .register::<Database>(counting_database(&calls))
            .in_object_scope(&ObjectScope::container());
        let child = Container::builder().parent(&parent).build();

        let before = child.resolve::<Database>().unwrap();
        child.reset_object_scope(&ObjectScope::container());
        let after = child.resolve::<Database>().unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn has_any_registration_searches_the_chain() {
        let parent = Container::new();
        parent.register::<Database>(|_| Database { url: "x".into() });
        parent.register_named::<Config>("file", |_| Config { source: "file" });
        let child = Container::builder().parent(&parent).build();

        assert!(child.has_any_registration::<Database>(None));
        assert!(child.has_any_registration::<Config>(Some("file")));
        assert!(!child.has_any_registration::<Config>(None));
        assert!(!child.has_any_registration::<String>(None));
    }

    #[test]
    fn remove_all_clears_only_the_local_map() {
        let parent = Container::new();
        parent.register::<Database>(|_| Database { url: "kept".into() });
        let child = Container::builder().parent(&parent).build();
        child.register::<Config>(|_| Config { source: "dropped" });

        child.remove_all();

        assert!(child.resolve::<Config>().is_none());
        assert_eq!(child.resolve::<Database>().unwrap().url, "kept");
    }

    // ── Graph identity ──

    #[test]
    fn ambient_graph_token_is_resolvable_inside_a_graph() {
        struct Tagged {
            graph: GraphIdentifier,
        }

        let container = Container::new();
        container.register::<Tagged>(|resolver| Tagged {
            graph: *resolver.resolve::<GraphIdentifier>().unwrap(),
        });

        let first = container.resolve::<Tagged>().unwrap();
        let second = container.resolve::<Tagged>().unwrap();
        // Each top-level resolve opens its own graph.
        assert_ne!(first.graph, second.graph);

        // Outside any resolution there is no ambient token.
        assert!(container.resolve::<GraphIdentifier>().is_none());
    }

    #[test]
    fn with_object_graph_overrides_and_restores() {
        let container = Container::new();
        let outer = GraphIdentifier::new();
        let inner = GraphIdentifier::new();

        container.with_object_graph(outer, |container| {
            let observed = container
                .with_object_graph(inner, |inner_view| {
                    *inner_view.resolve::<GraphIdentifier>().unwrap()
                });
            assert_eq!(observed, inner);
            assert_eq!(*container.resolve::<GraphIdentifier>().unwrap(), outer);
        });

        assert!(container.current_object_graph().is_none());
    }

    #[test]
    fn with_object_graph_restores_after_a_panic() {
        let container = Container::new();
        let outer = GraphIdentifier::new();
        let inner = GraphIdentifier::new();

        container.with_object_graph(outer, |container| {
            let result = catch_unwind(AssertUnwindSafe(|| {
                container.with_object_graph(inner, |_| panic!("boom"));
            }));
            assert!(result.is_err());
            assert_eq!(*container.resolve::<GraphIdentifier>().unwrap(), outer);
        });
    }

    #[test]
    fn reentering_a_graph_recovers_live_instances() {
        let container = Container::new();
        container.register::<Database>(|_| Database { url: "shared".into() });

        struct Probe {
            database: Arc<Database>,
            graph: GraphIdentifier,
        }
        container.register::<Probe>(|resolver| Probe {
            database: resolver.resolve().unwrap(),
            graph: *resolver.resolve::<GraphIdentifier>().unwrap(),
        });

        let probe = container.resolve::<Probe>().unwrap();

        // As long as the probe holds its database, re-entering the graph
        // yields the same instance rather than a new one.
        let replayed = container.with_object_graph(probe.graph, |view| {
            view.resolve::<Database>().unwrap()
        });
        assert!(Arc::ptr_eq(&probe.database, &replayed));
    }

    // ── Completion callbacks ──

    #[test]
    fn init_completed_runs_after_the_instance_is_cached() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        {
            let observed = observed.clone();
            container
                .register::<Database>(|_| Database { url: "wired".into() })
                .init_completed(move |resolver, database| {
                    // The instance is cached before the callback runs, so a
                    // resolution in here observes the same one.
                    let again = resolver.resolve::<Database>().unwrap();
                    assert!(Arc::ptr_eq(&again, database));
                    observed.lock().push(database.url.clone());
                });
        }

        container.resolve::<Database>().unwrap();
        assert_eq!(*observed.lock(), vec!["wired".to_string()]);
    }

    #[test]
    fn init_completed_wires_mutual_references() {
        struct Hub {
            port: Arc<Port>,
        }
        struct Port {
            hub: OnceCell<Arc<Hub>>,
        }

        let container = Container::new();
        container.register::<Port>(|_| Port { hub: OnceCell::new() });
        container
            .register::<Hub>(|resolver| Hub { port: resolver.resolve().unwrap() })
            .init_completed(|resolver, hub| {
                let port = resolver.resolve::<Port>().unwrap();
                let _ = port.hub.set(hub.clone());
            });

        let hub = container.resolve::<Hub>().unwrap();
        let wired = hub.port.hub.get().expect("back-reference wired");
        assert!(Arc::ptr_eq(wired, &hub));
    }

    // ── Cycles ──

    #[test]
    #[should_panic(expected = "circular dependency")]
    fn eager_mutual_resolution_aborts_at_the_depth_ceiling() {
        struct Ping(Option<Arc<Pong>>);
        struct Pong(Option<Arc<Ping>>);

        let container = Container::new();
        container.register::<Ping>(|resolver| Ping(resolver.resolve()));
        container.register::<Pong>(|resolver| Pong(resolver.resolve()));

        let _ = container.resolve::<Ping>();
    }

    #[test]
    fn lazy_wrappers_break_mutual_dependencies() {
        struct Chicken {
            egg: Lazy<Egg>,
        }
        struct Egg {
            chicken: Lazy<Chicken>,
        }

        let container = Container::new();
        container.register::<Chicken>(|resolver| Chicken { egg: resolver.lazy() });
        container.register::<Egg>(|resolver| Egg { chicken: resolver.lazy() });

        let chicken = container.resolve::<Chicken>().unwrap();
        let egg = chicken.egg.instance().expect("egg resolves lazily");
        let back = egg.chicken.instance().expect("chicken resolves lazily");

        // Both lazies re-enter the original graph, so the cycle closes on
        // the same chicken instead of a duplicate.
        assert!(Arc::ptr_eq(&chicken, &back));
    }

    // ── Deferred wrappers ──

    #[test]
    fn provider_yields_a_fresh_instance_per_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.register::<Database>(counting_database(&calls));

        let provider = container.provider::<Database>();
        let first = provider.instance().unwrap();
        let second = provider.instance().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wrappers_for_unregistered_types_yield_absence() {
        let container = Container::new();

        let lazy = container.lazy::<Database>();
        let provider = container.provider::<Database>();

        assert!(lazy.instance().is_none());
        assert!(provider.instance().is_none());
        assert!(container.optional::<Database>().is_none());
    }

    #[test]
    fn optional_resolves_once_registered() {
        let container = Container::new();
        container.register::<Database>(|_| Database { url: "present".into() });
        assert_eq!(container.optional::<Database>().unwrap().url, "present");
    }

    #[test]
    fn lazy_outliving_its_container_yields_absence() {
        let lazy = {
            let container = Container::new();
            container.register::<Database>(|_| Database { url: "gone".into() });
            container.lazy::<Database>()
        };
        assert!(lazy.instance().is_none());
    }

    // ── Diagnostics ──

    #[derive(Default)]
    struct CountingDebugHelper {
        failures: AtomicUsize,
        known: AtomicUsize,
    }

    impl DebugHelper for CountingDebugHelper {
        fn resolution_failed(&self, missing: &MissingRegistration) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            self.known.store(missing.available.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn failed_resolution_reports_the_flattened_snapshot_once() {
        let parent = Container::new();
        parent.register::<Database>(|_| Database { url: "one".into() });
        parent.register_named::<Database>("replica", |_| Database { url: "two".into() });

        let helper = Arc::new(CountingDebugHelper::default());
        let child = Container::builder()
            .parent(&parent)
            .debug_helper(helper.clone())
            .build();
        child.register::<Config>(|_| Config { source: "local" });

        assert!(child.resolve::<String>().is_none());

        assert_eq!(helper.failures.load(Ordering::SeqCst), 1);
        assert_eq!(helper.known.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn successful_resolution_never_engages_the_debug_helper() {
        let helper = Arc::new(CountingDebugHelper::default());
        let container = Container::builder().debug_helper(helper.clone()).build();
        container.register::<Database>(|_| Database { url: "fine".into() });

        container.resolve::<Database>().unwrap();
        container.optional::<Config>();

        // optional() treats absence as ordinary, so only an actual failed
        // resolve() would count.
        assert_eq!(helper.failures.load(Ordering::SeqCst), 0);
    }

    // ── Behaviors ──

    struct RecordingBehavior {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Behavior for RecordingBehavior {
        fn container_did_register(
            &self,
            _container: &Container,
            entry: &Arc<ServiceEntry>,
            name: Option<&str>,
        ) {
            let mut label = entry.key().service_type_name().to_string();
            if let Some(name) = name {
                label.push_str(" / ");
                label.push_str(name);
            }
            self.seen.lock().push(label);
        }
    }

    #[test]
    fn behaviors_observe_only_subsequent_registrations() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();

        container.register::<Database>(|_| Database { url: "before".into() });
        container.add_behavior(RecordingBehavior { seen: seen.clone() });
        container.register_named::<Config>("env", |_| Config { source: "after" });

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("Config"));
        assert!(seen[0].contains("env"));
    }

    // ── Ownership and metadata ──

    #[test]
    fn entries_know_their_owning_container() {
        let container = Container::new();
        let registration = container.register::<Database>(|_| Database { url: "x".into() });

        let owner = registration.entry().owner().expect("container is alive");
        assert!(owner.ptr_eq(&container));
        assert!(Arc::ptr_eq(
            &registration.entry().object_scope(),
            container.default_object_scope(),
        ));
    }

    #[test]
    fn in_object_scope_updates_the_entry() {
        let container = Container::new();
        let registration = container
            .register::<Database>(|_| Database { url: "x".into() })
            .in_object_scope(&ObjectScope::weak());

        assert!(Arc::ptr_eq(&registration.entry().object_scope(), &ObjectScope::weak()));
    }

    // ── Serialization across threads ──

    #[test]
    fn concurrent_resolutions_are_serialized() {
        init_tracing();
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container
            .register::<Database>(counting_database(&calls))
            .in_object_scope(&ObjectScope::container());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let container = container.clone();
                scope.spawn(move || {
                    container.resolve::<Database>().unwrap();
                });
            }
        });

        // Whole resolutions queue one after another, so the permanent slot
        // is filled exactly once.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
