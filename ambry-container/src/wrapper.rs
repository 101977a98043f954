//! Deferred-resolution wrappers.
//!
//! A dependency slot does not always want an instance *now*; sometimes it
//! wants a way to obtain one later. The wrappers here are that capability,
//! as a closed set:
//!
//! - [`Lazy`] resolves on first access, re-entering the object graph it was
//!   created in, and caches the result for its own lifetime.
//! - [`Provider`] performs a fresh resolution on every access.
//! - The optional-passthrough variant is `Container::optional`, which
//!   resolves immediately into an `Option`.
//!
//! Wrappers are built by the container (`Container::lazy`,
//! `Container::provider`); construction never fails. When the wrapped type
//! has no registration the wrapper simply carries no producer, and every
//! access yields `None`.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::graph::GraphIdentifier;

/// Replays one captured resolution, optionally re-entering a graph.
pub(crate) type InstanceProducer<S> =
    Arc<dyn Fn(Option<GraphIdentifier>) -> Option<Arc<S>> + Send + Sync>;

/// Resolves the wrapped service once, on first access.
///
/// The wrapper remembers the object graph that was active when it was
/// created; the deferred resolution re-enters that graph, so a `Lazy`
/// dependency observes the same graph-scoped instances as its siblings
/// that resolved eagerly. This is what lets two services reference each
/// other without recursing: each takes a `Lazy` of the other instead of
/// resolving it inside its factory.
pub struct Lazy<S> {
    producer: Option<InstanceProducer<S>>,
    graph: Option<GraphIdentifier>,
    resolved: OnceCell<Option<Arc<S>>>,
}

impl<S: Send + Sync + 'static> Lazy<S> {
    pub(crate) fn new(
        producer: Option<InstanceProducer<S>>,
        graph: Option<GraphIdentifier>,
    ) -> Self {
        Self {
            producer,
            graph,
            resolved: OnceCell::new(),
        }
    }

    /// The wrapped instance; resolved on first call, cached afterwards.
    ///
    /// `None` when the wrapped type had no registration at wrapper
    /// construction time, or when the owning container has been dropped.
    pub fn instance(&self) -> Option<Arc<S>> {
        self.resolved
            .get_or_init(|| self.producer.as_ref().and_then(|produce| produce(self.graph)))
            .clone()
    }
}

impl<S> fmt::Debug for Lazy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("service", &type_name::<S>())
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

/// Resolves the wrapped service afresh on every access.
///
/// No graph is re-entered: an access performed outside any resolution
/// opens (and completes) its own graph, deliberately bypassing
/// graph-scoped caching from the wrapper's creation time.
pub struct Provider<S> {
    producer: Option<InstanceProducer<S>>,
}

impl<S: Send + Sync + 'static> Provider<S> {
    pub(crate) fn new(producer: Option<InstanceProducer<S>>) -> Self {
        Self { producer }
    }

    /// A freshly resolved instance, or `None` when the wrapped type had no
    /// registration at wrapper construction time.
    pub fn instance(&self) -> Option<Arc<S>> {
        self.producer.as_ref().and_then(|produce| produce(None))
    }
}

impl<S> fmt::Debug for Provider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("service", &type_name::<S>())
            .finish()
    }
}
