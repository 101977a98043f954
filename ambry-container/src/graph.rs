//! Object-graph identity.
//!
//! A graph is the set of all resolutions transitively triggered by one
//! top-level `resolve` call. Each graph gets a [`GraphIdentifier`] minted
//! when the first resolution opens it; the token keys graph-scoped storage
//! and dies with the graph unless a deferred wrapper captured it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GRAPH: AtomicU64 = AtomicU64::new(1);

/// Opaque token identifying one object graph.
///
/// Every call to [`GraphIdentifier::new`] yields a token distinct from all
/// earlier ones in this process. A factory can request the ambient token
/// as a dependency by resolving `GraphIdentifier` itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphIdentifier(u64);

impl GraphIdentifier {
    /// Mints a fresh, process-unique identifier.
    pub fn new() -> Self {
        Self(NEXT_GRAPH.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for GraphIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GraphIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphIdentifier({})", self.0)
    }
}
