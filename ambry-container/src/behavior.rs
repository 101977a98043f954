//! Registration observers.

use std::sync::Arc;

use crate::container::Container;
use crate::entry::ServiceEntry;

/// Observer notified for every registration made on a container *after*
/// the behavior was attached; earlier registrations are not replayed.
///
/// Behaviors are the extension seam for cross-cutting registration
/// concerns: mirroring registrations into another container, stamping a
/// shared scope onto every entry, collecting an inventory for tooling.
pub trait Behavior: Send + Sync {
    fn container_did_register(
        &self,
        container: &Container,
        entry: &Arc<ServiceEntry>,
        name: Option<&str>,
    );
}
