//! Resolution-failure diagnostics.

use tracing::debug;

use crate::error::MissingRegistration;

/// Hook invoked whenever a resolution request matches nothing — no
/// registration across the chain and no deferred-wrapper path. Absence is
/// a normal outcome, so the hook reports rather than fails.
pub trait DebugHelper: Send + Sync {
    fn resolution_failed(&self, missing: &MissingRegistration);
}

/// Default helper: renders the failed key and the flattened registration
/// snapshot and hands the text to the process-wide logging function
/// (`ambry_support::logging`), which writes to standard output until an
/// application installs its own sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDebugHelper;

impl DebugHelper for LoggingDebugHelper {
    fn resolution_failed(&self, missing: &MissingRegistration) {
        debug!(key = %missing.requested, known = missing.available.len(), "resolution failed");
        ambry_support::logging::log(&missing.to_string());
    }
}
