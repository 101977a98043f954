//! Error types for resolution.
//!
//! Ordinary absence is not an error: `resolve` returns `Option` and
//! callers are expected to handle `None`. The `try_resolve` surface wraps
//! the same outcomes in a [`ResolutionError`] that carries enough context
//! to be actionable.

use std::fmt;

use ambry_support::rendering::{shorten_type_name, suggest_similar};

use crate::key::ServiceKey;

/// Why a `try_resolve` call produced no instance.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// No registration matched the requested key.
    #[error("{}", .0)]
    Missing(MissingRegistration),

    /// A registration matched the key but holds a factory of a different
    /// concrete shape. Registration and resolution always pair identical
    /// service and argument types, so hitting this indicates a bug in the
    /// registering extension, not a runtime data condition.
    #[error("registration for {key} holds a factory of a different concrete shape")]
    ShapeMismatch { key: ServiceKey },
}

/// Details of a failed lookup: the requested key and the flattened set of
/// registrations known across the container chain at that moment.
#[derive(Debug)]
pub struct MissingRegistration {
    /// The key that matched nothing.
    pub requested: ServiceKey,
    /// Every key registered on the container and its ancestors, with
    /// shadowed ancestor duplicates removed.
    pub available: Vec<ServiceKey>,
}

impl MissingRegistration {
    /// Registered type names that look like what was requested.
    pub fn suggestions(&self) -> Vec<String> {
        let names: Vec<&str> = self
            .available
            .iter()
            .map(|key| key.service_type_name())
            .collect();
        suggest_similar(self.requested.service_type_name(), &names, 3)
    }
}

impl fmt::Display for MissingRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no registration for {}", self.requested)?;

        if self.available.is_empty() {
            write!(f, "\n  the container chain has no registrations")?;
        } else {
            write!(f, "\n  known registrations:")?;
            for key in &self.available {
                write!(f, "\n    - {key}")?;
            }
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            write!(f, "\n  did you mean:")?;
            for suggestion in &suggestions {
                write!(f, "\n    - {}", shorten_type_name(suggestion))?;
            }
        }

        write!(
            f,
            "\n  hint: register {} before resolving it",
            shorten_type_name(self.requested.service_type_name())
        )
    }
}
