//! Registration identity keys.
//!
//! [`ServiceKey`] uniquely identifies a registration within a container.
//! It combines the service type, the argument-tuple type its factory
//! accepts, an optional registration name, and an optional [`KeyOption`]
//! discriminator for extensions.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Extra discriminator an extension can mix into a [`ServiceKey`] so its
/// registrations never collide with ordinary ones.
///
/// An option is minted from a marker type; two options are equal exactly
/// when they were minted from the same marker.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyOption {
    type_id: TypeId,
    label: &'static str,
}

impl KeyOption {
    /// Creates the option for marker type `M`.
    #[inline]
    pub fn of<M: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            label: type_name::<M>(),
        }
    }

    /// Human-readable label, used in diagnostics.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for KeyOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyOption({})", self.label)
    }
}

/// Uniquely identifies one registration in a container.
///
/// Equality and hashing are structural over the service type, the argument
/// shape, the name and the option. The stored type names are carried for
/// diagnostics only and never participate in comparisons.
///
/// # Examples
/// ```
/// use ambry_container::key::ServiceKey;
///
/// // Plain key: type + unit argument shape.
/// let key = ServiceKey::new::<String, ()>(None, None);
/// assert_eq!(key.name(), None);
///
/// // Named keys distinguish multiple registrations of one type.
/// let primary = ServiceKey::new::<String, ()>(Some("primary"), None);
/// let replica = ServiceKey::new::<String, ()>(Some("replica"), None);
/// assert_ne!(primary, replica);
///
/// // So does the argument shape.
/// assert_ne!(
///     ServiceKey::new::<String, ()>(None, None),
///     ServiceKey::new::<String, (u32,)>(None, None),
/// );
/// ```
#[derive(Clone)]
pub struct ServiceKey {
    service_type: TypeId,
    arguments_type: TypeId,
    service_type_name: &'static str,
    arguments_type_name: &'static str,
    name: Option<Arc<str>>,
    option: Option<KeyOption>,
}

impl ServiceKey {
    /// Creates the key for service type `S` resolved with argument tuple `A`.
    pub fn new<S: ?Sized + 'static, A: 'static>(
        name: Option<&str>,
        option: Option<KeyOption>,
    ) -> Self {
        Self {
            service_type: TypeId::of::<S>(),
            arguments_type: TypeId::of::<A>(),
            service_type_name: type_name::<S>(),
            arguments_type_name: type_name::<A>(),
            name: name.map(Arc::from),
            option,
        }
    }

    /// The [`TypeId`] of the service this key identifies.
    #[inline]
    pub fn service_type(&self) -> TypeId {
        self.service_type
    }

    /// The [`TypeId`] of the argument tuple the factory accepts.
    #[inline]
    pub fn arguments_type(&self) -> TypeId {
        self.arguments_type
    }

    /// Human-readable service type name, for diagnostics.
    #[inline]
    pub fn service_type_name(&self) -> &'static str {
        self.service_type_name
    }

    /// Human-readable argument tuple name, for diagnostics.
    #[inline]
    pub fn arguments_type_name(&self) -> &'static str {
        self.arguments_type_name
    }

    /// The registration name, if any.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The extension discriminator, if any.
    #[inline]
    pub fn option(&self) -> Option<KeyOption> {
        self.option
    }

    /// Whether the factory behind this key takes arguments beyond the container.
    #[inline]
    pub fn takes_arguments(&self) -> bool {
        self.arguments_type != TypeId::of::<()>()
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.service_type == other.service_type
            && self.arguments_type == other.arguments_type
            && self.name.as_deref() == other.name.as_deref()
            && self.option == other.option
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service_type.hash(state);
        self.arguments_type.hash(state);
        self.name.as_deref().hash(state);
        self.option.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({self})")
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service_type_name)?;
        if self.takes_arguments() {
            write!(f, " (arguments {})", self.arguments_type_name)?;
        }
        if let Some(name) = self.name() {
            write!(f, " (name {name:?})")?;
        }
        if let Some(option) = self.option {
            write!(f, " (option {})", option.label())?;
        }
        Ok(())
    }
}
