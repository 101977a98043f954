//! Core container implementation for ambry.

pub mod arguments;
pub mod behavior;
pub mod container;
pub mod debug;
pub mod entry;
pub mod error;
pub mod graph;
pub mod key;
pub mod scope;
pub mod storage;
pub mod wrapper;

pub use container::prelude;
pub use container::{Container, ContainerBuilder};
pub use error::{MissingRegistration, ResolutionError};
pub use graph::GraphIdentifier;
pub use key::{KeyOption, ServiceKey};
pub use scope::ObjectScope;
