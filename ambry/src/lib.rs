//! # ambry — a hierarchical service registry and object-graph resolver
//!
//! Register named, typed construction recipes on a [`Container`], then ask
//! it for instances; nested dependencies a factory requests are resolved
//! automatically, shared per object graph, container hierarchy or caller
//! liveness depending on each registration's [`ObjectScope`].

pub use ambry_container::*;
pub use ambry_support as support;
