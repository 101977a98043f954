//! # Ambry Support
//!
//! Shared plumbing for the ambry crates.
//!
//! This crate provides:
//! - Text rendering for resolution diagnostics
//! - The process-wide logging function diagnostics are emitted through

pub mod logging;
pub mod rendering;
