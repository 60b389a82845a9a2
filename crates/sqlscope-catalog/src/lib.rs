//! Catalog abstractions consumed by the sqlscope analyzer
//!
//! This crate provides:
//! - Collaborator traits: [`Metadata`], [`FunctionRegistry`], [`AccessControl`]
//! - In-memory reference implementations loadable from JSON
//! - The per-call [`Session`]

pub mod access;
pub mod functions;
pub mod metadata;
pub mod provider;
pub mod session;

pub use access::*;
pub use functions::*;
pub use metadata::*;
pub use provider::*;
pub use session::*;
