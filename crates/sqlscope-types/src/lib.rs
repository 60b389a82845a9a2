//! SQL type system
//!
//! This crate defines the types the analyzer assigns to expressions and
//! columns, plus the implicit coercion and explicit cast rules between them.

pub mod coercion;
pub mod system_types;

pub use coercion::*;
pub use system_types::*;
