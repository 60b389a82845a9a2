//! Diagnostics for SQL semantic analysis
//!
//! This crate provides the error infrastructure shared by the analyzer crates:
//! structured error codes, source spans and locations, and diagnostic
//! records that can be rendered against the original statement text.

mod error;
mod error_code;
mod span;

pub use error::*;
pub use error_code::*;
pub use span::*;
