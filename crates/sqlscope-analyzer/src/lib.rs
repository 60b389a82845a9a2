//! Semantic analysis of SQL statements
//!
//! Given a parsed statement, the [`Analyzer`] runs the rewrite pipeline,
//! resolves every name against nested scopes and the catalog, types every
//! expression, enforces clause placement rules and returns an [`Analysis`]
//! for the planner.
//!
//! ```text
//! Spanned<Statement> --rewrite--> canonical statement --resolve/validate--> Analysis
//! ```

pub mod analysis;
pub mod analyzer;
pub mod classify;
pub mod error;
mod expression_analyzer;
pub mod rewrite;
pub mod scope;
mod statement_analyzer;
pub mod validate;

pub use analysis::*;
pub use analyzer::*;
pub use error::*;
pub use scope::{ColumnOrigin, Field, FieldRef, RelationAlias, ScopeArena, ScopeId, ScopeKind};
