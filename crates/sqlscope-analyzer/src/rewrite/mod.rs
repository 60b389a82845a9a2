//! Statement rewrite pipeline
//!
//! Before resolution a statement passes through an ordered list of
//! stages. Each stage either returns the statement untouched or a
//! replacement tree:
//!
//! - `show`: SHOW statements become ordinary queries
//! - `describe`: DESCRIBE INPUT/OUTPUT inline their prepared statement
//! - `explain`: EXPLAIN options are normalized and the inner statement is
//!   rewritten through the whole pipeline
//!
//! Rewriting is idempotent: feeding a rewritten statement back in returns
//! it unchanged.

mod describe;
mod explain;
mod show;

use sqlscope_ast::{Expr, Spanned, Statement};
use sqlscope_catalog::{AccessControl, FunctionRegistry, Metadata, Session};

use crate::error::Result;

/// Collaborators a rewrite stage may consult
#[derive(Clone, Copy)]
pub struct RewriteContext<'a> {
    pub session: &'a Session,
    pub metadata: &'a dyn Metadata,
    pub functions: &'a dyn FunctionRegistry,
    pub access_control: &'a dyn AccessControl,
    pub parameters: &'a [Expr],
}

/// A rewrite stage
pub type RewriteStage = fn(&RewriteContext<'_>, Spanned<Statement>) -> Result<Spanned<Statement>>;

/// Stages in the order they run
pub const STAGES: [(&str, RewriteStage); 3] = [
    ("show", show::rewrite),
    ("describe", describe::rewrite),
    ("explain", explain::rewrite),
];

/// Run every stage over `statement`
pub fn rewrite(ctx: &RewriteContext<'_>, statement: Spanned<Statement>) -> Result<Spanned<Statement>> {
    STAGES.iter().try_fold(statement, |statement, (name, stage)| {
        let before = statement.kind_name();
        let rewritten = stage(ctx, statement)?;
        if rewritten.kind_name() != before {
            log::debug!("{name} rewrite: {before} -> {}", rewritten.kind_name());
        }
        Ok(rewritten)
    })
}
