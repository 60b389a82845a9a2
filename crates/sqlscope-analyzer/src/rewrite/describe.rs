//! DESCRIBE INPUT / DESCRIBE OUTPUT
//!
//! The prepared statement is looked up in the session, rewritten, and
//! carried inline in a [`Described`] node so the analyzer never needs the
//! session's statement map.

use sqlscope_ast::{DescribeKind, Described, Identifier, Spanned, Statement};
use sqlscope_diagnostics::SQL0100;

use super::RewriteContext;
use crate::error::{Result, SemanticError};

pub(super) fn rewrite(ctx: &RewriteContext<'_>, statement: Spanned<Statement>) -> Result<Spanned<Statement>> {
    let (kind, name) = match &statement.inner {
        Statement::DescribeInput(describe) => (DescribeKind::Input, &describe.name),
        Statement::DescribeOutput(describe) => (DescribeKind::Output, &describe.name),
        _ => return Ok(statement),
    };
    let prepared = prepared_statement(ctx, name)?;
    let described = Described {
        kind,
        name: name.clone(),
        statement: Box::new(super::rewrite(ctx, prepared)?),
    };
    Ok(Statement::Described(described).spanned(statement.span))
}

fn prepared_statement(ctx: &RewriteContext<'_>, name: &Identifier) -> Result<Spanned<Statement>> {
    let prepared = ctx
        .session
        .prepared_statement(&name.canonical())
        .ok_or_else(|| {
            SemanticError::new(SQL0100, format!("Prepared statement not found: {name}"))
        })?;
    if matches!(
        prepared.inner,
        Statement::DescribeInput(_) | Statement::DescribeOutput(_) | Statement::Described(_)
    ) {
        return Err(SemanticError::not_supported(format!(
            "DESCRIBE of prepared statement {name} that is itself a DESCRIBE"
        )));
    }
    Ok(prepared.clone())
}
