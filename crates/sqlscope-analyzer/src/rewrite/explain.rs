//! EXPLAIN option normalization
//!
//! The canonical form lists exactly one TYPE followed by one FORMAT.

use sqlscope_ast::{Explain, ExplainFormat, ExplainOption, ExplainType, Spanned, Statement};
use sqlscope_diagnostics::{SQL0103, SQL0104};

use super::RewriteContext;
use crate::error::{Result, SemanticError};

pub(super) fn rewrite(ctx: &RewriteContext<'_>, statement: Spanned<Statement>) -> Result<Spanned<Statement>> {
    let span = statement.span;
    let Statement::Explain(explain) = statement.inner else {
        return Ok(statement);
    };
    let (explain_type, format) = normalize(explain.analyze, &explain.options)?;
    let inner = super::rewrite(ctx, *explain.statement)?;
    Ok(Statement::Explain(Explain {
        statement: Box::new(inner),
        analyze: explain.analyze,
        verbose: explain.verbose,
        options: vec![ExplainOption::Type(explain_type), ExplainOption::Format(format)],
    })
    .spanned(span))
}

/// Resolve the options to one type and one format, applying defaults
fn normalize(analyze: bool, options: &[ExplainOption]) -> Result<(ExplainType, ExplainFormat)> {
    let mut explain_type = None;
    let mut format = None;
    for option in options {
        match option {
            ExplainOption::Type(ty) => {
                if explain_type.replace(*ty).is_some() {
                    return Err(SemanticError::new(
                        SQL0103,
                        "Multiple TYPE options specified for EXPLAIN",
                    ));
                }
            }
            ExplainOption::Format(f) => {
                if format.replace(*f).is_some() {
                    return Err(SemanticError::new(
                        SQL0103,
                        "Multiple FORMAT options specified for EXPLAIN",
                    ));
                }
            }
        }
    }

    if analyze {
        if let Some(ty) = explain_type.filter(|ty| *ty != ExplainType::Distributed) {
            return Err(SemanticError::new(
                SQL0104,
                format!("EXPLAIN ANALYZE only supports TYPE DISTRIBUTED option, not TYPE {ty}"),
            ));
        }
    }
    let default_type = if analyze {
        ExplainType::Distributed
    } else {
        ExplainType::Logical
    };
    Ok((
        explain_type.unwrap_or(default_type),
        format.unwrap_or(ExplainFormat::Text),
    ))
}
