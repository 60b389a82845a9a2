//! Placement rules for aggregate and window function calls
//!
//! Structural checks run on a clause before its names are resolved; the
//! grouping check runs on a SELECT once all of its clauses are resolved.

use sqlscope_ast::{Expr, ExprKind, FunctionCall, Select, SelectItem, SortItem};
use sqlscope_catalog::{FunctionKind, FunctionRegistry};
use sqlscope_diagnostics::{SQL0300, SQL0400, SQL0401, SQL0402, SQL0403, SQL0404, SQL0405};
use sqlscope_types::SqlType;
use std::fmt;

use crate::analysis::Analysis;
use crate::classify::{self, collect_aggregates, collect_window_functions};
use crate::error::{Result, SemanticError};
use crate::scope::ScopeId;

/// Clause an expression appears in, for messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Where,
    Join,
    GroupBy,
    Having,
    Values,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Where => "WHERE clause",
            Self::Join => "JOIN clause",
            Self::GroupBy => "GROUP BY clause",
            Self::Having => "HAVING clause",
            Self::Values => "VALUES",
        })
    }
}

fn printable(calls: &[&Expr]) -> String {
    calls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_node<'a>(calls: &[&'a Expr]) -> Option<&'a Expr> {
    calls.first().copied()
}

fn locate(err: SemanticError, at: Option<&Expr>) -> SemanticError {
    match at {
        Some(expr) => err.at(expr.id, expr.span),
        None => err,
    }
}

/// Reject any aggregate or window function call in `exprs`
///
/// The message lists every offending call, aggregates first.
pub fn verify_no_aggregates_or_window_functions<'a>(
    registry: &dyn FunctionRegistry,
    exprs: impl IntoIterator<Item = &'a Expr> + Clone,
    clause: Clause,
) -> Result<()> {
    let mut offending = collect_aggregates(exprs.clone(), registry);
    offending.extend(collect_window_functions(exprs));
    if offending.is_empty() {
        return Ok(());
    }
    let err = SemanticError::new(
        SQL0400,
        format!(
            "{clause} cannot contain aggregations or window functions: [{}]",
            printable(&offending)
        ),
    );
    Err(locate(err, first_node(&offending)))
}

/// Reject window function calls in `expr`
pub fn verify_no_window_functions(expr: &Expr, clause: Clause) -> Result<()> {
    let windows = collect_window_functions([expr]);
    if windows.is_empty() {
        return Ok(());
    }
    let err = SemanticError::new(
        SQL0400,
        format!(
            "{clause} cannot contain window functions: [{}]",
            printable(&windows)
        ),
    );
    Err(locate(err, first_node(&windows)))
}

/// Check how a call uses its function
///
/// FILTER and DISTINCT need an aggregate, OVER needs an aggregate or a
/// window function, and window functions need OVER. Arguments of an
/// aggregate may not aggregate; arguments and window clauses of a window
/// call may not contain window calls.
pub fn verify_function_usage(
    registry: &dyn FunctionRegistry,
    expr: &Expr,
    call: &FunctionCall,
    kind: FunctionKind,
) -> Result<()> {
    let name = call.canonical_name();
    let usage = |message: String| Err(SemanticError::new(SQL0405, message).at(expr.id, expr.span));

    if call.filter.is_some() && kind != FunctionKind::Aggregate {
        return usage("Filter is only valid for aggregation functions".to_string());
    }
    if call.distinct && kind != FunctionKind::Aggregate {
        return usage("DISTINCT is not supported for non-aggregation functions".to_string());
    }
    match (kind, &call.window) {
        (FunctionKind::Window, None) => {
            return Err(SemanticError::new(
                SQL0404,
                format!("Window function {name} requires an OVER clause"),
            )
            .at(expr.id, expr.span));
        }
        (FunctionKind::Scalar, Some(_)) => {
            return usage(format!("Not a window function: {name}"));
        }
        _ => {}
    }

    let children = expr.children();
    if call.window.is_none() {
        let nested = collect_aggregates(children.iter().copied(), registry);
        if !nested.is_empty() {
            let err = SemanticError::new(
                SQL0401,
                format!(
                    "Cannot nest aggregations inside aggregation '{expr}': [{}]",
                    printable(&nested)
                ),
            );
            return Err(locate(err, first_node(&nested)));
        }
    }
    let nested_windows = collect_window_functions(children.iter().copied());
    if !nested_windows.is_empty() {
        let message = if call.window.is_some() {
            format!(
                "Cannot nest window functions inside window function '{expr}': [{}]",
                printable(&nested_windows)
            )
        } else {
            format!(
                "Cannot nest window functions inside aggregation '{expr}': [{}]",
                printable(&nested_windows)
            )
        };
        return Err(locate(
            SemanticError::new(SQL0402, message),
            first_node(&nested_windows),
        ));
    }
    Ok(())
}

/// A predicate clause must be boolean; `unknown` (a bare NULL) is accepted
pub fn verify_boolean(data_type: SqlType, expr: &Expr, clause: &str) -> Result<()> {
    if matches!(data_type, SqlType::Boolean | SqlType::Unknown) {
        return Ok(());
    }
    Err(SemanticError::new(
        SQL0300,
        format!("{clause} must evaluate to a boolean: actual type {data_type}"),
    )
    .at(expr.id, expr.span))
}

/// Checks that every column reference of an aggregated SELECT is grouped
struct GroupingCheck<'a> {
    analysis: &'a Analysis,
    registry: &'a dyn FunctionRegistry,
    keys: &'a [&'a Expr],
    key_fields: Vec<(ScopeId, usize, usize)>,
}

impl<'a> GroupingCheck<'a> {
    fn new(analysis: &'a Analysis, registry: &'a dyn FunctionRegistry, keys: &'a [&'a Expr]) -> Self {
        let key_fields = keys
            .iter()
            .filter_map(|k| analysis.resolved_field(k.id))
            .map(|f| f.key())
            .collect();
        Self {
            analysis,
            registry,
            keys,
            key_fields,
        }
    }

    fn not_grouped(expr: &Expr) -> SemanticError {
        SemanticError::new(
            SQL0403,
            format!("'{expr}' must be an aggregate expression or appear in GROUP BY clause"),
        )
        .at(expr.id, expr.span)
    }

    fn check(&self, expr: &Expr) -> Result<()> {
        if self.keys.iter().any(|k| k.equivalent(expr))
            || self.analysis.output_reference(expr.id).is_some()
        {
            return Ok(());
        }
        match &expr.kind {
            ExprKind::FunctionCall(call)
                if call.window.is_none() && self.registry.is_aggregate(&call.canonical_name()) =>
            {
                Ok(())
            }
            ExprKind::Identifier(_) | ExprKind::Dereference { .. } => {
                match self.analysis.resolved_field(expr.id) {
                    Some(field) if field.correlated => Ok(()),
                    Some(field) if self.key_fields.contains(&field.key()) => Ok(()),
                    _ => Err(Self::not_grouped(expr)),
                }
            }
            ExprKind::Exists { .. } | ExprKind::Subquery(_) => Ok(()),
            _ => expr.children().into_iter().try_for_each(|c| self.check(c)),
        }
    }
}

/// Every non-aggregated expression of an aggregated SELECT must be a
/// grouping key or built from grouping keys
///
/// `keys` are the grouping expressions with ordinals already replaced by
/// the select expression they point at. `wildcard_fields` are the fields a
/// `*` item expanded to, with their printable names.
pub fn verify_grouping(
    analysis: &Analysis,
    registry: &dyn FunctionRegistry,
    select: &Select,
    keys: &[&Expr],
    order_by: &[SortItem],
    wildcard_fields: &[((ScopeId, usize, usize), String)],
) -> Result<()> {
    let check = GroupingCheck::new(analysis, registry, keys);

    for item in &select.items {
        if let SelectItem::Expr { expr, .. } = item {
            check.check(expr)?;
        }
    }
    if let Some((_, name)) = wildcard_fields
        .iter()
        .find(|(key, _)| !check.key_fields.contains(key))
    {
        let span = select
            .items
            .iter()
            .find_map(|item| match item {
                SelectItem::Wildcard { span, .. } => Some(*span),
                SelectItem::Expr { .. } => None,
            })
            .unwrap_or(select.span);
        return Err(SemanticError::new(
            SQL0403,
            format!("'{name}' must be an aggregate expression or appear in GROUP BY clause"),
        )
        .with_node(select.id)
        .with_span(span));
    }
    if let Some(having) = &select.having {
        check.check(having)?;
    }
    for item in order_by {
        check.check(&item.expr)?;
    }
    Ok(())
}

/// Aggregates and window calls of a resolved SELECT, for the analysis
pub fn select_aggregation(
    registry: &dyn FunctionRegistry,
    select: &Select,
    order_by: &[SortItem],
) -> (Vec<Expr>, Vec<Expr>) {
    let exprs = || {
        select
            .items
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expr { expr, .. } => Some(expr),
                SelectItem::Wildcard { .. } => None,
            })
            .chain(select.having.iter())
            .chain(order_by.iter().map(|item| &item.expr))
    };
    let aggregates = exprs()
        .flat_map(|e| classify::aggregates(e, registry))
        .cloned()
        .collect();
    let windows = exprs().flat_map(classify::window_functions).cloned().collect();
    (aggregates, windows)
}
