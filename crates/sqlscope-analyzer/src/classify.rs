//! Finding aggregate and window calls in expression trees
//!
//! Both extractors are lazy pre-order walks that do not descend into
//! subqueries: those belong to their own query block. A call with an OVER
//! clause is a window function even when the named function is an
//! aggregate, and is never reported as an aggregate.

use smallvec::SmallVec;
use sqlscope_ast::{Expr, ExprKind};
use sqlscope_catalog::FunctionRegistry;

/// Pre-order walk over an expression and its descendants
#[derive(Debug)]
pub struct PreOrder<'a> {
    stack: SmallVec<[&'a Expr; 8]>,
}

impl<'a> PreOrder<'a> {
    pub fn new(root: &'a Expr) -> Self {
        let mut stack = SmallVec::new();
        stack.push(root);
        Self { stack }
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let expr = self.stack.pop()?;
        // reversed so children come out left to right
        self.stack.extend(expr.children().into_iter().rev());
        Some(expr)
    }
}

fn is_aggregate_call(expr: &Expr, registry: &dyn FunctionRegistry) -> bool {
    matches!(
        &expr.kind,
        ExprKind::FunctionCall(call)
            if call.window.is_none() && registry.is_aggregate(&call.canonical_name())
    )
}

fn is_window_call(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::FunctionCall(call) if call.window.is_some())
}

/// Aggregate calls in `expr`, outermost first
pub fn aggregates<'a>(
    expr: &'a Expr,
    registry: &dyn FunctionRegistry,
) -> impl Iterator<Item = &'a Expr> {
    PreOrder::new(expr).filter(move |e| is_aggregate_call(e, registry))
}

/// Window function calls in `expr`, outermost first
pub fn window_functions(expr: &Expr) -> impl Iterator<Item = &Expr> {
    PreOrder::new(expr).filter(|e| is_window_call(e))
}

/// Aggregates of several expressions, in order
pub fn collect_aggregates<'a>(
    exprs: impl IntoIterator<Item = &'a Expr>,
    registry: &dyn FunctionRegistry,
) -> Vec<&'a Expr> {
    exprs
        .into_iter()
        .flat_map(|e| aggregates(e, registry))
        .collect()
}

/// Window functions of several expressions, in order
pub fn collect_window_functions<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> Vec<&'a Expr> {
    exprs.into_iter().flat_map(window_functions).collect()
}
