//! Expression nodes
//!
//! Expressions are closed: every kind the analyzer understands is a variant
//! of [`ExprKind`], and traversal sites match on it exhaustively.

use crate::{BinaryOp, Identifier, Literal, NodeId, QualifiedName, Query, SortItem, TypeSpecifier, UnaryOp};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use sqlscope_diagnostics::Span;

/// Type alias for boxed expressions
pub type BoxExpr = Box<Expr>;

/// An expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

/// All expression kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    /// Bare name, resolved against the relations in scope
    Identifier(Identifier),
    /// `base.field`; `t.x` and `s.t.x` are dereference chains
    Dereference { base: BoxExpr, field: Identifier },
    /// Positional parameter `?`, zero-based
    Parameter { position: usize },
    FunctionCall(FunctionCall),
    BinaryOp {
        left: BoxExpr,
        op: BinaryOp,
        right: BoxExpr,
    },
    UnaryOp { op: UnaryOp, operand: BoxExpr },
    IsNull { operand: BoxExpr, negated: bool },
    Between {
        operand: BoxExpr,
        low: BoxExpr,
        high: BoxExpr,
        negated: bool,
    },
    InList {
        operand: BoxExpr,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        operand: BoxExpr,
        subquery: Box<Query>,
        negated: bool,
    },
    Exists { subquery: Box<Query>, negated: bool },
    /// Scalar subquery
    Subquery(Box<Query>),
    /// Simple (`CASE x WHEN ...`) or searched (`CASE WHEN ...`) case
    Case {
        operand: Option<BoxExpr>,
        when_clauses: Vec<WhenClause>,
        else_result: Option<BoxExpr>,
    },
    /// `CAST(x AS t)`, or `TRY_CAST` when `safe`
    Cast {
        operand: BoxExpr,
        target: TypeSpecifier,
        safe: bool,
    },
}

/// WHEN clause of a CASE expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

/// A function invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: QualifiedName,
    pub args: Vec<Expr>,
    pub distinct: bool,
    /// `FILTER (WHERE ...)`
    pub filter: Option<BoxExpr>,
    /// `OVER (...)`
    pub window: Option<WindowSpec>,
}

/// Window specification of an `OVER` clause
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<SortItem>,
}

impl Expr {
    /// Create a node with a fresh id and no source span
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: NodeId::next(),
            kind,
            span: Span::SYNTHETIC,
        }
    }

    /// Attach a source span
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn literal(lit: Literal) -> Self {
        Self::new(ExprKind::Literal(lit))
    }

    pub fn null() -> Self {
        Self::literal(Literal::Null)
    }

    pub fn boolean(value: bool) -> Self {
        Self::literal(Literal::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::literal(Literal::Integer(value))
    }

    pub fn double(value: f64) -> Self {
        Self::literal(Literal::Double(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(Literal::String(value.into()))
    }

    pub fn identifier(name: impl Into<Identifier>) -> Self {
        Self::new(ExprKind::Identifier(name.into()))
    }

    pub fn dereference(base: Expr, field: impl Into<Identifier>) -> Self {
        Self::new(ExprKind::Dereference {
            base: Box::new(base),
            field: field.into(),
        })
    }

    /// Column reference from a dotted path: `x`, `t.x`, `web.t.x`
    pub fn column(path: &str) -> Self {
        let mut parts = path.split('.');
        let first = Self::identifier(parts.next().unwrap_or_default());
        parts.fold(first, |base, part| Self::dereference(base, part))
    }

    pub fn parameter(position: usize) -> Self {
        Self::new(ExprKind::Parameter { position })
    }

    pub fn call(call: FunctionCall) -> Self {
        Self::new(ExprKind::FunctionCall(call))
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Self::call(FunctionCall::new(name, args))
    }

    /// `count(*)`
    pub fn count_star() -> Self {
        Self::function("count", Vec::new())
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Self::new(ExprKind::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Equal, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Greater, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::And, right)
    }

    pub fn like(operand: Expr, pattern: impl Into<String>) -> Self {
        Self::binary(operand, BinaryOp::Like, Self::string(pattern))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn not(operand: Expr) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    pub fn is_null(operand: Expr, negated: bool) -> Self {
        Self::new(ExprKind::IsNull {
            operand: Box::new(operand),
            negated,
        })
    }

    pub fn between(operand: Expr, low: Expr, high: Expr) -> Self {
        Self::new(ExprKind::Between {
            operand: Box::new(operand),
            low: Box::new(low),
            high: Box::new(high),
            negated: false,
        })
    }

    pub fn in_list(operand: Expr, list: Vec<Expr>) -> Self {
        Self::new(ExprKind::InList {
            operand: Box::new(operand),
            list,
            negated: false,
        })
    }

    pub fn in_subquery(operand: Expr, subquery: Query) -> Self {
        Self::new(ExprKind::InSubquery {
            operand: Box::new(operand),
            subquery: Box::new(subquery),
            negated: false,
        })
    }

    pub fn exists(subquery: Query) -> Self {
        Self::new(ExprKind::Exists {
            subquery: Box::new(subquery),
            negated: false,
        })
    }

    pub fn subquery(query: Query) -> Self {
        Self::new(ExprKind::Subquery(Box::new(query)))
    }

    pub fn searched_case(when_clauses: Vec<WhenClause>, else_result: Option<Expr>) -> Self {
        Self::new(ExprKind::Case {
            operand: None,
            when_clauses,
            else_result: else_result.map(Box::new),
        })
    }

    pub fn simple_case(operand: Expr, when_clauses: Vec<WhenClause>, else_result: Option<Expr>) -> Self {
        Self::new(ExprKind::Case {
            operand: Some(Box::new(operand)),
            when_clauses,
            else_result: else_result.map(Box::new),
        })
    }

    pub fn cast(operand: Expr, target: impl Into<TypeSpecifier>) -> Self {
        Self::new(ExprKind::Cast {
            operand: Box::new(operand),
            target: target.into(),
            safe: false,
        })
    }

    pub fn try_cast(operand: Expr, target: impl Into<TypeSpecifier>) -> Self {
        Self::new(ExprKind::Cast {
            operand: Box::new(operand),
            target: target.into(),
            safe: true,
        })
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match &self.kind {
            ExprKind::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    /// The dotted name of an identifier or dereference chain
    pub fn qualified_name(&self) -> Option<QualifiedName> {
        match &self.kind {
            ExprKind::Identifier(ident) => Some(QualifiedName::new(vec![ident.clone()])),
            ExprKind::Dereference { base, field } => {
                let mut name = base.qualified_name()?;
                name.parts.push(field.clone());
                Some(name)
            }
            _ => None,
        }
    }

    /// Direct child expressions in evaluation order
    ///
    /// Subquery bodies are not children: they belong to their own query
    /// scope. The operand of `IN (subquery)` is.
    pub fn children(&self) -> SmallVec<[&Expr; 4]> {
        let mut out = SmallVec::new();
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Identifier(_)
            | ExprKind::Parameter { .. }
            | ExprKind::Exists { .. }
            | ExprKind::Subquery(_) => {}
            ExprKind::Dereference { base, .. } => out.push(base.as_ref()),
            ExprKind::FunctionCall(call) => {
                out.extend(call.args.iter());
                if let Some(filter) = &call.filter {
                    out.push(filter.as_ref());
                }
                if let Some(window) = &call.window {
                    out.extend(window.partition_by.iter());
                    out.extend(window.order_by.iter().map(|item| &item.expr));
                }
            }
            ExprKind::BinaryOp { left, right, .. } => {
                out.push(left.as_ref());
                out.push(right.as_ref());
            }
            ExprKind::UnaryOp { operand, .. }
            | ExprKind::IsNull { operand, .. }
            | ExprKind::InSubquery { operand, .. }
            | ExprKind::Cast { operand, .. } => out.push(operand.as_ref()),
            ExprKind::Between { operand, low, high, .. } => {
                out.push(operand.as_ref());
                out.push(low.as_ref());
                out.push(high.as_ref());
            }
            ExprKind::InList { operand, list, .. } => {
                out.push(operand.as_ref());
                out.extend(list.iter());
            }
            ExprKind::Case {
                operand,
                when_clauses,
                else_result,
            } => {
                if let Some(operand) = operand {
                    out.push(operand.as_ref());
                }
                for clause in when_clauses {
                    out.push(&clause.condition);
                    out.push(&clause.result);
                }
                if let Some(else_result) = else_result {
                    out.push(else_result.as_ref());
                }
            }
        }
        out
    }

    /// Structural equality ignoring node ids, spans and identifier case
    ///
    /// Used to match select expressions against GROUP BY keys.
    pub fn equivalent(&self, other: &Expr) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Literal(a), ExprKind::Literal(b)) => a == b,
            (ExprKind::Identifier(a), ExprKind::Identifier(b)) => a.canonical() == b.canonical(),
            (
                ExprKind::Dereference { base: a, field: fa },
                ExprKind::Dereference { base: b, field: fb },
            ) => fa.canonical() == fb.canonical() && a.equivalent(b),
            (ExprKind::Parameter { position: a }, ExprKind::Parameter { position: b }) => a == b,
            (ExprKind::FunctionCall(a), ExprKind::FunctionCall(b)) => {
                a.name.canonical_parts() == b.name.canonical_parts()
                    && a.distinct == b.distinct
                    && a.filter.is_some() == b.filter.is_some()
                    && a.window.is_some() == b.window.is_some()
                    && all_equivalent(self.children(), other.children())
            }
            (
                ExprKind::BinaryOp { op: a, .. },
                ExprKind::BinaryOp { op: b, .. },
            ) => a == b && all_equivalent(self.children(), other.children()),
            (ExprKind::UnaryOp { op: a, .. }, ExprKind::UnaryOp { op: b, .. }) => {
                a == b && all_equivalent(self.children(), other.children())
            }
            (
                ExprKind::IsNull { negated: a, .. },
                ExprKind::IsNull { negated: b, .. },
            )
            | (
                ExprKind::Between { negated: a, .. },
                ExprKind::Between { negated: b, .. },
            )
            | (
                ExprKind::InList { negated: a, .. },
                ExprKind::InList { negated: b, .. },
            ) => a == b && all_equivalent(self.children(), other.children()),
            (
                ExprKind::InSubquery {
                    subquery: qa,
                    negated: a,
                    ..
                },
                ExprKind::InSubquery {
                    subquery: qb,
                    negated: b,
                    ..
                },
            ) => {
                a == b
                    && qa.to_string() == qb.to_string()
                    && all_equivalent(self.children(), other.children())
            }
            (
                ExprKind::Exists {
                    subquery: qa,
                    negated: a,
                },
                ExprKind::Exists {
                    subquery: qb,
                    negated: b,
                },
            ) => a == b && qa.to_string() == qb.to_string(),
            (ExprKind::Subquery(a), ExprKind::Subquery(b)) => a.to_string() == b.to_string(),
            (
                ExprKind::Case {
                    operand: oa,
                    when_clauses: wa,
                    else_result: ea,
                },
                ExprKind::Case {
                    operand: ob,
                    when_clauses: wb,
                    else_result: eb,
                },
            ) => {
                oa.is_some() == ob.is_some()
                    && wa.len() == wb.len()
                    && ea.is_some() == eb.is_some()
                    && all_equivalent(self.children(), other.children())
            }
            (
                ExprKind::Cast {
                    target: ta,
                    safe: sa,
                    ..
                },
                ExprKind::Cast {
                    target: tb,
                    safe: sb,
                    ..
                },
            ) => {
                ta.name.eq_ignore_ascii_case(&tb.name)
                    && ta.parameters == tb.parameters
                    && sa == sb
                    && all_equivalent(self.children(), other.children())
            }
            _ => false,
        }
    }
}

fn all_equivalent(left: SmallVec<[&Expr; 4]>, right: SmallVec<[&Expr; 4]>) -> bool {
    left.len() == right.len() && left.iter().zip(right.iter()).all(|(a, b)| a.equivalent(b))
}

impl FunctionCall {
    pub fn new(name: &str, args: Vec<Expr>) -> Self {
        Self {
            name: QualifiedName::from(name),
            args,
            distinct: false,
            filter: None,
            window: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn over(mut self, window: WindowSpec) -> Self {
        self.window = Some(window);
        self
    }

    /// Canonical (lower-cased) function name
    pub fn canonical_name(&self) -> String {
        self.name.canonical_parts().join(".")
    }
}

impl WindowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, exprs: Vec<Expr>) -> Self {
        self.partition_by = exprs;
        self
    }

    pub fn order_by(mut self, items: Vec<SortItem>) -> Self {
        self.order_by = items;
        self
    }
}

impl WhenClause {
    pub fn new(condition: Expr, result: Expr) -> Self {
        Self { condition, result }
    }
}
