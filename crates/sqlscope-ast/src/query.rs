//! Query nodes: query blocks, relations and their clauses

use crate::{Expr, Identifier, NodeId, QualifiedName};
use serde::{Deserialize, Serialize};
use sqlscope_diagnostics::Span;

/// A query: optional WITH, a body, ORDER BY and LIMIT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: NodeId,
    pub with: Option<With>,
    pub body: QueryBody,
    pub order_by: Vec<SortItem>,
    /// Row limit; non-negative by construction
    pub limit: Option<u64>,
    pub span: Span,
}

/// `WITH [RECURSIVE] name [(columns)] AS (query), ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct With {
    pub recursive: bool,
    pub queries: Vec<WithQuery>,
}

/// One named query of a WITH clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithQuery {
    pub name: Identifier,
    pub column_aliases: Option<Vec<Identifier>>,
    pub query: Box<Query>,
    pub span: Span,
}

/// The body of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryBody {
    Select(Box<Select>),
    SetOperation(Box<SetOperation>),
    Values(Values),
    /// Parenthesized query used as a body
    Nested(Box<Query>),
}

/// A SELECT block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub id: NodeId,
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    /// FROM relations; more than one is an implicit cross join
    pub from: Vec<Relation>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub span: Span,
}

/// An item of a SELECT list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Expr {
        expr: Expr,
        alias: Option<Identifier>,
    },
    /// `*` or `t.*`
    Wildcard {
        qualifier: Option<QualifiedName>,
        span: Span,
    },
}

/// `left UNION|INTERSECT|EXCEPT [ALL] right`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOperation {
    pub op: SetOperator,
    pub all: bool,
    pub left: Box<Query>,
    pub right: Box<Query>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// `VALUES (..), (..)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Values {
    pub id: NodeId,
    pub rows: Vec<Vec<Expr>>,
    pub span: Span,
}

/// A relation in a FROM clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: NodeId,
    pub kind: RelationKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationKind {
    /// A table or named query
    Table(QualifiedName),
    /// `relation AS alias [(columns)]`
    Aliased {
        relation: Box<Relation>,
        alias: Identifier,
        column_aliases: Option<Vec<Identifier>>,
    },
    /// Derived table
    Subquery(Box<Query>),
    /// `LATERAL (query)`; sees relations to its left
    Lateral(Box<Query>),
    Join(Box<Join>),
    Values(Values),
}

/// A join of two relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub left: Relation,
    pub right: Relation,
    /// `None` for CROSS joins
    pub criteria: Option<JoinCriteria>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinCriteria {
    On(Expr),
    Using(Vec<Identifier>),
    Natural,
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
    pub expr: Expr,
    pub ascending: bool,
    pub nulls_first: Option<bool>,
}

impl Query {
    pub fn new(body: QueryBody) -> Self {
        Self {
            id: NodeId::next(),
            with: None,
            body,
            order_by: Vec::new(),
            limit: None,
            span: Span::SYNTHETIC,
        }
    }

    pub fn select(select: Select) -> Self {
        Self::new(QueryBody::Select(Box::new(select)))
    }

    pub fn values(rows: Vec<Vec<Expr>>) -> Self {
        Self::new(QueryBody::Values(Values::new(rows)))
    }

    pub fn set_operation(op: SetOperator, all: bool, left: Query, right: Query) -> Self {
        Self::new(QueryBody::SetOperation(Box::new(SetOperation {
            op,
            all,
            left: Box::new(left),
            right: Box::new(right),
        })))
    }

    pub fn nested(query: Query) -> Self {
        Self::new(QueryBody::Nested(Box::new(query)))
    }

    /// Add a named query to the WITH clause
    pub fn with_query(mut self, name: impl Into<Identifier>, query: Query) -> Self {
        let named = WithQuery {
            name: name.into(),
            column_aliases: None,
            query: Box::new(query),
            span: Span::SYNTHETIC,
        };
        self.with
            .get_or_insert_with(|| With {
                recursive: false,
                queries: Vec::new(),
            })
            .queries
            .push(named);
        self
    }

    pub fn order_by(mut self, items: Vec<SortItem>) -> Self {
        self.order_by = items;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Select {
    pub fn new(items: Vec<SelectItem>) -> Self {
        Self {
            id: NodeId::next(),
            distinct: false,
            items,
            from: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            span: Span::SYNTHETIC,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn from(mut self, relation: Relation) -> Self {
        self.from.push(relation);
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn group_by(mut self, keys: Vec<Expr>) -> Self {
        self.group_by = keys;
        self
    }

    pub fn having(mut self, predicate: Expr) -> Self {
        self.having = Some(predicate);
        self
    }

    /// Whether the block has a GROUP BY clause
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }
}

impl SelectItem {
    pub fn expr(expr: Expr) -> Self {
        Self::Expr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<Identifier>) -> Self {
        Self::Expr {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn wildcard() -> Self {
        Self::Wildcard {
            qualifier: None,
            span: Span::SYNTHETIC,
        }
    }

    pub fn qualified_wildcard(qualifier: &str) -> Self {
        Self::Wildcard {
            qualifier: Some(QualifiedName::from(qualifier)),
            span: Span::SYNTHETIC,
        }
    }
}

impl Values {
    pub fn new(rows: Vec<Vec<Expr>>) -> Self {
        Self {
            id: NodeId::next(),
            rows,
            span: Span::SYNTHETIC,
        }
    }
}

impl Relation {
    pub fn new(kind: RelationKind) -> Self {
        Self {
            id: NodeId::next(),
            kind,
            span: Span::SYNTHETIC,
        }
    }

    pub fn table(name: &str) -> Self {
        Self::new(RelationKind::Table(QualifiedName::from(name)))
    }

    pub fn subquery(query: Query) -> Self {
        Self::new(RelationKind::Subquery(Box::new(query)))
    }

    pub fn lateral(query: Query) -> Self {
        Self::new(RelationKind::Lateral(Box::new(query)))
    }

    pub fn values(rows: Vec<Vec<Expr>>) -> Self {
        Self::new(RelationKind::Values(Values::new(rows)))
    }

    pub fn join(kind: JoinKind, left: Relation, right: Relation, criteria: Option<JoinCriteria>) -> Self {
        Self::new(RelationKind::Join(Box::new(Join {
            kind,
            left,
            right,
            criteria,
        })))
    }

    /// Wrap in `AS alias`
    pub fn alias(self, alias: impl Into<Identifier>) -> Self {
        Self::new(RelationKind::Aliased {
            relation: Box::new(self),
            alias: alias.into(),
            column_aliases: None,
        })
    }

    /// Wrap in `AS alias (c1, c2, ...)`
    pub fn alias_with_columns(self, alias: impl Into<Identifier>, columns: &[&str]) -> Self {
        Self::new(RelationKind::Aliased {
            relation: Box::new(self),
            alias: alias.into(),
            column_aliases: Some(columns.iter().map(|c| Identifier::new(*c)).collect()),
        })
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl SortItem {
    pub fn ascending(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
            nulls_first: None,
        }
    }

    pub fn descending(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
            nulls_first: None,
        }
    }
}
