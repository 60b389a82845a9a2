//! Semantic analysis for SQL statements
//!
//! `sqlscope` takes a parsed statement tree, rewrites convenience statements
//! (SHOW, DESCRIBE, EXPLAIN) into canonical form, resolves every name
//! against nested query scopes and a catalog, types every expression and
//! checks where aggregates and window functions may appear. The result is
//! an [`Analysis`] a planner can consume without looking anything up again.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sqlscope::ast::{Expr, Query, Relation, Select, SelectItem, Span, Statement};
//! use sqlscope::catalog::{
//!     AllowAllAccessControl, BuiltinFunctionRegistry, ColumnMetadata, InMemoryMetadata,
//!     QualifiedObjectName, Session,
//! };
//! use sqlscope::types::SqlType;
//! use sqlscope::Analyzer;
//!
//! let metadata = InMemoryMetadata::new().with_table(
//!     QualifiedObjectName::new("hive", "web", "orders"),
//!     vec![ColumnMetadata::new("total", SqlType::Double)],
//! );
//! let analyzer = Analyzer::new(
//!     Session::new("alice").with_catalog("hive").with_schema("web"),
//!     Arc::new(metadata),
//!     Arc::new(BuiltinFunctionRegistry::new()),
//!     Arc::new(AllowAllAccessControl),
//! );
//!
//! let query = Query::select(
//!     Select::new(vec![SelectItem::expr(Expr::identifier("total"))]).from(Relation::table("orders")),
//! );
//! let statement = Statement::from(query).spanned(Span::new(0, 25));
//! let analysis = analyzer.analyze(statement, vec![], false)?;
//! assert_eq!(analysis.output_columns()[0].data_type, SqlType::Double);
//! # Ok::<(), sqlscope::SemanticError>(())
//! ```

pub use sqlscope_analyzer as analyzer;
pub use sqlscope_ast as ast;
pub use sqlscope_catalog as catalog;
pub use sqlscope_diagnostics as diagnostics;
pub use sqlscope_types as types;

pub use sqlscope_analyzer::{Analysis, Analyzer, OutputColumn, Result, SemanticError, StatementKind};
pub use sqlscope_ast::{Spanned, Statement};
pub use sqlscope_diagnostics::{Diagnostic, ErrorCode, ErrorKind, Span};
