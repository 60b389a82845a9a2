//! Top-level statements

use crate::{Expr, Identifier, QualifiedName, Query, Relation, Spanned, TypeSpecifier};
use serde::{Deserialize, Serialize};
use sqlscope_diagnostics::Span;
use std::fmt;

/// A top-level statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Query(Box<Query>),
    CreateTable(CreateTable),
    CreateTableAsSelect(CreateTableAsSelect),
    Insert(Insert),
    Delete(Delete),
    Explain(Explain),
    DescribeInput(DescribeInput),
    DescribeOutput(DescribeOutput),
    /// A DESCRIBE with its prepared statement inlined
    Described(Described),
    ShowCatalogs(ShowCatalogs),
    ShowSchemas(ShowSchemas),
    ShowTables(ShowTables),
    ShowColumns(ShowColumns),
    ShowFunctions(ShowFunctions),
}

impl Statement {
    /// Short name used in logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::CreateTable(_) => "create table",
            Self::CreateTableAsSelect(_) => "create table as",
            Self::Insert(_) => "insert",
            Self::Delete(_) => "delete",
            Self::Explain(_) => "explain",
            Self::DescribeInput(_) => "describe input",
            Self::DescribeOutput(_) => "describe output",
            Self::Described(_) => "described",
            Self::ShowCatalogs(_) => "show catalogs",
            Self::ShowSchemas(_) => "show schemas",
            Self::ShowTables(_) => "show tables",
            Self::ShowColumns(_) => "show columns",
            Self::ShowFunctions(_) => "show functions",
        }
    }

    /// Attach the source span of the statement
    pub fn spanned(self, span: Span) -> Spanned<Statement> {
        Spanned::new(self, span)
    }
}

impl From<Query> for Statement {
    fn from(query: Query) -> Self {
        Self::Query(Box::new(query))
    }
}

/// `CREATE TABLE [IF NOT EXISTS] name (columns)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    pub name: QualifiedName,
    pub columns: Vec<ColumnDefinition>,
    pub not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: Identifier,
    pub data_type: TypeSpecifier,
    pub nullable: bool,
    pub span: Span,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<Identifier>, data_type: impl Into<TypeSpecifier>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            span: Span::SYNTHETIC,
        }
    }
}

/// `CREATE TABLE [IF NOT EXISTS] name [(columns)] AS query [WITH [NO] DATA]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableAsSelect {
    pub name: QualifiedName,
    pub column_aliases: Option<Vec<Identifier>>,
    pub query: Box<Query>,
    pub not_exists: bool,
    pub with_data: bool,
}

/// `INSERT INTO target [(columns)] query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub target: QualifiedName,
    pub columns: Option<Vec<Identifier>>,
    pub query: Box<Query>,
}

/// `DELETE FROM table [WHERE predicate]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    /// A table, optionally aliased
    pub table: Relation,
    pub where_clause: Option<Expr>,
}

/// `EXPLAIN [ANALYZE] [VERBOSE] [(options)] statement`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explain {
    pub statement: Box<Spanned<Statement>>,
    pub analyze: bool,
    pub verbose: bool,
    pub options: Vec<ExplainOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplainOption {
    Type(ExplainType),
    Format(ExplainFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplainType {
    Logical,
    Distributed,
    Validate,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplainFormat {
    Text,
    Graphviz,
    Json,
}

impl fmt::Display for ExplainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Logical => "LOGICAL",
            Self::Distributed => "DISTRIBUTED",
            Self::Validate => "VALIDATE",
            Self::Io => "IO",
        })
    }
}

impl fmt::Display for ExplainFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "TEXT",
            Self::Graphviz => "GRAPHVIZ",
            Self::Json => "JSON",
        })
    }
}

/// `DESCRIBE INPUT name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeInput {
    pub name: Identifier,
}

/// `DESCRIBE OUTPUT name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeOutput {
    pub name: Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescribeKind {
    Input,
    Output,
}

/// Canonical form of DESCRIBE: the prepared statement is carried inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Described {
    pub kind: DescribeKind,
    pub name: Identifier,
    pub statement: Box<Spanned<Statement>>,
}

/// `SHOW CATALOGS [LIKE pattern]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShowCatalogs {
    pub like: Option<String>,
}

/// `SHOW SCHEMAS [FROM catalog] [LIKE pattern]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShowSchemas {
    pub catalog: Option<Identifier>,
    pub like: Option<String>,
}

/// `SHOW TABLES [FROM [catalog.]schema] [LIKE pattern]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShowTables {
    pub schema: Option<QualifiedName>,
    pub like: Option<String>,
}

/// `SHOW COLUMNS FROM table`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowColumns {
    pub table: QualifiedName,
}

/// `SHOW FUNCTIONS [LIKE pattern]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShowFunctions {
    pub like: Option<String>,
}
