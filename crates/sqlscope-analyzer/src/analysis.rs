//! The result of analyzing one statement
//!
//! [`Analysis`] owns the rewritten statement plus side tables keyed by
//! [`NodeId`]: scopes, resolved columns and functions, expression types,
//! tables, per-query outputs and per-SELECT aggregation data. Every
//! node-keyed entry is recorded at most once; a second write for the same
//! node is an analyzer bug and fails with an internal error.

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::Serialize;
use sqlscope_ast::{Expr, ExplainFormat, ExplainType, NodeId, Spanned, Statement};
use sqlscope_catalog::{ColumnMetadata, QualifiedObjectName, ResolvedFunction, TableSchema};
use sqlscope_types::SqlType;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SemanticError};
use crate::scope::{ColumnOrigin, Field, ScopeArena, ScopeId};

/// What kind of statement was analyzed, after rewriting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatementKind {
    Query,
    CreateTable,
    CreateTableAsSelect,
    Insert,
    Delete,
    Explain,
    DescribeInput,
    DescribeOutput,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::CreateTable => "create table",
            Self::CreateTableAsSelect => "create table as select",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Explain => "explain",
            Self::DescribeInput => "describe input",
            Self::DescribeOutput => "describe output",
        })
    }
}

/// A column reference bound to a field in scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub scope: ScopeId,
    pub relation: usize,
    pub field_index: usize,
    pub name: String,
    /// Base table the value was read from, if any
    pub origin_table: Option<QualifiedObjectName>,
    pub data_type: SqlType,
    /// Bound to an enclosing query block
    pub correlated: bool,
}

impl ResolvedField {
    /// Key identifying the bound field regardless of how it was written
    pub fn key(&self) -> (ScopeId, usize, usize) {
        (self.scope, self.relation, self.field_index)
    }
}

/// A column of the statement's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    pub data_type: SqlType,
    pub origin: Option<ColumnOrigin>,
    pub aliased: bool,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            data_type,
            origin: None,
            aliased: false,
        }
    }

    /// Output column for field `index` of a query's output
    pub fn from_field(index: usize, field: &Field) -> Self {
        Self {
            name: field.name.clone().unwrap_or_else(|| format!("_col{index}")),
            data_type: field.data_type,
            origin: field.origin.clone(),
            aliased: field.aliased,
        }
    }
}

/// A row of a DESCRIBE result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DescribeRow {
    Output {
        column_name: String,
        catalog: Option<String>,
        schema: Option<String>,
        table: Option<String>,
        data_type: SqlType,
        type_size: Option<u32>,
        aliased: bool,
    },
    Input {
        /// Zero-based parameter position
        position: usize,
        data_type: SqlType,
    },
}

/// Normalized EXPLAIN options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExplainOptions {
    pub explain_type: ExplainType,
    pub format: ExplainFormat,
    pub analyze: bool,
    pub verbose: bool,
}

/// Target of CREATE TABLE or CREATE TABLE AS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTableTarget {
    pub name: QualifiedObjectName,
    pub columns: Vec<ColumnMetadata>,
    /// `IF NOT EXISTS` on an existing table: nothing to do
    pub exists: bool,
}

/// Target of INSERT
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertTarget {
    pub table: QualifiedObjectName,
    /// Target columns in insertion order
    pub columns: Vec<String>,
}

/// Accumulated analysis of one statement
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    statement: Spanned<Statement>,
    parameters: Vec<Expr>,
    parameter_types: Vec<SqlType>,
    /// Parameter positions referenced by the statement
    parameter_usages: BTreeMap<usize, SqlType>,
    describe: bool,
    scopes: ScopeArena,
    node_scopes: IndexMap<NodeId, ScopeId>,
    resolved_fields: IndexMap<NodeId, ResolvedField>,
    expression_types: IndexMap<NodeId, SqlType>,
    resolved_functions: IndexMap<NodeId, ResolvedFunction>,
    tables: IndexMap<NodeId, TableSchema>,
    query_outputs: IndexMap<NodeId, Vec<Field>>,
    aggregates: IndexMap<NodeId, Vec<Expr>>,
    window_functions: IndexMap<NodeId, Vec<Expr>>,
    group_by: IndexMap<NodeId, Vec<Expr>>,
    /// ORDER BY items naming a select output, by output index
    output_references: IndexMap<NodeId, usize>,
    output_columns: Vec<OutputColumn>,
    statement_kind: Option<StatementKind>,
    update_type: Option<String>,
    explain: Option<ExplainOptions>,
    describe_rows: Vec<DescribeRow>,
    create_table: Option<CreateTableTarget>,
    insert: Option<InsertTarget>,
    delete_target: Option<QualifiedObjectName>,
}

fn set_once<V>(map: &mut IndexMap<NodeId, V>, node: NodeId, value: V, what: &str) -> Result<()> {
    match map.entry(node) {
        Entry::Occupied(_) => Err(SemanticError::internal(format!(
            "{what} already recorded for node {node}"
        ))
        .with_node(node)),
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

impl Analysis {
    pub fn new(statement: Spanned<Statement>, parameters: Vec<Expr>, describe: bool) -> Self {
        Self {
            statement,
            parameters,
            parameter_types: Vec::new(),
            parameter_usages: BTreeMap::new(),
            describe,
            scopes: ScopeArena::new(),
            node_scopes: IndexMap::new(),
            resolved_fields: IndexMap::new(),
            expression_types: IndexMap::new(),
            resolved_functions: IndexMap::new(),
            tables: IndexMap::new(),
            query_outputs: IndexMap::new(),
            aggregates: IndexMap::new(),
            window_functions: IndexMap::new(),
            group_by: IndexMap::new(),
            output_references: IndexMap::new(),
            output_columns: Vec::new(),
            statement_kind: None,
            update_type: None,
            explain: None,
            describe_rows: Vec::new(),
            create_table: None,
            insert: None,
            delete_target: None,
        }
    }

    /// The statement after rewriting
    pub fn statement(&self) -> &Spanned<Statement> {
        &self.statement
    }

    pub fn parameters(&self) -> &[Expr] {
        &self.parameters
    }

    pub fn parameter_types(&self) -> &[SqlType] {
        &self.parameter_types
    }

    /// Referenced parameter positions with their types, in position order
    pub fn parameter_usages(&self) -> impl Iterator<Item = (usize, SqlType)> + '_ {
        self.parameter_usages.iter().map(|(p, t)| (*p, *t))
    }

    /// Parameters are typed `unknown` and need not be bound
    pub fn is_describe(&self) -> bool {
        self.describe
    }

    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    pub fn resolved_field(&self, node: NodeId) -> Option<&ResolvedField> {
        self.resolved_fields.get(&node)
    }

    pub fn resolved_fields(&self) -> impl Iterator<Item = (NodeId, &ResolvedField)> {
        self.resolved_fields.iter().map(|(n, f)| (*n, f))
    }

    pub fn expression_type(&self, node: NodeId) -> Option<SqlType> {
        self.expression_types.get(&node).copied()
    }

    pub fn type_of(&self, expr: &Expr) -> Option<SqlType> {
        self.expression_type(expr.id)
    }

    pub fn resolved_function(&self, node: NodeId) -> Option<&ResolvedFunction> {
        self.resolved_functions.get(&node)
    }

    /// Tables referenced by the statement, by relation node, in first-seen order
    pub fn tables(&self) -> impl Iterator<Item = (NodeId, &TableSchema)> {
        self.tables.iter().map(|(n, t)| (*n, t))
    }

    pub fn table(&self, node: NodeId) -> Option<&TableSchema> {
        self.tables.get(&node)
    }

    /// Output fields of a query node
    pub fn query_output(&self, node: NodeId) -> Option<&[Field]> {
        self.query_outputs.get(&node).map(Vec::as_slice)
    }

    /// Aggregate calls of a SELECT, empty if it has none
    pub fn aggregates(&self, select: NodeId) -> &[Expr] {
        self.aggregates.get(&select).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn window_functions(&self, select: NodeId) -> &[Expr] {
        self.window_functions.get(&select).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn group_by(&self, select: NodeId) -> &[Expr] {
        self.group_by.get(&select).map(Vec::as_slice).unwrap_or_default()
    }

    /// A SELECT is aggregated when it groups or computes any aggregate
    pub fn is_aggregated(&self, select: NodeId) -> bool {
        !self.aggregates(select).is_empty() || !self.group_by(select).is_empty()
    }

    pub fn output_reference(&self, node: NodeId) -> Option<usize> {
        self.output_references.get(&node).copied()
    }

    pub fn output_columns(&self) -> &[OutputColumn] {
        &self.output_columns
    }

    pub fn statement_kind(&self) -> Option<StatementKind> {
        self.statement_kind
    }

    /// `CREATE TABLE`, `CREATE TABLE AS`, `INSERT` or `DELETE`
    pub fn update_type(&self) -> Option<&str> {
        self.update_type.as_deref()
    }

    pub fn explain_options(&self) -> Option<&ExplainOptions> {
        self.explain.as_ref()
    }

    pub fn describe_rows(&self) -> &[DescribeRow] {
        &self.describe_rows
    }

    pub fn create_table(&self) -> Option<&CreateTableTarget> {
        self.create_table.as_ref()
    }

    pub fn insert_target(&self) -> Option<&InsertTarget> {
        self.insert.as_ref()
    }

    pub fn delete_target(&self) -> Option<&QualifiedObjectName> {
        self.delete_target.as_ref()
    }

    pub(crate) fn scopes_mut(&mut self) -> &mut ScopeArena {
        &mut self.scopes
    }

    pub(crate) fn set_describe(&mut self, describe: bool) {
        self.describe = describe;
    }

    pub(crate) fn set_parameter_types(&mut self, types: Vec<SqlType>) {
        self.parameter_types = types;
    }

    /// A known type replaces an `unknown` one; `unknown` never replaces a
    /// known type
    pub(crate) fn record_parameter_usage(&mut self, position: usize, data_type: SqlType) {
        let slot = self.parameter_usages.entry(position).or_insert(data_type);
        if slot.is_unknown() {
            *slot = data_type;
        }
    }

    pub(crate) fn record_scope(&mut self, node: NodeId, scope: ScopeId) -> Result<()> {
        set_once(&mut self.node_scopes, node, scope, "Scope")
    }

    pub(crate) fn record_field(&mut self, node: NodeId, field: ResolvedField) -> Result<()> {
        set_once(&mut self.resolved_fields, node, field, "Column resolution")
    }

    pub(crate) fn record_type(&mut self, node: NodeId, data_type: SqlType) -> Result<()> {
        set_once(&mut self.expression_types, node, data_type, "Expression type")
    }

    pub(crate) fn record_function(&mut self, node: NodeId, function: ResolvedFunction) -> Result<()> {
        set_once(&mut self.resolved_functions, node, function, "Function resolution")
    }

    pub(crate) fn record_table(&mut self, node: NodeId, table: TableSchema) -> Result<()> {
        set_once(&mut self.tables, node, table, "Table")
    }

    pub(crate) fn record_query_output(&mut self, node: NodeId, fields: Vec<Field>) -> Result<()> {
        set_once(&mut self.query_outputs, node, fields, "Query output")
    }

    pub(crate) fn record_aggregation(
        &mut self,
        select: NodeId,
        aggregates: Vec<Expr>,
        window_functions: Vec<Expr>,
        group_by: Vec<Expr>,
    ) -> Result<()> {
        set_once(&mut self.aggregates, select, aggregates, "Aggregates")?;
        set_once(&mut self.window_functions, select, window_functions, "Window functions")?;
        set_once(&mut self.group_by, select, group_by, "Grouping")
    }

    pub(crate) fn record_output_reference(&mut self, node: NodeId, index: usize) -> Result<()> {
        set_once(&mut self.output_references, node, index, "Output reference")
    }

    pub(crate) fn set_output_columns(&mut self, columns: Vec<OutputColumn>) {
        self.output_columns = columns;
    }

    pub(crate) fn set_statement_kind(&mut self, kind: StatementKind) {
        self.statement_kind = Some(kind);
    }

    pub(crate) fn set_update_type(&mut self, update_type: Option<&str>) {
        self.update_type = update_type.map(str::to_string);
    }

    pub(crate) fn set_explain(&mut self, options: ExplainOptions) {
        self.explain = Some(options);
    }

    pub(crate) fn set_describe_rows(&mut self, rows: Vec<DescribeRow>) {
        self.describe_rows = rows;
    }

    pub(crate) fn set_create_table(&mut self, target: CreateTableTarget) {
        self.create_table = Some(target);
    }

    pub(crate) fn set_insert_target(&mut self, target: InsertTarget) {
        self.insert = Some(target);
    }

    pub(crate) fn set_delete_target(&mut self, table: QualifiedObjectName) {
        self.delete_target = Some(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlscope_ast::{Query, Select, SelectItem, Span};
    use sqlscope_diagnostics::SQL0550;

    fn analysis() -> Analysis {
        let query = Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]));
        Analysis::new(Statement::from(query).spanned(Span::SYNTHETIC), vec![], false)
    }

    #[test]
    fn test_second_write_is_internal_error() {
        let mut analysis = analysis();
        let node = NodeId::next();
        analysis.record_type(node, SqlType::Integer).unwrap();
        let err = analysis.record_type(node, SqlType::BigInt).unwrap_err();
        assert_eq!(err.code, SQL0550);
        assert_eq!(err.node, Some(node));
        assert_eq!(analysis.expression_type(node), Some(SqlType::Integer));
    }

    #[test]
    fn test_aggregation_defaults_to_empty() {
        let mut analysis = analysis();
        let select = NodeId::next();
        assert!(analysis.aggregates(select).is_empty());
        assert!(!analysis.is_aggregated(select));

        analysis
            .record_aggregation(select, vec![], vec![], vec![Expr::identifier("a")])
            .unwrap();
        assert!(analysis.is_aggregated(select));
    }

    #[test]
    fn test_unnamed_output_column() {
        let field = Field::new(None, SqlType::Integer);
        assert_eq!(OutputColumn::from_field(2, &field).name, "_col2");
    }

    #[test]
    fn test_parameter_usages_are_ordered() {
        let mut analysis = analysis();
        analysis.record_parameter_usage(2, SqlType::Unknown);
        analysis.record_parameter_usage(0, SqlType::Varchar);
        analysis.record_parameter_usage(2, SqlType::BigInt);
        analysis.record_parameter_usage(2, SqlType::Unknown);
        let usages: Vec<_> = analysis.parameter_usages().collect();
        assert_eq!(usages, vec![(0, SqlType::Varchar), (2, SqlType::BigInt)]);
    }
}
