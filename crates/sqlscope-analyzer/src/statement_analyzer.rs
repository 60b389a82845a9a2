//! Statement and query block analysis
//!
//! One recursive walk over the rewritten statement. Each query block gets a
//! frame in the scope arena; its clauses are resolved in the order
//! FROM, WHERE, GROUP BY, select list, HAVING, ORDER BY, and the results
//! are written straight into the [`Analysis`].

use sqlscope_ast::{
    CreateTable, CreateTableAsSelect, Delete, DescribeKind, Described, Explain, ExplainFormat,
    ExplainOption, ExplainType, Expr, ExprKind, Identifier, Insert, Join, JoinCriteria, Literal,
    QualifiedName, Query, QueryBody, Relation, RelationKind, Select, SelectItem,
    SetOperation, SetOperator, SortItem, Span, Spanned, Statement, Values,
};
use sqlscope_catalog::{
    AccessControl, ColumnMetadata, FunctionRegistry, Metadata, QualifiedObjectName, Session,
    TableSchema,
};
use sqlscope_diagnostics::{
    SQL0101, SQL0102, SQL0200, SQL0201, SQL0203, SQL0204, SQL0205, SQL0208, SQL0209, SQL0210,
    SQL0212, SQL0213, SQL0300, SQL0302, SQL0403,
};
use sqlscope_types::{SqlType, TypeCoercer};

use crate::analysis::{
    Analysis, CreateTableTarget, DescribeRow, ExplainOptions, InsertTarget, OutputColumn,
    ResolvedField, StatementKind,
};
use crate::error::{Result, SemanticError};
use crate::scope::{
    Field, FieldRef, NamedQuery, RelationAlias, ScopeArena, ScopeId, ScopeKind, ScopeRelation, UsingColumn,
};
use crate::validate::{
    select_aggregation, verify_boolean, verify_grouping, verify_no_aggregates_or_window_functions,
    verify_no_window_functions, Clause,
};

/// Identifies a field of a frame: `(scope, relation, field)`
pub type FieldKey = (ScopeId, usize, usize);

/// Collaborators consulted during analysis
#[derive(Clone, Copy)]
pub struct AnalyzerContext<'a> {
    pub session: &'a Session,
    pub metadata: &'a dyn Metadata,
    pub functions: &'a dyn FunctionRegistry,
    pub access_control: &'a dyn AccessControl,
    pub coercer: TypeCoercer,
}

/// Walks one statement, filling in an [`Analysis`]
pub struct StatementAnalyzer<'a> {
    pub ctx: AnalyzerContext<'a>,
    pub analysis: &'a mut Analysis,
}

/// A column of a SELECT's output and where it came from
struct SelectOutput<'q> {
    field: Field,
    /// The select expression; `None` for `*` expansions
    expr: Option<&'q Expr>,
    /// The bound field, for plain column references and `*` expansions
    key: Option<FieldKey>,
}

impl SelectOutput<'_> {
    fn same_as(&self, other: &SelectOutput<'_>) -> bool {
        match (self.key, other.key) {
            (Some(a), Some(b)) if a == b => return true,
            _ => {}
        }
        matches!((self.expr, other.expr), (Some(a), Some(b)) if a.equivalent(b))
    }
}

fn set_operator_name(op: SetOperator) -> &'static str {
    match op {
        SetOperator::Union => "UNION",
        SetOperator::Intersect => "INTERSECT",
        SetOperator::Except => "EXCEPT",
    }
}

/// Integer literal used as a 1-based position
fn ordinal(expr: &Expr) -> Option<i64> {
    match expr.kind {
        ExprKind::Literal(Literal::Integer(value)) => Some(value),
        _ => None,
    }
}

fn rows_output() -> Vec<OutputColumn> {
    vec![OutputColumn::new("rows", SqlType::BigInt)]
}

fn duplicate_column(name: &str) -> SemanticError {
    SemanticError::new(SQL0210, format!("Column name '{name}' specified more than once"))
}

impl<'a> StatementAnalyzer<'a> {
    pub fn new(ctx: AnalyzerContext<'a>, analysis: &'a mut Analysis) -> Self {
        Self { ctx, analysis }
    }

    pub fn scopes(&mut self) -> &mut ScopeArena {
        self.analysis.scopes_mut()
    }

    /// Analyze `statement`, binding the analysis parameters first
    pub fn analyze(&mut self, statement: &Spanned<Statement>) -> Result<()> {
        self.bind_parameters()?;
        self.analyze_statement(statement, ScopeArena::root())
    }

    /// Type the bound parameter values in a frame of their own
    fn bind_parameters(&mut self) -> Result<()> {
        let parameters = self.analysis.parameters().to_vec();
        if parameters.is_empty() {
            return Ok(());
        }
        let scope = self.scopes().push(ScopeKind::Root, None);
        let types = parameters
            .iter()
            .map(|p| self.analyze_expression(p, scope))
            .collect::<Result<Vec<_>>>()?;
        log::trace!("bound {} parameter(s)", types.len());
        self.analysis.set_parameter_types(types);
        Ok(())
    }

    fn analyze_statement(&mut self, statement: &Spanned<Statement>, scope: ScopeId) -> Result<()> {
        log::debug!("analyzing {}", statement.kind_name());
        let result = match &statement.inner {
            Statement::Query(query) => self.analyze_query_statement(query, scope),
            Statement::CreateTable(create) => self.analyze_create_table(create),
            Statement::CreateTableAsSelect(create) => self.analyze_create_table_as(create, scope),
            Statement::Insert(insert) => self.analyze_insert(insert, scope),
            Statement::Delete(delete) => self.analyze_delete(delete, scope),
            Statement::Explain(explain) => self.analyze_explain(explain),
            Statement::Described(described) => self.analyze_described(described),
            Statement::DescribeInput(_)
            | Statement::DescribeOutput(_)
            | Statement::ShowCatalogs(_)
            | Statement::ShowSchemas(_)
            | Statement::ShowTables(_)
            | Statement::ShowColumns(_)
            | Statement::ShowFunctions(_) => Err(SemanticError::internal(format!(
                "Statement was not rewritten before analysis: {}",
                statement.kind_name()
            ))),
        };
        result.map_err(|e| e.or_span(statement.span))
    }

    fn analyze_query_statement(&mut self, query: &Query, scope: ScopeId) -> Result<()> {
        let fields = self.analyze_query(query, scope, ScopeKind::Query)?;
        self.analysis.set_output_columns(
            fields
                .iter()
                .enumerate()
                .map(|(i, f)| OutputColumn::from_field(i, f))
                .collect(),
        );
        self.analysis.set_statement_kind(StatementKind::Query);
        self.analysis.set_update_type(None);
        Ok(())
    }

    // ---- catalog ----------------------------------------------------------

    fn session_catalog(&self) -> Result<String> {
        self.ctx.session.catalog.clone().ok_or_else(|| {
            SemanticError::new(SQL0101, "Catalog must be specified when session catalog is not set")
        })
    }

    fn session_schema(&self) -> Result<String> {
        self.ctx.session.schema.clone().ok_or_else(|| {
            SemanticError::new(SQL0102, "Schema must be specified when session schema is not set")
        })
    }

    /// Fill in missing catalog and schema from the session
    fn qualify(&self, name: &QualifiedName) -> Result<QualifiedObjectName> {
        let parts = name.canonical_parts();
        match parts.as_slice() {
            [table] => Ok(QualifiedObjectName::new(
                self.session_catalog()?,
                self.session_schema()?,
                table.clone(),
            )),
            [schema, table] => Ok(QualifiedObjectName::new(
                self.session_catalog()?,
                schema.clone(),
                table.clone(),
            )),
            [catalog, schema, table] => Ok(QualifiedObjectName::new(
                catalog.clone(),
                schema.clone(),
                table.clone(),
            )),
            _ => Err(SemanticError::new(
                SQL0200,
                format!("Too many dots in table name: {name}"),
            )),
        }
    }

    fn ensure_schema(&self, name: &QualifiedObjectName) -> Result<()> {
        if !self.ctx.metadata.catalog_exists(&name.catalog) {
            return Err(SemanticError::new(
                SQL0203,
                format!("Catalog '{}' does not exist", name.catalog),
            ));
        }
        if !self.ctx.metadata.schema_exists(&name.catalog, &name.schema) {
            return Err(SemanticError::new(
                SQL0204,
                format!("Schema '{}.{}' does not exist", name.catalog, name.schema),
            ));
        }
        Ok(())
    }

    fn lookup_table(&self, name: &QualifiedObjectName) -> Result<TableSchema> {
        self.ensure_schema(name)?;
        self.ctx
            .metadata
            .get_table(name)
            .ok_or_else(|| SemanticError::new(SQL0200, format!("Table '{name}' does not exist")))
    }

    fn table_fields(table: &TableSchema) -> Vec<Field> {
        table
            .columns
            .iter()
            .map(|c| Field::column(&table.name, &c.name, c.data_type, c.hidden))
            .collect()
    }

    // ---- queries ----------------------------------------------------------

    /// Analyze a query under `parent` and return its output fields
    pub fn analyze_query(&mut self, query: &Query, parent: ScopeId, kind: ScopeKind) -> Result<Vec<Field>> {
        let mut outer = parent;
        if let Some(with) = &query.with {
            if with.recursive {
                return Err(SemanticError::not_supported("Recursive WITH queries are not supported")
                    .at(query.id, query.span));
            }
            let with_scope = self.scopes().push(ScopeKind::With, Some(parent));
            for named in &with.queries {
                let fields = self.analyze_query(&named.query, with_scope, ScopeKind::Subquery)?;
                let name = named.name.canonical();
                let fields = Self::apply_column_aliases(fields, named.column_aliases.as_deref(), &name)
                    .map_err(|e| e.or_span(named.span))?;
                self.scopes()
                    .add_named_query(
                        with_scope,
                        &name,
                        NamedQuery {
                            node: named.query.id,
                            fields,
                        },
                    )
                    .map_err(|e| e.with_span(named.span))?;
            }
            outer = with_scope;
        }

        let scope = self.scopes().push(kind, Some(outer));
        self.analysis.record_scope(query.id, scope)?;

        let (fields, ordered) = match &query.body {
            QueryBody::Select(select) => (self.analyze_select(query, select, scope)?, true),
            QueryBody::SetOperation(operation) => (self.analyze_set_operation(operation, scope)?, false),
            QueryBody::Values(values) => (self.analyze_values(values, scope)?, false),
            QueryBody::Nested(inner) => (self.analyze_query(inner, scope, ScopeKind::Subquery)?, false),
        };
        if !ordered && !query.order_by.is_empty() {
            // ORDER BY of a set operation or VALUES sees only the output columns
            self.scopes()
                .add_relation(scope, ScopeRelation::new(query.id, None, fields.clone()))?;
            let outputs: Vec<SelectOutput<'_>> = fields
                .iter()
                .map(|field| SelectOutput {
                    field: field.clone(),
                    expr: None,
                    key: None,
                })
                .collect();
            self.analyze_order_by(&query.order_by, scope, &outputs, false)?;
        }

        self.analysis.record_query_output(query.id, fields.clone())?;
        log::trace!("exit {scope} with {} output field(s)", fields.len());
        Ok(fields)
    }

    fn analyze_select(&mut self, query: &Query, select: &Select, scope: ScopeId) -> Result<Vec<Field>> {
        let functions = self.ctx.functions;
        self.analysis.record_scope(select.id, scope)?;

        for relation in &select.from {
            self.analyze_relation(relation, scope)?;
        }

        if let Some(predicate) = &select.where_clause {
            verify_no_aggregates_or_window_functions(functions, [predicate], Clause::Where)?;
            let ty = self.analyze_expression(predicate, scope)?;
            verify_boolean(ty, predicate, "WHERE clause")?;
        }

        verify_no_aggregates_or_window_functions(functions, &select.group_by, Clause::GroupBy)?;
        for key in select.group_by.iter().filter(|k| ordinal(k).is_none()) {
            self.analyze_expression(key, scope)?;
        }

        let mut outputs: Vec<SelectOutput<'_>> = Vec::with_capacity(select.items.len());
        let mut wildcard_fields = Vec::new();
        for item in &select.items {
            match item {
                SelectItem::Expr { expr, alias } => {
                    let output = self.analyze_select_expression(expr, alias.as_ref(), scope)?;
                    outputs.push(output);
                }
                SelectItem::Wildcard { qualifier, span } => {
                    for (key, field) in self.expand_wildcard(qualifier.as_ref(), scope, *span)? {
                        wildcard_fields.push((key, field.name.clone().unwrap_or_default()));
                        outputs.push(SelectOutput {
                            field,
                            expr: None,
                            key: Some(key),
                        });
                    }
                }
            }
        }

        if let Some(having) = &select.having {
            verify_no_window_functions(having, Clause::Having)?;
            let ty = self.analyze_expression(having, scope)?;
            verify_boolean(ty, having, "HAVING clause")?;
        }

        let keys = self.grouping_keys(select, &outputs)?;
        verify_no_aggregates_or_window_functions(functions, keys.iter().copied(), Clause::GroupBy)?;
        self.analyze_order_by(&query.order_by, scope, &outputs, select.distinct)?;

        let (aggregates, windows) = select_aggregation(functions, select, &query.order_by);
        let aggregated = !keys.is_empty() || !aggregates.is_empty() || select.having.is_some();
        self.analysis.record_aggregation(
            select.id,
            aggregates,
            windows,
            keys.iter().map(|k| (*k).clone()).collect(),
        )?;
        if aggregated {
            verify_grouping(
                &*self.analysis,
                functions,
                select,
                &keys,
                &query.order_by,
                &wildcard_fields,
            )?;
        }

        Ok(outputs.into_iter().map(|o| o.field).collect())
    }

    fn analyze_select_expression<'q>(
        &mut self,
        expr: &'q Expr,
        alias: Option<&Identifier>,
        scope: ScopeId,
    ) -> Result<SelectOutput<'q>> {
        let data_type = self.analyze_expression(expr, scope)?;
        let resolved = self.analysis.resolved_field(expr.id).cloned();
        let (key, origin, column_name) = match &resolved {
            Some(field) => {
                let origin = self
                    .analysis
                    .scopes()
                    .field(&FieldRef {
                        scope: field.scope,
                        relation: field.relation,
                        field: field.field_index,
                        correlated: field.correlated,
                    })?
                    .origin
                    .clone();
                (Some(field.key()), origin, Some(field.name.clone()))
            }
            None => (None, None, None),
        };
        let name = alias
            .map(Identifier::canonical)
            .or(column_name)
            .unwrap_or_else(|| expr.to_string());
        Ok(SelectOutput {
            field: Field::new(Some(name), data_type)
                .with_origin(origin)
                .aliased(alias.is_some()),
            expr: Some(expr),
            key,
        })
    }

    /// Visible fields a `*` or `t.*` item expands to
    fn expand_wildcard(
        &mut self,
        qualifier: Option<&QualifiedName>,
        scope: ScopeId,
        span: Span,
    ) -> Result<Vec<(FieldKey, Field)>> {
        let parts = qualifier.map(QualifiedName::canonical_parts).unwrap_or_default();
        let indices = self.analysis.scopes().wildcard_relations(scope, &parts)?;
        if indices.is_empty() {
            let err = match qualifier {
                Some(q) => SemanticError::new(SQL0201, format!("Unable to resolve reference {q}")),
                None => SemanticError::not_supported("SELECT * not allowed in queries without FROM clause"),
            };
            return Err(err.with_span(span));
        }

        let hide = self.ctx.session.properties.hide_inaccessible_columns;
        let identity = &self.ctx.session.identity;
        let mut expanded = Vec::new();
        for index in indices {
            let relation = self.analysis.scopes().relation(scope, index)?.clone();
            let mut denied: Vec<&str> = Vec::new();
            let mut table = None;
            for (field_index, field) in relation.visible_fields() {
                if let Some(origin) = &field.origin {
                    if !self
                        .ctx
                        .access_control
                        .can_select_column(identity, &origin.table, &origin.column)
                    {
                        if !hide {
                            denied.push(origin.column.as_str());
                            table.get_or_insert(&origin.table);
                        }
                        log::trace!("{}: dropping inaccessible column {}", origin.table, origin.column);
                        continue;
                    }
                }
                expanded.push(((scope, index, field_index), field.clone().aliased(false)));
            }
            if let Some(table) = table {
                return Err(SemanticError::access_denied(format!(
                    "Cannot select from columns [{}] in table or view {table}",
                    denied.join(", ")
                ))
                .with_span(span));
            }
        }
        Ok(expanded)
    }

    /// GROUP BY keys with ordinals replaced by the select expression they name
    fn grouping_keys<'q>(&mut self, select: &'q Select, outputs: &[SelectOutput<'q>]) -> Result<Vec<&'q Expr>> {
        let mut keys = Vec::with_capacity(select.group_by.len());
        for key in &select.group_by {
            let Some(position) = ordinal(key) else {
                keys.push(key);
                continue;
            };
            let index = usize::try_from(position)
                .ok()
                .and_then(|p| p.checked_sub(1))
                .filter(|i| *i < outputs.len())
                .ok_or_else(|| {
                    SemanticError::new(
                        SQL0201,
                        format!("GROUP BY position {position} is not in select list"),
                    )
                    .at(key.id, key.span)
                })?;
            let output = &outputs[index];
            let Some(expr) = output.expr else {
                return Err(SemanticError::not_supported(
                    "GROUP BY position of a column expanded from *",
                )
                .at(key.id, key.span));
            };
            self.analysis.record_output_reference(key.id, index)?;
            self.analysis.record_type(key.id, output.field.data_type)?;
            keys.push(expr);
        }
        Ok(keys)
    }

    /// ORDER BY items may name a select output by position or by name;
    /// anything else resolves against the query's own relations
    fn analyze_order_by(
        &mut self,
        items: &[SortItem],
        scope: ScopeId,
        outputs: &[SelectOutput<'_>],
        distinct: bool,
    ) -> Result<()> {
        for item in items {
            let expr = &item.expr;
            if let Some(position) = ordinal(expr) {
                let index = usize::try_from(position)
                    .ok()
                    .and_then(|p| p.checked_sub(1))
                    .filter(|i| *i < outputs.len())
                    .ok_or_else(|| {
                        SemanticError::new(
                            SQL0201,
                            format!("ORDER BY position {position} is not in select list"),
                        )
                        .at(expr.id, expr.span)
                    })?;
                self.analysis.record_output_reference(expr.id, index)?;
                self.analysis.record_type(expr.id, outputs[index].field.data_type)?;
                continue;
            }

            if let ExprKind::Identifier(ident) = &expr.kind {
                let name = ident.canonical();
                let matching: Vec<usize> = outputs
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.field.name.as_deref() == Some(name.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                if let Some(&first) = matching.first() {
                    if matching[1..]
                        .iter()
                        .any(|&i| !outputs[i].same_as(&outputs[first]))
                    {
                        return Err(SemanticError::new(
                            SQL0205,
                            format!("'{name}' in ORDER BY is ambiguous"),
                        )
                        .at(expr.id, expr.span));
                    }
                    self.analysis.record_output_reference(expr.id, first)?;
                    self.analysis.record_type(expr.id, outputs[first].field.data_type)?;
                    continue;
                }
            }

            self.analyze_expression(expr, scope)?;
            let bound = self.analysis.resolved_field(expr.id).map(ResolvedField::key);
            if distinct
                && !outputs.iter().any(|o| {
                    o.expr.is_some_and(|e| e.equivalent(expr)) || (bound.is_some() && o.key == bound)
                })
            {
                return Err(SemanticError::new(
                    SQL0403,
                    "For SELECT DISTINCT, ORDER BY expressions must appear in select list",
                )
                .at(expr.id, expr.span));
            }
        }
        Ok(())
    }

    fn analyze_set_operation(&mut self, operation: &SetOperation, scope: ScopeId) -> Result<Vec<Field>> {
        let left = self.analyze_query(&operation.left, scope, ScopeKind::Query)?;
        let right = self.analyze_query(&operation.right, scope, ScopeKind::Query)?;
        let name = set_operator_name(operation.op);
        if left.len() != right.len() {
            return Err(SemanticError::new(
                SQL0212,
                format!(
                    "{name} query has different number of fields: {}, {}",
                    left.len(),
                    right.len()
                ),
            )
            .at(operation.right.id, operation.right.span));
        }
        left.iter()
            .zip(&right)
            .enumerate()
            .map(|(i, (l, r))| {
                let data_type = self
                    .ctx
                    .coercer
                    .common_super_type(l.data_type, r.data_type)
                    .map_err(|_| {
                        SemanticError::new(
                            SQL0300,
                            format!(
                                "column {} in {name} query has incompatible types: {}, {}",
                                i + 1,
                                l.data_type,
                                r.data_type
                            ),
                        )
                        .at(operation.right.id, operation.right.span)
                    })?;
                let origin = if l.origin == r.origin { l.origin.clone() } else { None };
                Ok(Field::new(l.name.clone(), data_type)
                    .with_origin(origin)
                    .aliased(l.aliased))
            })
            .collect()
    }

    /// Rows must agree in size and have coercible column types
    fn analyze_values(&mut self, values: &Values, scope: ScopeId) -> Result<Vec<Field>> {
        verify_no_aggregates_or_window_functions(
            self.ctx.functions,
            values.rows.iter().flatten(),
            Clause::Values,
        )?;
        let mut column_types: Option<Vec<SqlType>> = None;
        for row in &values.rows {
            let row_types = row
                .iter()
                .map(|e| self.analyze_expression(e, scope))
                .collect::<Result<Vec<_>>>()?;
            column_types = Some(match column_types {
                None => row_types,
                Some(current) => {
                    if current.len() != row_types.len() {
                        return Err(SemanticError::new(
                            SQL0212,
                            format!(
                                "Values rows have mismatched sizes: {} vs {}",
                                current.len(),
                                row_types.len()
                            ),
                        )
                        .at(values.id, values.span));
                    }
                    current
                        .iter()
                        .zip(&row_types)
                        .map(|(a, b)| {
                            self.ctx.coercer.common_super_type(*a, *b).map_err(|_| {
                                SemanticError::new(
                                    SQL0300,
                                    format!("Values rows have mismatched types: {a} vs {b}"),
                                )
                                .at(values.id, values.span)
                            })
                        })
                        .collect::<Result<Vec<_>>>()?
                }
            });
        }
        self.analysis.record_scope(values.id, scope)?;
        Ok(column_types
            .unwrap_or_default()
            .into_iter()
            .map(|ty| Field::new(None, ty))
            .collect())
    }

    // ---- relations --------------------------------------------------------

    /// Add a FROM item to the frame, returning the indices of the relations
    /// it contributed
    fn analyze_relation(&mut self, relation: &Relation, scope: ScopeId) -> Result<Vec<usize>> {
        if let RelationKind::Join(join) = &relation.kind {
            return self.analyze_join(relation, join, scope);
        }
        let (alias, fields) = self.relation_fields(relation, scope)?;
        let index = self
            .scopes()
            .add_relation(scope, ScopeRelation::new(relation.id, alias, fields))
            .map_err(|e| e.with_span(relation.span))?;
        self.analysis.record_scope(relation.id, scope)?;
        Ok(vec![index])
    }

    /// Alias and fields of a non-join relation
    fn relation_fields(
        &mut self,
        relation: &Relation,
        scope: ScopeId,
    ) -> Result<(Option<RelationAlias>, Vec<Field>)> {
        match &relation.kind {
            RelationKind::Table(name) => self.analyze_table(relation, name, scope),
            RelationKind::Aliased {
                relation: inner,
                alias,
                column_aliases,
            } => {
                let (_, fields) = self.relation_fields(inner, scope)?;
                let name = alias.canonical();
                let fields = Self::apply_column_aliases(fields, column_aliases.as_deref(), &name)
                    .map_err(|e| e.at(relation.id, relation.span))?;
                Ok((Some(RelationAlias::named(name)), fields))
            }
            RelationKind::Subquery(query) => {
                let outer = self.enclosing(scope)?;
                Ok((None, self.analyze_query(query, outer, ScopeKind::Subquery)?))
            }
            RelationKind::Lateral(query) => {
                Ok((None, self.analyze_query(query, scope, ScopeKind::Lateral)?))
            }
            RelationKind::Values(values) => {
                let outer = self.enclosing(scope)?;
                Ok((None, self.analyze_values(values, outer)?))
            }
            RelationKind::Join(_) => Err(SemanticError::not_supported(
                "Aliasing a join is not supported",
            )
            .at(relation.id, relation.span)),
        }
    }

    /// Frame a derived table resolves in: the query's parent, so it sees
    /// WITH queries and outer blocks but not its sibling relations
    fn enclosing(&self, scope: ScopeId) -> Result<ScopeId> {
        self.analysis
            .scopes()
            .get(scope)?
            .parent()
            .ok_or_else(|| SemanticError::internal(format!("Query frame {scope} has no parent")))
    }

    fn analyze_table(
        &mut self,
        relation: &Relation,
        name: &QualifiedName,
        scope: ScopeId,
    ) -> Result<(Option<RelationAlias>, Vec<Field>)> {
        if name.len() == 1 {
            let cte_name = name.suffix().canonical();
            if let Some(named) = self.analysis.scopes().find_named_query(scope, &cte_name) {
                log::trace!("{name} resolved to WITH query");
                return Ok((Some(RelationAlias::named(cte_name)), named.fields.clone()));
            }
        }

        let located = |e: SemanticError| e.at(relation.id, relation.span);
        let qualified = self.qualify(name).map_err(located)?;
        let table = self.lookup_table(&qualified).map_err(located)?;
        if !self
            .ctx
            .access_control
            .can_select_table(&self.ctx.session.identity, &table.name)
        {
            return Err(located(SemanticError::access_denied(format!(
                "Cannot select from table {}",
                table.name
            ))));
        }
        log::trace!("{name} resolved to table {}", table.name);
        let alias = RelationAlias::table(&table.name);
        let fields = Self::table_fields(&table);
        self.analysis.record_table(relation.id, table)?;
        Ok((Some(alias), fields))
    }

    /// Rename the visible fields of a relation; hidden fields keep their names
    fn apply_column_aliases(
        fields: Vec<Field>,
        aliases: Option<&[Identifier]>,
        relation: &str,
    ) -> Result<Vec<Field>> {
        let Some(aliases) = aliases else {
            return Ok(fields);
        };
        let visible = fields.iter().filter(|f| !f.hidden).count();
        if aliases.len() != visible {
            return Err(SemanticError::new(
                SQL0208,
                format!(
                    "Column alias list has {} entries but '{relation}' has {visible} columns available",
                    aliases.len()
                ),
            ));
        }
        let mut names = aliases.iter().map(Identifier::canonical);
        Ok(fields
            .into_iter()
            .map(|field| match field.hidden {
                true => field,
                false => match names.next() {
                    Some(name) => field.renamed(name),
                    None => field,
                },
            })
            .collect())
    }

    fn analyze_join(&mut self, relation: &Relation, join: &Join, scope: ScopeId) -> Result<Vec<usize>> {
        let left = self.analyze_relation(&join.left, scope)?;
        let right = self.analyze_relation(&join.right, scope)?;
        self.analysis.record_scope(relation.id, scope)?;

        match &join.criteria {
            None => {}
            Some(JoinCriteria::On(predicate)) => {
                verify_no_aggregates_or_window_functions(self.ctx.functions, [predicate], Clause::Join)?;
                // ON sees the two sides of this join, not its comma-separated siblings
                let joined: Vec<usize> = left.iter().chain(&right).copied().collect();
                let previous = self.scopes().restrict_to_join(scope, Some(joined))?;
                let analyzed = self.analyze_expression(predicate, scope);
                self.scopes().restrict_to_join(scope, previous)?;
                verify_boolean(analyzed?, predicate, "JOIN ON clause")?;
            }
            Some(JoinCriteria::Using(columns)) => {
                for column in columns {
                    self.analyze_using_column(column, &left, &right, scope, relation)?;
                }
            }
            Some(JoinCriteria::Natural) => {
                return Err(SemanticError::not_supported("Natural join not supported")
                    .at(relation.id, relation.span));
            }
        }
        Ok(left.into_iter().chain(right).collect())
    }

    /// First relation of a join side with a field called `name`
    fn find_side_field(
        &self,
        scope: ScopeId,
        side: &[usize],
        name: &str,
    ) -> Result<Option<(usize, usize, SqlType)>> {
        for &index in side {
            let relation = self.analysis.scopes().relation(scope, index)?;
            if let Some(field) = relation
                .fields
                .iter()
                .position(|f| f.name.as_deref() == Some(name))
            {
                return Ok(Some((index, field, relation.fields[field].data_type)));
            }
        }
        Ok(None)
    }

    fn analyze_using_column(
        &mut self,
        column: &Identifier,
        left: &[usize],
        right: &[usize],
        scope: ScopeId,
        relation: &Relation,
    ) -> Result<()> {
        let name = column.canonical();
        let missing = |side: &str| {
            SemanticError::new(
                SQL0201,
                format!("Column '{name}' is missing from {side} side of join"),
            )
            .at(relation.id, relation.span)
        };
        let (left_relation, field, left_type) = self
            .find_side_field(scope, left, &name)?
            .ok_or_else(|| missing("left"))?;
        let (_, _, right_type) = self
            .find_side_field(scope, right, &name)?
            .ok_or_else(|| missing("right"))?;
        self.ctx
            .coercer
            .common_super_type(left_type, right_type)
            .map_err(|_| {
                SemanticError::new(
                    SQL0300,
                    format!("Column '{name}' in USING has incompatible types: {left_type}, {right_type}"),
                )
                .at(relation.id, relation.span)
            })?;
        self.scopes().add_using_column(
            scope,
            UsingColumn {
                name,
                relation: left_relation,
                field,
            },
        )
    }

    // ---- DDL / DML --------------------------------------------------------

    /// `Ok(true)` when the target exists and IF NOT EXISTS makes the
    /// statement a no-op
    fn check_create_target(&self, name: &QualifiedObjectName, not_exists: bool) -> Result<bool> {
        self.ensure_schema(name)?;
        if self.ctx.metadata.get_table(name).is_none() {
            return Ok(false);
        }
        if not_exists {
            log::debug!("{name} already exists; IF NOT EXISTS makes this a no-op");
            return Ok(true);
        }
        Err(SemanticError::new(SQL0209, format!("Table '{name}' already exists")))
    }

    fn check_create_access(&self, name: &QualifiedObjectName) -> Result<()> {
        if self
            .ctx
            .access_control
            .can_create_table(&self.ctx.session.identity, name)
        {
            Ok(())
        } else {
            Err(SemanticError::access_denied(format!("Cannot create table {name}")))
        }
    }

    fn analyze_create_table(&mut self, create: &CreateTable) -> Result<()> {
        let name = self.qualify(&create.name)?;
        self.analysis.set_statement_kind(StatementKind::CreateTable);
        self.analysis.set_update_type(Some("CREATE TABLE"));
        if self.check_create_target(&name, create.not_exists)? {
            self.analysis.set_create_table(CreateTableTarget {
                name,
                columns: Vec::new(),
                exists: true,
            });
            return Ok(());
        }

        let mut columns: Vec<ColumnMetadata> = Vec::with_capacity(create.columns.len());
        for definition in &create.columns {
            let column = definition.name.canonical();
            if columns.iter().any(|c| c.name == column) {
                return Err(duplicate_column(&column).with_span(definition.span));
            }
            let data_type = SqlType::from_name(&definition.data_type.name)
                .filter(|ty| !ty.is_unknown())
                .ok_or_else(|| {
                    SemanticError::new(
                        SQL0302,
                        format!("Unknown type '{}' for column '{column}'", definition.data_type),
                    )
                    .with_span(definition.span)
                })?;
            columns.push(ColumnMetadata::new(column, data_type));
        }
        self.check_create_access(&name)?;
        self.analysis.set_create_table(CreateTableTarget {
            name,
            columns,
            exists: false,
        });
        Ok(())
    }

    fn analyze_create_table_as(&mut self, create: &CreateTableAsSelect, scope: ScopeId) -> Result<()> {
        let name = self.qualify(&create.name)?;
        let exists = self.check_create_target(&name, create.not_exists)?;
        if !exists {
            let fields = self.analyze_query(&create.query, scope, ScopeKind::Query)?;
            let names: Vec<String> = match &create.column_aliases {
                Some(aliases) => {
                    if aliases.len() != fields.len() {
                        return Err(SemanticError::new(
                            SQL0208,
                            format!(
                                "Column alias list has {} entries but query has {} columns",
                                aliases.len(),
                                fields.len()
                            ),
                        ));
                    }
                    aliases.iter().map(Identifier::canonical).collect()
                }
                None => fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        f.name.clone().ok_or_else(|| {
                            SemanticError::new(
                                SQL0213,
                                format!("Column name not specified at position {}", i + 1),
                            )
                        })
                    })
                    .collect::<Result<_>>()?,
            };

            let mut columns: Vec<ColumnMetadata> = Vec::with_capacity(names.len());
            for (column, field) in names.into_iter().zip(&fields) {
                if columns.iter().any(|c| c.name == column) {
                    return Err(duplicate_column(&column));
                }
                if field.data_type.is_unknown() {
                    return Err(SemanticError::new(
                        SQL0302,
                        format!("Column type is unknown: {column}"),
                    ));
                }
                columns.push(ColumnMetadata::new(column, field.data_type));
            }
            self.check_create_access(&name)?;
            self.analysis.set_create_table(CreateTableTarget {
                name,
                columns,
                exists: false,
            });
        } else {
            self.analysis.set_create_table(CreateTableTarget {
                name,
                columns: Vec::new(),
                exists: true,
            });
        }
        self.analysis.set_output_columns(rows_output());
        self.analysis.set_statement_kind(StatementKind::CreateTableAsSelect);
        self.analysis.set_update_type(Some("CREATE TABLE AS"));
        Ok(())
    }

    fn analyze_insert(&mut self, insert: &Insert, scope: ScopeId) -> Result<()> {
        let name = self.qualify(&insert.target)?;
        let table = self.lookup_table(&name)?;
        if !self
            .ctx
            .access_control
            .can_insert_into_table(&self.ctx.session.identity, &table.name)
        {
            return Err(SemanticError::access_denied(format!(
                "Cannot insert into table {}",
                table.name
            )));
        }

        let targets: Vec<&ColumnMetadata> = match &insert.columns {
            None => table.visible_columns().collect(),
            Some(columns) => {
                let mut targets: Vec<&ColumnMetadata> = Vec::with_capacity(columns.len());
                for column in columns {
                    let column_name = column.canonical();
                    let metadata = table.column(&column_name).ok_or_else(|| {
                        SemanticError::new(
                            SQL0201,
                            format!("Insert column name does not exist in target table: {column_name}"),
                        )
                    })?;
                    if targets.iter().any(|t| t.name.eq_ignore_ascii_case(&column_name)) {
                        return Err(SemanticError::new(
                            SQL0210,
                            format!("Insert column name is specified more than once: {column_name}"),
                        ));
                    }
                    targets.push(metadata);
                }
                targets
            }
        };

        let fields = self.analyze_query(&insert.query, scope, ScopeKind::Query)?;
        if fields.len() != targets.len() {
            return Err(SemanticError::new(
                SQL0212,
                format!(
                    "Insert query has mismatched column count: Table: {}, Query: {}",
                    targets.len(),
                    fields.len()
                ),
            )
            .at(insert.query.id, insert.query.span));
        }
        let coercible = targets
            .iter()
            .zip(&fields)
            .all(|(t, f)| self.ctx.coercer.can_coerce(f.data_type, t.data_type));
        if !coercible {
            let list = |types: Vec<SqlType>| {
                types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(SemanticError::new(
                SQL0300,
                format!(
                    "Insert query has mismatched column types: Table: [{}], Query: [{}]",
                    list(targets.iter().map(|t| t.data_type).collect()),
                    list(fields.iter().map(|f| f.data_type).collect())
                ),
            )
            .at(insert.query.id, insert.query.span));
        }

        let columns = targets.iter().map(|t| t.name.to_lowercase()).collect();
        self.analysis.set_insert_target(InsertTarget {
            table: table.name.clone(),
            columns,
        });
        self.analysis.set_output_columns(rows_output());
        self.analysis.set_statement_kind(StatementKind::Insert);
        self.analysis.set_update_type(Some("INSERT"));
        Ok(())
    }

    fn analyze_delete(&mut self, delete: &Delete, scope: ScopeId) -> Result<()> {
        let relation = &delete.table;
        let (table_node, name, alias) = match &relation.kind {
            RelationKind::Table(name) => (relation, name, None),
            RelationKind::Aliased {
                relation: inner,
                alias,
                column_aliases: None,
            } => match &inner.kind {
                RelationKind::Table(name) => (inner.as_ref(), name, Some(alias.canonical())),
                _ => return Err(Self::delete_target_error(relation)),
            },
            _ => return Err(Self::delete_target_error(relation)),
        };

        let located = |e: SemanticError| e.at(table_node.id, table_node.span);
        let qualified = self.qualify(name).map_err(located)?;
        let table = self.lookup_table(&qualified).map_err(located)?;
        if !self
            .ctx
            .access_control
            .can_delete_from_table(&self.ctx.session.identity, &table.name)
        {
            return Err(located(SemanticError::access_denied(format!(
                "Cannot delete from table {}",
                table.name
            ))));
        }

        let frame = self.scopes().push(ScopeKind::Query, Some(scope));
        let alias = alias.map_or_else(|| RelationAlias::table(&table.name), RelationAlias::named);
        let fields = Self::table_fields(&table);
        let target = table.name.clone();
        self.analysis.record_table(table_node.id, table)?;
        self.scopes()
            .add_relation(frame, ScopeRelation::new(relation.id, Some(alias), fields))?;
        self.analysis.record_scope(relation.id, frame)?;

        if let Some(predicate) = &delete.where_clause {
            verify_no_aggregates_or_window_functions(self.ctx.functions, [predicate], Clause::Where)?;
            let ty = self.analyze_expression(predicate, frame)?;
            verify_boolean(ty, predicate, "WHERE clause")?;
        }

        self.analysis.set_delete_target(target);
        self.analysis.set_output_columns(rows_output());
        self.analysis.set_statement_kind(StatementKind::Delete);
        self.analysis.set_update_type(Some("DELETE"));
        Ok(())
    }

    fn delete_target_error(relation: &Relation) -> SemanticError {
        SemanticError::not_supported("DELETE target must be a table").at(relation.id, relation.span)
    }

    // ---- EXPLAIN / DESCRIBE ----------------------------------------------

    fn analyze_explain(&mut self, explain: &Explain) -> Result<()> {
        let mut explain_type = if explain.analyze {
            ExplainType::Distributed
        } else {
            ExplainType::Logical
        };
        let mut format = ExplainFormat::Text;
        for option in &explain.options {
            match option {
                ExplainOption::Type(ty) => explain_type = *ty,
                ExplainOption::Format(f) => format = *f,
            }
        }

        let root = self.scopes().push(ScopeKind::Root, None);
        self.analyze_statement(&explain.statement, root)?;

        self.analysis.set_explain(ExplainOptions {
            explain_type,
            format,
            analyze: explain.analyze,
            verbose: explain.verbose,
        });
        self.analysis.set_statement_kind(StatementKind::Explain);
        self.analysis.set_update_type(None);
        self.analysis.set_output_columns(vec![match explain_type {
            ExplainType::Validate => OutputColumn::new("Valid", SqlType::Boolean),
            _ => OutputColumn::new("Query Plan", SqlType::Varchar),
        }]);
        Ok(())
    }

    fn analyze_described(&mut self, described: &Described) -> Result<()> {
        self.analysis.set_describe(true);
        let root = self.scopes().push(ScopeKind::Root, None);
        self.analyze_statement(&described.statement, root)?;

        match described.kind {
            DescribeKind::Output => {
                let rows = self
                    .analysis
                    .output_columns()
                    .iter()
                    .map(|column| {
                        let origin = column.origin.as_ref();
                        DescribeRow::Output {
                            column_name: column.name.clone(),
                            catalog: origin.map(|o| o.table.catalog.clone()),
                            schema: origin.map(|o| o.table.schema.clone()),
                            table: origin.map(|o| o.table.object.clone()),
                            data_type: column.data_type,
                            type_size: column.data_type.fixed_size(),
                            aliased: column.aliased,
                        }
                    })
                    .collect();
                self.analysis.set_describe_rows(rows);
                self.analysis.set_output_columns(vec![
                    OutputColumn::new("Column Name", SqlType::Varchar),
                    OutputColumn::new("Catalog", SqlType::Varchar),
                    OutputColumn::new("Schema", SqlType::Varchar),
                    OutputColumn::new("Table", SqlType::Varchar),
                    OutputColumn::new("Type", SqlType::Varchar),
                    OutputColumn::new("Type Size", SqlType::BigInt),
                    OutputColumn::new("Aliased", SqlType::Boolean),
                ]);
                self.analysis.set_statement_kind(StatementKind::DescribeOutput);
            }
            DescribeKind::Input => {
                let rows = self
                    .analysis
                    .parameter_usages()
                    .map(|(position, data_type)| DescribeRow::Input { position, data_type })
                    .collect();
                self.analysis.set_describe_rows(rows);
                self.analysis.set_output_columns(vec![
                    OutputColumn::new("Position", SqlType::BigInt),
                    OutputColumn::new("Type", SqlType::Varchar),
                ]);
                self.analysis.set_statement_kind(StatementKind::DescribeInput);
            }
        }
        self.analysis.set_update_type(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::StatementKind;
    use crate::analyzer::test_support::{analyze, analyze_with, analyzer_for, analyzer_with_session, select_from};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use sqlscope_ast::{
        ColumnDefinition, CreateTable, CreateTableAsSelect, Delete, Expr, FunctionCall, Identifier, Insert,
        JoinCriteria, JoinKind, QualifiedName, Query, Relation, Select, SelectItem, SetOperator, SortItem,
        Span, Statement, WindowSpec, With, WithQuery,
    };
    use sqlscope_catalog::{Session, SessionProperties};
    use sqlscope_diagnostics::{
        ErrorKind, SQL0101, SQL0200, SQL0201, SQL0203, SQL0204, SQL0205, SQL0206, SQL0207, SQL0208,
        SQL0209, SQL0210, SQL0212, SQL0213, SQL0300, SQL0302, SQL0400, SQL0403, SQL0500,
    };
    use sqlscope_types::SqlType;

    fn names(analysis: &crate::Analysis) -> Vec<String> {
        analysis.output_columns().iter().map(|c| c.name.clone()).collect()
    }

    fn query(select: Select) -> Statement {
        Statement::from(Query::select(select))
    }

    #[test]
    fn test_select_star_skips_hidden_columns() {
        let analysis = analyze(query(Select::new(vec![SelectItem::wildcard()]).from(Relation::table("orders")))).unwrap();
        assert_eq!(names(&analysis), vec!["id", "customer_id", "total", "status"]);
        assert_eq!(analysis.statement_kind(), Some(StatementKind::Query));
    }

    #[test]
    fn test_hidden_column_is_addressable_by_name() {
        let analysis = analyze(select_from("orders", vec![Expr::identifier("$row_id")])).unwrap();
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::BigInt);
    }

    #[test]
    fn test_qualified_wildcard() {
        let select = Select::new(vec![SelectItem::qualified_wildcard("c")])
            .from(Relation::table("orders").alias("o"))
            .from(Relation::table("customers").alias("c"));
        let analysis = analyze(query(select)).unwrap();
        assert_eq!(names(&analysis), vec!["id", "name", "region"]);
    }

    #[test]
    fn test_wildcard_with_unknown_qualifier() {
        let select = Select::new(vec![SelectItem::qualified_wildcard("x")]).from(Relation::table("orders"));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0201);
        assert_eq!(err.message, "Unable to resolve reference x");
    }

    #[test]
    fn test_wildcard_without_from() {
        let err = analyze(query(Select::new(vec![SelectItem::wildcard()]))).unwrap_err();
        assert_eq!(err.code, SQL0500);
    }

    #[test]
    fn test_wildcard_over_denied_column() {
        let statement = query(Select::new(vec![SelectItem::wildcard()]).from(Relation::table("orders")));
        let err = analyzer_for("bob")
            .analyze(statement.clone().spanned(Span::new(0, 22)), vec![], false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(
            err.message,
            "Access Denied: Cannot select from columns [customer_id] in table or view hive.web.orders"
        );

        let session = Session::new("bob")
            .with_catalog("hive")
            .with_schema("web")
            .with_properties(SessionProperties {
                hide_inaccessible_columns: true,
            });
        let analysis = analyzer_with_session(session)
            .analyze(statement.spanned(Span::new(0, 22)), vec![], false)
            .unwrap();
        assert_eq!(names(&analysis), vec!["id", "total", "status"]);
    }

    #[test]
    fn test_denied_table() {
        let err = analyzer_for("carol")
            .analyze(select_from("customers", vec![Expr::identifier("id")]).spanned(Span::new(0, 30)), vec![], false)
            .unwrap_err();
        assert_eq!(err.message, "Access Denied: Cannot select from table hive.web.customers");
    }

    #[rstest]
    #[case("nope", SQL0200, "Table 'hive.web.nope' does not exist")]
    #[case("other.orders", SQL0204, "Schema 'hive.other' does not exist")]
    #[case("lake.web.orders", SQL0203, "Catalog 'lake' does not exist")]
    #[case("a.b.c.d", SQL0200, "Too many dots in table name: a.b.c.d")]
    fn test_table_lookup_errors(
        #[case] table: &str,
        #[case] code: sqlscope_diagnostics::ErrorCode,
        #[case] message: &str,
    ) {
        let err = analyze(select_from(table, vec![Expr::integer(1)])).unwrap_err();
        assert_eq!(err.code, code);
        assert_eq!(err.message, message);
    }

    #[test]
    fn test_unqualified_table_without_session_catalog() {
        let err = analyzer_with_session(Session::new("alice"))
            .analyze(select_from("orders", vec![Expr::integer(1)]).spanned(Span::new(0, 10)), vec![], false)
            .unwrap_err();
        assert_eq!(err.code, SQL0101);
    }

    #[test]
    fn test_duplicate_alias() {
        let select = Select::new(vec![SelectItem::expr(Expr::integer(1))])
            .from(Relation::table("orders").alias("a"))
            .from(Relation::table("customers").alias("a"));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0206);
    }

    #[test]
    fn test_alias_hides_table_name() {
        let select = Select::new(vec![SelectItem::expr(Expr::column("orders.id"))])
            .from(Relation::table("orders").alias("o"));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0201);
    }

    #[test]
    fn test_column_aliases_on_derived_table() {
        let inner = Query::select(
            Select::new(vec![
                SelectItem::expr(Expr::identifier("id")),
                SelectItem::expr(Expr::identifier("total")),
            ])
            .from(Relation::table("orders")),
        );
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("amount"))])
            .from(Relation::subquery(inner.clone()).alias_with_columns("d", &["key", "amount"]));
        let analysis = analyze(query(select)).unwrap();
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Double);

        let select = Select::new(vec![SelectItem::expr(Expr::integer(1))])
            .from(Relation::subquery(inner).alias_with_columns("d", &["key"]));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0208);
        assert_eq!(err.message, "Column alias list has 1 entries but 'd' has 2 columns available");
    }

    #[test]
    fn test_derived_table_cannot_see_siblings() {
        let inner = Query::select(
            Select::new(vec![SelectItem::expr(Expr::column("o.id"))]).from(Relation::table("customers")),
        );
        let select = Select::new(vec![SelectItem::expr(Expr::integer(1))])
            .from(Relation::table("orders").alias("o"))
            .from(Relation::subquery(inner.clone()).alias("d"));
        assert_eq!(analyze(query(select)).unwrap_err().code, SQL0201);

        let select = Select::new(vec![SelectItem::expr(Expr::integer(1))])
            .from(Relation::table("orders").alias("o"))
            .from(Relation::lateral(inner).alias("d"));
        assert!(analyze(query(select)).is_ok());
    }

    #[test]
    fn test_with_query_and_column_aliases() {
        let cte = Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]));
        let mut outer = Query::select(Select::new(vec![SelectItem::expr(Expr::identifier("n"))]).from(Relation::table("w")));
        outer.with = Some(With {
            recursive: false,
            queries: vec![WithQuery {
                name: Identifier::new("W"),
                column_aliases: Some(vec![Identifier::new("n")]),
                query: Box::new(cte),
                span: Span::SYNTHETIC,
            }],
        });
        let analysis = analyze(Statement::from(outer)).unwrap();
        assert_eq!(names(&analysis), vec!["n"]);
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Integer);
    }

    #[test]
    fn test_duplicate_with_query() {
        let one = || Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]));
        let outer = Query::select(Select::new(vec![SelectItem::wildcard()]).from(Relation::table("a")))
            .with_query("a", one())
            .with_query("a", one());
        assert_eq!(analyze(Statement::from(outer)).unwrap_err().code, SQL0207);
    }

    #[test]
    fn test_recursive_with_is_not_supported() {
        let mut outer = Query::select(Select::new(vec![SelectItem::wildcard()]).from(Relation::table("a")))
            .with_query("a", Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))])));
        if let Some(with) = outer.with.as_mut() {
            with.recursive = true;
        }
        assert_eq!(analyze(Statement::from(outer)).unwrap_err().code, SQL0500);
    }

    #[test]
    fn test_where_rejects_aggregates() {
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("id"))])
            .from(Relation::table("orders"))
            .filter(Expr::gt(Expr::function("count", vec![]), Expr::integer(1)));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0400);
        assert_eq!(
            err.message,
            "WHERE clause cannot contain aggregations or window functions: [count(*)]"
        );
    }

    #[test]
    fn test_where_must_be_boolean() {
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("id"))])
            .from(Relation::table("orders"))
            .filter(Expr::identifier("total"));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0300);
        assert_eq!(err.message, "WHERE clause must evaluate to a boolean: actual type double");
    }

    #[test]
    fn test_group_by_and_aggregates() {
        let sum = Expr::function("sum", vec![Expr::identifier("total")]);
        let select = Select::new(vec![
            SelectItem::expr(Expr::identifier("status")),
            SelectItem::aliased(sum, "revenue"),
        ])
        .from(Relation::table("orders"))
        .group_by(vec![Expr::identifier("status")]);
        let select_id = select.id;
        let analysis = analyze(query(select)).unwrap();
        assert!(analysis.is_aggregated(select_id));
        assert_eq!(analysis.aggregates(select_id).len(), 1);
        assert_eq!(names(&analysis), vec!["status", "revenue"]);
        assert_eq!(analysis.output_columns()[1].data_type, SqlType::Double);
    }

    #[test]
    fn test_ungrouped_column() {
        let select = Select::new(vec![
            SelectItem::expr(Expr::identifier("id")),
            SelectItem::expr(Expr::function("count", vec![])),
        ])
        .from(Relation::table("orders"))
        .group_by(vec![Expr::identifier("status")]);
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0403);
        assert_eq!(err.message, "'id' must be an aggregate expression or appear in GROUP BY clause");
    }

    #[test]
    fn test_group_by_ordinal() {
        let select = Select::new(vec![
            SelectItem::expr(Expr::identifier("status")),
            SelectItem::expr(Expr::function("count", vec![])),
        ])
        .from(Relation::table("orders"))
        .group_by(vec![Expr::integer(1)]);
        assert!(analyze(query(select)).is_ok());

        let select = Select::new(vec![SelectItem::expr(Expr::identifier("status"))])
            .from(Relation::table("orders"))
            .group_by(vec![Expr::integer(3)]);
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.message, "GROUP BY position 3 is not in select list");
    }

    #[rstest]
    #[case::aggregate(
        Expr::function("sum", vec![Expr::identifier("total")]),
        "GROUP BY clause cannot contain aggregations or window functions: [sum(total)]"
    )]
    #[case::window(
        Expr::call(FunctionCall::new("rank", vec![]).over(WindowSpec::new())),
        "GROUP BY clause cannot contain aggregations or window functions: [rank() OVER ()]"
    )]
    fn test_group_by_ordinal_naming_forbidden_call(#[case] item: Expr, #[case] message: &str) {
        let select = Select::new(vec![SelectItem::expr(item)])
            .from(Relation::table("orders"))
            .group_by(vec![Expr::integer(1)]);
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0400);
        assert_eq!(err.message, message);
    }

    #[test]
    fn test_group_by_star_expansion() {
        let select = Select::new(vec![SelectItem::wildcard()])
            .from(Relation::table("t1"))
            .group_by(vec![Expr::identifier("x")]);
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0403);
        assert_eq!(err.message, "'y' must be an aggregate expression or appear in GROUP BY clause");
    }

    #[test]
    fn test_having_without_group_by_aggregates_the_block() {
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("id"))])
            .from(Relation::table("orders"))
            .having(Expr::gt(Expr::function("count", vec![]), Expr::integer(0)));
        assert_eq!(analyze(query(select)).unwrap_err().code, SQL0403);
    }

    #[test]
    fn test_order_by_output_name_and_ordinal() {
        let select = Select::new(vec![SelectItem::aliased(Expr::identifier("total"), "amount")])
            .from(Relation::table("orders"));
        let by_name = SortItem::ascending(Expr::identifier("amount"));
        let by_position = SortItem::descending(Expr::integer(1));
        let (name_id, position_id) = (by_name.expr.id, by_position.expr.id);
        let statement = Statement::from(Query::select(select).order_by(vec![by_name, by_position]));
        let analysis = analyze(statement).unwrap();
        assert_eq!(analysis.output_reference(name_id), Some(0));
        assert_eq!(analysis.output_reference(position_id), Some(0));
        assert_eq!(analysis.expression_type(position_id), Some(SqlType::Double));
    }

    #[test]
    fn test_order_by_position_out_of_range() {
        let statement = Statement::from(
            Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]))
                .order_by(vec![SortItem::ascending(Expr::integer(2))]),
        );
        let err = analyze(statement).unwrap_err();
        assert_eq!(err.code, SQL0201);
        assert_eq!(err.message, "ORDER BY position 2 is not in select list");
    }

    #[test]
    fn test_order_by_ambiguous_output_name() {
        let select = Select::new(vec![
            SelectItem::aliased(Expr::identifier("id"), "k"),
            SelectItem::aliased(Expr::identifier("total"), "k"),
        ])
        .from(Relation::table("orders"));
        let statement =
            Statement::from(Query::select(select).order_by(vec![SortItem::ascending(Expr::identifier("k"))]));
        assert_eq!(analyze(statement).unwrap_err().code, SQL0205);

        let select = Select::new(vec![
            SelectItem::expr(Expr::identifier("id")),
            SelectItem::expr(Expr::identifier("id")),
        ])
        .from(Relation::table("orders"));
        let statement =
            Statement::from(Query::select(select).order_by(vec![SortItem::ascending(Expr::identifier("id"))]));
        assert!(analyze(statement).is_ok());
    }

    #[test]
    fn test_distinct_order_by_must_be_selected() {
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("status"))])
            .distinct()
            .from(Relation::table("orders"));
        let statement =
            Statement::from(Query::select(select).order_by(vec![SortItem::ascending(Expr::identifier("total"))]));
        let err = analyze(statement).unwrap_err();
        assert_eq!(err.code, SQL0403);
        assert_eq!(err.message, "For SELECT DISTINCT, ORDER BY expressions must appear in select list");
    }

    #[test]
    fn test_distinct_star_order_by_expanded_column() {
        let select = Select::new(vec![SelectItem::wildcard()])
            .distinct()
            .from(Relation::table("customers"));
        let statement =
            Statement::from(Query::select(select).order_by(vec![SortItem::ascending(Expr::column("customers.name"))]));
        let analysis = analyze(statement).unwrap();
        assert_eq!(names(&analysis), vec!["id", "name", "region"]);
    }

    #[test]
    fn test_set_operation() {
        let left = Query::select(Select::new(vec![SelectItem::aliased(Expr::integer(1), "a")]));
        let right = Query::select(Select::new(vec![SelectItem::expr(Expr::double(2.0))]));
        let analysis = analyze(Statement::from(Query::set_operation(SetOperator::Union, true, left, right))).unwrap();
        assert_eq!(names(&analysis), vec!["a"]);
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Double);
    }

    #[rstest]
    #[case(SetOperator::Union, "UNION query has different number of fields: 1, 2")]
    #[case(SetOperator::Except, "EXCEPT query has different number of fields: 1, 2")]
    fn test_set_operation_arity(#[case] op: SetOperator, #[case] message: &str) {
        let left = Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]));
        let right = Query::select(Select::new(vec![
            SelectItem::expr(Expr::integer(1)),
            SelectItem::expr(Expr::integer(2)),
        ]));
        let err = analyze(Statement::from(Query::set_operation(op, false, left, right))).unwrap_err();
        assert_eq!(err.code, SQL0212);
        assert_eq!(err.message, message);
    }

    #[test]
    fn test_set_operation_types() {
        let left = Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]));
        let right = Query::select(Select::new(vec![SelectItem::expr(Expr::string("x"))]));
        let err = analyze(Statement::from(Query::set_operation(SetOperator::Intersect, false, left, right)))
            .unwrap_err();
        assert_eq!(err.message, "column 1 in INTERSECT query has incompatible types: integer, varchar");
    }

    #[test]
    fn test_values_rows() {
        let analysis = analyze(Statement::from(Query::values(vec![
            vec![Expr::integer(1), Expr::string("a")],
            vec![Expr::double(2.5), Expr::null()],
        ])))
        .unwrap();
        assert_eq!(names(&analysis), vec!["_col0", "_col1"]);
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Double);

        let err = analyze(Statement::from(Query::values(vec![
            vec![Expr::integer(1)],
            vec![Expr::integer(1), Expr::integer(2)],
        ])))
        .unwrap_err();
        assert_eq!(err.code, SQL0212);
    }

    #[test]
    fn test_join_using_merges_column() {
        let join = Relation::join(
            JoinKind::Inner,
            Relation::table("t1"),
            Relation::table("t2"),
            Some(JoinCriteria::Using(vec![Identifier::new("x")])),
        );
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("x"))]).from(join);
        let analysis = analyze(query(select)).unwrap();
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Integer);
    }

    #[test]
    fn test_join_using_missing_column() {
        let join = Relation::join(
            JoinKind::Left,
            Relation::table("t1"),
            Relation::table("t2"),
            Some(JoinCriteria::Using(vec![Identifier::new("y")])),
        );
        let err = analyze(query(Select::new(vec![SelectItem::wildcard()]).from(join))).unwrap_err();
        assert_eq!(err.message, "Column 'y' is missing from right side of join");
    }

    #[test]
    fn test_join_on_and_ambiguity() {
        let join = Relation::join(
            JoinKind::Inner,
            Relation::table("t1"),
            Relation::table("t2"),
            Some(JoinCriteria::On(Expr::eq(Expr::column("t1.x"), Expr::column("t2.x")))),
        );
        let select = Select::new(vec![SelectItem::expr(Expr::identifier("x"))]).from(join);
        assert_eq!(analyze(query(select)).unwrap_err().code, SQL0205);
    }

    #[test]
    fn test_join_on_sees_only_joined_relations() {
        let join = |left: &str| {
            Relation::join(
                JoinKind::Inner,
                Relation::table("t1"),
                Relation::table("t2"),
                Some(JoinCriteria::On(Expr::eq(Expr::column(left), Expr::column("t2.x")))),
            )
        };
        let select = Select::new(vec![SelectItem::expr(Expr::column("customers.name"))])
            .from(Relation::table("customers"))
            .from(join("customers.id"));
        let err = analyze(query(select)).unwrap_err();
        assert_eq!(err.code, SQL0201);
        assert_eq!(err.message, "Column 'customers.id' cannot be resolved");

        // the sibling is visible again once the join is resolved
        let select = Select::new(vec![SelectItem::expr(Expr::column("customers.name"))])
            .from(Relation::table("customers"))
            .from(join("t1.x"))
            .filter(Expr::eq(Expr::column("customers.id"), Expr::column("t2.x")));
        assert!(analyze(query(select)).is_ok());
    }

    #[test]
    fn test_join_on_rejects_window_functions() {
        let rank = Expr::call(FunctionCall::new("rank", vec![]).over(WindowSpec::new()));
        let join = Relation::join(
            JoinKind::Inner,
            Relation::table("t1"),
            Relation::table("t2"),
            Some(JoinCriteria::On(Expr::eq(rank, Expr::integer(1)))),
        );
        let err = analyze(query(Select::new(vec![SelectItem::wildcard()]).from(join))).unwrap_err();
        assert_eq!(err.code, SQL0400);
    }

    #[test]
    fn test_natural_join_is_not_supported() {
        let join = Relation::join(
            JoinKind::Inner,
            Relation::table("t1"),
            Relation::table("t2"),
            Some(JoinCriteria::Natural),
        );
        let err = analyze(query(Select::new(vec![SelectItem::wildcard()]).from(join))).unwrap_err();
        assert_eq!(err.code, SQL0500);
    }

    fn create_table(name: &str, columns: Vec<ColumnDefinition>, not_exists: bool) -> Statement {
        Statement::CreateTable(CreateTable {
            name: QualifiedName::from(name),
            columns,
            not_exists,
        })
    }

    #[test]
    fn test_create_table() {
        let analysis = analyze(create_table(
            "memory.default.events",
            vec![ColumnDefinition::new("id", "bigint"), ColumnDefinition::new("At", "timestamp")],
            false,
        ))
        .unwrap();
        let target = analysis.create_table().unwrap();
        assert_eq!(target.name.to_string(), "memory.default.events");
        assert_eq!(target.columns[1].name, "at");
        assert!(!target.exists);
        assert_eq!(analysis.update_type(), Some("CREATE TABLE"));
    }

    #[test]
    fn test_create_existing_table() {
        let err = analyze(create_table("orders", vec![ColumnDefinition::new("id", "bigint")], false)).unwrap_err();
        assert_eq!(err.code, SQL0209);
        assert_eq!(err.message, "Table 'hive.web.orders' already exists");

        let analysis = analyze(create_table("orders", vec![], true)).unwrap();
        assert!(analysis.create_table().unwrap().exists);
    }

    #[test]
    fn test_create_table_column_errors() {
        let err = analyze(create_table(
            "memory.default.e",
            vec![ColumnDefinition::new("a", "bigint"), ColumnDefinition::new("A", "double")],
            false,
        ))
        .unwrap_err();
        assert_eq!(err.code, SQL0210);

        let err = analyze(create_table("memory.default.e", vec![ColumnDefinition::new("a", "blob")], false))
            .unwrap_err();
        assert_eq!(err.code, SQL0302);
        assert_eq!(err.message, "Unknown type 'blob' for column 'a'");
    }

    #[test]
    fn test_create_table_denied() {
        let err = analyzer_for("bob")
            .analyze(
                create_table("memory.default.e", vec![ColumnDefinition::new("a", "bigint")], false).spanned(Span::new(0, 5)),
                vec![],
                false,
            )
            .unwrap_err();
        assert_eq!(err.message, "Access Denied: Cannot create table memory.default.e");
    }

    fn ctas(query: Query, column_aliases: Option<Vec<Identifier>>) -> Statement {
        Statement::CreateTableAsSelect(CreateTableAsSelect {
            name: QualifiedName::from("memory.default.copy"),
            column_aliases,
            query: Box::new(query),
            not_exists: false,
            with_data: true,
        })
    }

    #[test]
    fn test_create_table_as_select() {
        let source = Query::select(
            Select::new(vec![SelectItem::expr(Expr::identifier("id")), SelectItem::expr(Expr::identifier("total"))])
                .from(Relation::table("orders")),
        );
        let analysis = analyze(ctas(source, None)).unwrap();
        let target = analysis.create_table().unwrap();
        let columns: Vec<_> = target.columns.iter().map(|c| (c.name.as_str(), c.data_type)).collect();
        assert_eq!(columns, vec![("id", SqlType::BigInt), ("total", SqlType::Double)]);
        assert_eq!(names(&analysis), vec!["rows"]);
        assert_eq!(analysis.update_type(), Some("CREATE TABLE AS"));
    }

    #[test]
    fn test_create_table_as_values_needs_names() {
        let err = analyze(ctas(Query::values(vec![vec![Expr::integer(1)]]), None)).unwrap_err();
        assert_eq!(err.code, SQL0213);
        assert_eq!(err.message, "Column name not specified at position 1");

        let analysis = analyze(ctas(
            Query::values(vec![vec![Expr::integer(1)]]),
            Some(vec![Identifier::new("n")]),
        ))
        .unwrap();
        assert_eq!(analysis.create_table().unwrap().columns[0].name, "n");
    }

    #[test]
    fn test_create_table_as_null_column() {
        let source = Query::select(Select::new(vec![SelectItem::aliased(Expr::null(), "n")]));
        assert_eq!(analyze(ctas(source, None)).unwrap_err().code, SQL0302);
    }

    fn insert(columns: Option<Vec<&str>>, rows: Vec<Vec<Expr>>) -> Statement {
        Statement::Insert(Insert {
            target: QualifiedName::from("customers"),
            columns: columns.map(|c| c.into_iter().map(Identifier::new).collect()),
            query: Box::new(Query::values(rows)),
        })
    }

    #[test]
    fn test_insert() {
        let analysis = analyze(insert(
            Some(vec!["name", "ID"]),
            vec![vec![Expr::string("ann"), Expr::integer(7)]],
        ))
        .unwrap();
        let target = analysis.insert_target().unwrap();
        assert_eq!(target.table.to_string(), "hive.web.customers");
        assert_eq!(target.columns, vec!["name", "id"]);
        assert_eq!(analysis.update_type(), Some("INSERT"));
        assert_eq!(analysis.statement_kind(), Some(StatementKind::Insert));
    }

    #[test]
    fn test_insert_mismatches() {
        let err = analyze(insert(None, vec![vec![Expr::integer(1)]])).unwrap_err();
        assert_eq!(err.code, SQL0212);
        assert_eq!(err.message, "Insert query has mismatched column count: Table: 3, Query: 1");

        let err = analyze(insert(Some(vec!["id"]), vec![vec![Expr::string("x")]])).unwrap_err();
        assert_eq!(err.code, SQL0300);
        assert_eq!(
            err.message,
            "Insert query has mismatched column types: Table: [bigint], Query: [varchar]"
        );

        let err = analyze(insert(Some(vec!["id", "nope"]), vec![vec![Expr::integer(1), Expr::integer(2)]]))
            .unwrap_err();
        assert_eq!(err.code, SQL0201);

        let err = analyze(insert(Some(vec!["id", "ID"]), vec![vec![Expr::integer(1), Expr::integer(2)]]))
            .unwrap_err();
        assert_eq!(err.code, SQL0210);
    }

    #[test]
    fn test_insert_denied() {
        let statement = Statement::Insert(Insert {
            target: QualifiedName::from("orders"),
            columns: Some(vec![Identifier::new("id")]),
            query: Box::new(Query::values(vec![vec![Expr::integer(1)]])),
        });
        let err = analyzer_for("bob")
            .analyze(statement.spanned(Span::new(0, 5)), vec![], false)
            .unwrap_err();
        assert_eq!(err.message, "Access Denied: Cannot insert into table hive.web.orders");
    }

    #[test]
    fn test_delete_with_alias() {
        let statement = Statement::Delete(Delete {
            table: Relation::table("orders").alias("o"),
            where_clause: Some(Expr::eq(Expr::column("o.status"), Expr::string("void"))),
        });
        let analysis = analyze(statement).unwrap();
        assert_eq!(analysis.delete_target().map(ToString::to_string).as_deref(), Some("hive.web.orders"));
        assert_eq!(analysis.update_type(), Some("DELETE"));
        assert_eq!(names(&analysis), vec!["rows"]);
    }

    #[test]
    fn test_delete_rejects_aggregates_and_subquery_targets() {
        let statement = Statement::Delete(Delete {
            table: Relation::table("orders"),
            where_clause: Some(Expr::gt(Expr::function("max", vec![Expr::identifier("id")]), Expr::integer(1))),
        });
        assert_eq!(analyze(statement).unwrap_err().code, SQL0400);

        let statement = Statement::Delete(Delete {
            table: Relation::subquery(Query::values(vec![vec![Expr::integer(1)]])),
            where_clause: None,
        });
        assert_eq!(analyze(statement).unwrap_err().code, SQL0500);
    }

    #[test]
    fn test_delete_denied() {
        let statement = Statement::Delete(Delete {
            table: Relation::table("customers"),
            where_clause: None,
        });
        let err = analyzer_for("bob")
            .analyze(statement.spanned(Span::new(0, 5)), vec![], false)
            .unwrap_err();
        assert_eq!(err.message, "Access Denied: Cannot delete from table hive.web.customers");
    }

    #[test]
    fn test_bound_parameters_are_typed() {
        let analysis = analyze_with(
            select_from("orders", vec![Expr::identifier("id")]),
            vec![Expr::integer(1), Expr::string("x")],
            false,
        )
        .unwrap();
        assert_eq!(analysis.parameter_types(), &[SqlType::Integer, SqlType::Varchar]);
    }
}
