//! Expression resolution and typing
//!
//! Every expression node visited gets exactly one entry in the analysis
//! type table. Column references are bound to scope fields, function calls
//! to registry signatures, and subqueries get a frame of their own whose
//! parent is the enclosing block, so they may reference its columns.

use sqlscope_ast::{BinaryOp, Expr, ExprKind, FunctionCall, Literal, Query, UnaryOp, WhenClause};
use sqlscope_catalog::FunctionLookupError;
use sqlscope_diagnostics::{SQL0201, SQL0202, SQL0205, SQL0211, SQL0300, SQL0301, SQL0302, SQL0303};
use sqlscope_types::SqlType;

use crate::analysis::ResolvedField;
use crate::error::{Result, SemanticError};
use crate::scope::{ColumnLookup, Field, ScopeId, ScopeKind};
use crate::statement_analyzer::StatementAnalyzer;
use crate::validate::{verify_boolean, verify_function_usage};

fn literal_type(literal: &Literal) -> SqlType {
    match literal {
        Literal::Null => SqlType::Unknown,
        Literal::Boolean(_) => SqlType::Boolean,
        Literal::Integer(value) if Literal::fits_integer(*value) => SqlType::Integer,
        Literal::Integer(_) => SqlType::BigInt,
        Literal::Double(_) => SqlType::Double,
        Literal::String(_) => SqlType::Varchar,
        Literal::Date(_) => SqlType::Date,
        Literal::Timestamp(_) => SqlType::Timestamp,
    }
}

fn type_mismatch(expr: &Expr, message: String) -> SemanticError {
    SemanticError::new(SQL0300, message).at(expr.id, expr.span)
}

impl StatementAnalyzer<'_> {
    /// Resolve and type `expr` in `scope`
    pub fn analyze_expression(&mut self, expr: &Expr, scope: ScopeId) -> Result<SqlType> {
        let data_type = match &expr.kind {
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Identifier(_) | ExprKind::Dereference { .. } => self.analyze_column(expr, scope)?,
            ExprKind::Parameter { position } => self.analyze_parameter(expr, *position)?,
            ExprKind::FunctionCall(call) => self.analyze_function_call(expr, call, scope)?,
            ExprKind::BinaryOp { left, op, right } => self.analyze_binary(expr, left, *op, right, scope)?,
            ExprKind::UnaryOp { op, operand } => self.analyze_unary(expr, *op, operand, scope)?,
            ExprKind::IsNull { operand, .. } => {
                self.analyze_expression(operand, scope)?;
                SqlType::Boolean
            }
            ExprKind::Between {
                operand, low, high, ..
            } => {
                let types = [
                    self.analyze_expression(operand, scope)?,
                    self.analyze_expression(low, scope)?,
                    self.analyze_expression(high, scope)?,
                ];
                let common = self.ctx.coercer.common_super_type_of(types).map_err(|_| {
                    type_mismatch(
                        expr,
                        format!(
                            "Cannot check if {} is BETWEEN {} and {}",
                            types[0], types[1], types[2]
                        ),
                    )
                })?;
                for e in [operand, low, high] {
                    self.infer_parameter(e, common);
                }
                SqlType::Boolean
            }
            ExprKind::InList { operand, list, .. } => {
                let mut common = self.analyze_expression(operand, scope)?;
                for item in list {
                    let item_type = self.analyze_expression(item, scope)?;
                    common = self.ctx.coercer.common_super_type(common, item_type).map_err(|_| {
                        type_mismatch(
                            item,
                            format!(
                                "IN value and list items must be the same type or coercible to a common type. \
                                 Cannot find common type between {common} and {item_type}"
                            ),
                        )
                    })?;
                }
                for e in std::iter::once(&**operand).chain(list) {
                    self.infer_parameter(e, common);
                }
                SqlType::Boolean
            }
            ExprKind::InSubquery {
                operand, subquery, ..
            } => {
                let value = self.analyze_expression(operand, scope)?;
                let column = self.analyze_scalar_subquery(subquery, scope)?;
                self.ctx
                    .coercer
                    .common_super_type(value, column.data_type)
                    .map_err(|_| {
                        type_mismatch(
                            expr,
                            format!(
                                "Value expression and result of subquery must be of the same type \
                                 for IN expression: {value} vs {}",
                                column.data_type
                            ),
                        )
                    })?;
                self.infer_parameter(operand, column.data_type);
                SqlType::Boolean
            }
            ExprKind::Exists { subquery, .. } => {
                self.analyze_query(subquery, scope, ScopeKind::Subquery)?;
                SqlType::Boolean
            }
            ExprKind::Subquery(query) => self.analyze_scalar_subquery(query, scope)?.data_type,
            ExprKind::Case {
                operand,
                when_clauses,
                else_result,
            } => self.analyze_case(operand.as_deref(), when_clauses, else_result.as_deref(), scope)?,
            ExprKind::Cast { operand, target, .. } => {
                let from = self.analyze_expression(operand, scope)?;
                let to = SqlType::from_name(&target.name)
                    .filter(|ty| !ty.is_unknown())
                    .ok_or_else(|| {
                        SemanticError::new(SQL0302, format!("Unknown type: {target}")).at(expr.id, expr.span)
                    })?;
                self.ctx
                    .coercer
                    .check_cast(from, to)
                    .map_err(|e| type_mismatch(expr, e.to_string()))?
            }
        };
        self.analysis.record_type(expr.id, data_type)?;
        Ok(data_type)
    }

    /// In DESCRIBE mode a bare parameter takes the type its context expects
    fn infer_parameter(&mut self, expr: &Expr, data_type: SqlType) {
        if let ExprKind::Parameter { position } = expr.kind {
            if self.analysis.is_describe() {
                self.analysis.record_parameter_usage(position, data_type);
            }
        }
    }

    fn analyze_column(&mut self, expr: &Expr, scope: ScopeId) -> Result<SqlType> {
        let name = expr.qualified_name().ok_or_else(|| {
            SemanticError::not_supported(format!("Field dereference of expression '{expr}'"))
                .at(expr.id, expr.span)
        })?;
        let qualifier = name.prefix().map(|p| p.canonical_parts()).unwrap_or_default();
        let column = name.suffix().canonical();

        let found = match self.analysis.scopes().lookup_column(scope, &qualifier, &column) {
            ColumnLookup::Found(found) => found,
            ColumnLookup::Ambiguous(candidates) => {
                return Err(SemanticError::new(SQL0205, format!("Column '{name}' is ambiguous"))
                    .at(expr.id, expr.span)
                    .with_context(format!("Candidates: {}", candidates.join(", "))));
            }
            ColumnLookup::NotFound => {
                return Err(SemanticError::new(
                    SQL0201,
                    format!("Column '{name}' cannot be resolved"),
                )
                .at(expr.id, expr.span));
            }
        };

        let field: Field = self.analysis.scopes().field(&found)?.clone();
        if let Some(origin) = &field.origin {
            if !self.ctx.access_control.can_select_column(
                &self.ctx.session.identity,
                &origin.table,
                &origin.column,
            ) {
                return Err(SemanticError::access_denied(format!(
                    "Cannot select from columns [{}] in table or view {}",
                    origin.column, origin.table
                ))
                .at(expr.id, expr.span));
            }
        }
        log::trace!(
            "{name} -> {}[{}].{}{}",
            found.scope,
            found.relation,
            found.field,
            if found.correlated { " (correlated)" } else { "" }
        );
        self.analysis.record_field(
            expr.id,
            ResolvedField {
                scope: found.scope,
                relation: found.relation,
                field_index: found.field,
                name: field.name.clone().unwrap_or(column),
                origin_table: field.origin.as_ref().map(|o| o.table.clone()),
                data_type: field.data_type,
                correlated: found.correlated,
            },
        )?;
        Ok(field.data_type)
    }

    fn analyze_parameter(&mut self, expr: &Expr, position: usize) -> Result<SqlType> {
        if self.analysis.is_describe() {
            self.analysis.record_parameter_usage(position, SqlType::Unknown);
            return Ok(SqlType::Unknown);
        }
        let bound = self.analysis.parameter_types().len();
        let data_type = self
            .analysis
            .parameter_types()
            .get(position)
            .copied()
            .ok_or_else(|| {
                SemanticError::new(
                    SQL0211,
                    format!("Invalid parameter index {}, max value is {bound}", position + 1),
                )
                .at(expr.id, expr.span)
            })?;
        self.analysis.record_parameter_usage(position, data_type);
        Ok(data_type)
    }

    fn analyze_function_call(&mut self, expr: &Expr, call: &FunctionCall, scope: ScopeId) -> Result<SqlType> {
        let name = call.canonical_name();
        let functions = self.ctx.functions;
        let kind = functions.function_kind(&name).ok_or_else(|| {
            SemanticError::new(SQL0202, format!("Function '{name}' not registered")).at(expr.id, expr.span)
        })?;
        verify_function_usage(functions, expr, call, kind)?;

        let argument_types = call
            .args
            .iter()
            .map(|arg| self.analyze_expression(arg, scope))
            .collect::<Result<Vec<_>>>()?;
        if let Some(filter) = &call.filter {
            let ty = self.analyze_expression(filter, scope)?;
            verify_boolean(ty, filter, "FILTER clause")?;
        }
        if let Some(window) = &call.window {
            for partition in &window.partition_by {
                self.analyze_expression(partition, scope)?;
            }
            for item in &window.order_by {
                self.analyze_expression(&item.expr, scope)?;
            }
        }

        let resolved = functions
            .resolve_function(&name, &argument_types)
            .map_err(|e| {
                let code = match e {
                    FunctionLookupError::NotFound(_) => SQL0202,
                    FunctionLookupError::NoMatchingSignature { .. } => SQL0301,
                };
                SemanticError::new(code, e.to_string()).at(expr.id, expr.span)
            })?;
        if !self
            .ctx
            .access_control
            .can_execute_function(&self.ctx.session.identity, &name)
        {
            return Err(
                SemanticError::access_denied(format!("Cannot execute function {name}")).at(expr.id, expr.span),
            );
        }
        for (arg, declared) in call.args.iter().zip(&resolved.argument_types) {
            self.infer_parameter(arg, *declared);
        }
        let return_type = resolved.return_type;
        log::trace!("{name}({}) -> {return_type}", call.args.len());
        self.analysis.record_function(expr.id, resolved)?;
        Ok(return_type)
    }

    fn analyze_binary(
        &mut self,
        expr: &Expr,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        scope: ScopeId,
    ) -> Result<SqlType> {
        let l = self.analyze_expression(left, scope)?;
        let r = self.analyze_expression(right, scope)?;

        if op.is_logical() {
            for (side, ty, operand) in [("Left", l, left), ("Right", r, right)] {
                if !matches!(ty, SqlType::Boolean | SqlType::Unknown) {
                    return Err(type_mismatch(
                        operand,
                        format!("{side} side of logical expression must evaluate to a boolean (actual: {ty})"),
                    ));
                }
                self.infer_parameter(operand, SqlType::Boolean);
            }
            return Ok(SqlType::Boolean);
        }

        let coercer = self.ctx.coercer;
        let cannot_apply = || type_mismatch(expr, format!("Cannot apply operator: {l} {} {r}", op.symbol()));
        let (operand_type, result) = match op {
            BinaryOp::Like | BinaryOp::NotLike | BinaryOp::Concat => {
                if !coercer.can_coerce(l, SqlType::Varchar) || !coercer.can_coerce(r, SqlType::Varchar) {
                    return Err(cannot_apply());
                }
                let result = if op == BinaryOp::Concat {
                    SqlType::Varchar
                } else {
                    SqlType::Boolean
                };
                (SqlType::Varchar, result)
            }
            _ if op.is_comparison() => {
                let common = coercer.common_super_type(l, r).map_err(|_| cannot_apply())?;
                (common, SqlType::Boolean)
            }
            _ => {
                let common = coercer.common_super_type(l, r).map_err(|_| cannot_apply())?;
                if !common.is_numeric() && !common.is_unknown() {
                    return Err(cannot_apply());
                }
                (common, common)
            }
        };
        self.infer_parameter(left, operand_type);
        self.infer_parameter(right, operand_type);
        Ok(result)
    }

    fn analyze_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr, scope: ScopeId) -> Result<SqlType> {
        let ty = self.analyze_expression(operand, scope)?;
        match op {
            UnaryOp::Not => {
                if !matches!(ty, SqlType::Boolean | SqlType::Unknown) {
                    return Err(type_mismatch(
                        expr,
                        format!("Value of logical NOT expression must evaluate to a boolean (actual: {ty})"),
                    ));
                }
                self.infer_parameter(operand, SqlType::Boolean);
                Ok(SqlType::Boolean)
            }
            UnaryOp::Minus | UnaryOp::Plus => {
                if !ty.is_numeric() && !ty.is_unknown() {
                    return Err(type_mismatch(expr, format!("Cannot apply operator: {op}{ty}")));
                }
                Ok(ty)
            }
        }
    }

    /// A subquery used as a value must return exactly one column
    fn analyze_scalar_subquery(&mut self, query: &Query, scope: ScopeId) -> Result<Field> {
        let fields = self.analyze_query(query, scope, ScopeKind::Subquery)?;
        match <[Field; 1]>::try_from(fields) {
            Ok([field]) => Ok(field),
            Err(fields) => Err(SemanticError::new(
                SQL0303,
                format!(
                    "Multiple columns returned by subquery are not yet supported. Found {}",
                    fields.len()
                ),
            )
            .at(query.id, query.span)),
        }
    }

    fn analyze_case(
        &mut self,
        operand: Option<&Expr>,
        when_clauses: &[WhenClause],
        else_result: Option<&Expr>,
        scope: ScopeId,
    ) -> Result<SqlType> {
        match operand {
            Some(operand) => {
                let operand_type = self.analyze_expression(operand, scope)?;
                for clause in when_clauses {
                    let when_type = self.analyze_expression(&clause.condition, scope)?;
                    self.ctx
                        .coercer
                        .common_super_type(operand_type, when_type)
                        .map_err(|_| {
                            type_mismatch(
                                &clause.condition,
                                format!(
                                    "CASE operand type does not match WHEN clause operand type: \
                                     {operand_type} vs {when_type}"
                                ),
                            )
                        })?;
                }
            }
            None => {
                for clause in when_clauses {
                    let ty = self.analyze_expression(&clause.condition, scope)?;
                    verify_boolean(ty, &clause.condition, "WHEN clause")?;
                }
            }
        }

        let mut result = SqlType::Unknown;
        for e in when_clauses.iter().map(|c| &c.result).chain(else_result) {
            let ty = self.analyze_expression(e, scope)?;
            result = self.ctx.coercer.common_super_type(result, ty).map_err(|_| {
                type_mismatch(
                    e,
                    format!(
                        "All CASE results must be the same type or coercible to a common type. \
                         Cannot find common type between {result} and {ty}"
                    ),
                )
            })?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::test_support::{analyze, analyze_with, analyzer_for, select_from, select_one};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use sqlscope_ast::{
        Expr, FunctionCall, Query, Relation, Select, SelectItem, Span, Statement, WhenClause, WindowSpec,
    };
    use sqlscope_diagnostics::{
        ErrorKind, SQL0201, SQL0202, SQL0205, SQL0211, SQL0300, SQL0301, SQL0302, SQL0303,
    };
    use sqlscope_types::SqlType;

    fn output_type(expr: Expr) -> SqlType {
        let analysis = analyze(select_one(expr)).unwrap();
        analysis.output_columns()[0].data_type
    }

    #[rstest]
    #[case(Expr::integer(1), SqlType::Integer)]
    #[case(Expr::integer(i64::from(i32::MAX) + 1), SqlType::BigInt)]
    #[case(Expr::double(1.5), SqlType::Double)]
    #[case(Expr::string("a"), SqlType::Varchar)]
    #[case(Expr::null(), SqlType::Unknown)]
    #[case(Expr::binary(Expr::integer(1), sqlscope_ast::BinaryOp::Add, Expr::double(2.0)), SqlType::Double)]
    #[case(Expr::binary(Expr::string("a"), sqlscope_ast::BinaryOp::Concat, Expr::string("b")), SqlType::Varchar)]
    #[case(Expr::is_null(Expr::integer(1), false), SqlType::Boolean)]
    #[case(Expr::cast(Expr::string("1"), "bigint"), SqlType::BigInt)]
    #[case(Expr::in_list(Expr::integer(1), vec![Expr::integer(2), Expr::double(3.0)]), SqlType::Boolean)]
    fn test_expression_types(#[case] expr: Expr, #[case] expected: SqlType) {
        assert_eq!(output_type(expr), expected);
    }

    #[test]
    fn test_every_node_is_typed() {
        let left = Expr::integer(1);
        let right = Expr::integer(2);
        let (left_id, right_id) = (left.id, right.id);
        let sum = Expr::binary(left, sqlscope_ast::BinaryOp::Add, right);
        let sum_id = sum.id;
        let analysis = analyze(select_one(sum)).unwrap();
        assert_eq!(analysis.expression_type(left_id), Some(SqlType::Integer));
        assert_eq!(analysis.expression_type(right_id), Some(SqlType::Integer));
        assert_eq!(analysis.expression_type(sum_id), Some(SqlType::Integer));
    }

    #[test]
    fn test_column_resolves_to_table_field() {
        let column = Expr::column("o.total");
        let id = column.id;
        let query = Query::select(
            Select::new(vec![SelectItem::expr(column)]).from(Relation::table("orders").alias("o")),
        );
        let analysis = analyze(Statement::from(query)).unwrap();
        let field = analysis.resolved_field(id).unwrap();
        assert_eq!(field.name, "total");
        assert_eq!(field.data_type, SqlType::Double);
        assert!(!field.correlated);
        assert_eq!(field.origin_table.as_ref().map(ToString::to_string).as_deref(), Some("hive.web.orders"));
    }

    #[test]
    fn test_unknown_column() {
        let err = analyze(select_from("orders", vec![Expr::identifier("nope")])).unwrap_err();
        assert_eq!(err.code, SQL0201);
        assert_eq!(err.message, "Column 'nope' cannot be resolved");
    }

    #[test]
    fn test_ambiguous_column_lists_candidates() {
        let query = Query::select(
            Select::new(vec![SelectItem::expr(Expr::identifier("x"))])
                .from(Relation::table("t1"))
                .from(Relation::table("t2")),
        );
        let err = analyze(Statement::from(query)).unwrap_err();
        assert_eq!(err.code, SQL0205);
        assert_eq!(err.context.as_deref(), Some("Candidates: t1.x, t2.x"));
    }

    #[test]
    fn test_correlated_reference_in_subquery() {
        let inner_ref = Expr::column("o.id");
        let inner_id = inner_ref.id;
        let subquery = Query::select(
            Select::new(vec![SelectItem::expr(Expr::identifier("name"))])
                .from(Relation::table("customers"))
                .filter(Expr::eq(Expr::identifier("id"), inner_ref)),
        );
        let query = Query::select(
            Select::new(vec![SelectItem::expr(Expr::subquery(subquery))])
                .from(Relation::table("orders").alias("o")),
        );
        let analysis = analyze(Statement::from(query)).unwrap();
        assert!(analysis.resolved_field(inner_id).unwrap().correlated);
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Varchar);
    }

    #[test]
    fn test_scalar_subquery_with_two_columns() {
        let subquery = Query::select(Select::new(vec![
            SelectItem::expr(Expr::integer(1)),
            SelectItem::expr(Expr::integer(2)),
        ]));
        let err = analyze(select_one(Expr::subquery(subquery))).unwrap_err();
        assert_eq!(err.code, SQL0303);
        assert_eq!(err.message, "Multiple columns returned by subquery are not yet supported. Found 2");
    }

    #[test]
    fn test_in_subquery_type_mismatch() {
        let subquery = Query::select(Select::new(vec![SelectItem::expr(Expr::string("a"))]));
        let err = analyze(select_one(Expr::in_subquery(Expr::integer(1), subquery))).unwrap_err();
        assert_eq!(err.code, SQL0300);
        assert_eq!(
            err.message,
            "Value expression and result of subquery must be of the same type for IN expression: integer vs varchar"
        );
    }

    #[test]
    fn test_logical_operand_must_be_boolean() {
        let err = analyze(select_one(Expr::and(Expr::boolean(true), Expr::integer(1)))).unwrap_err();
        assert_eq!(err.code, SQL0300);
        assert_eq!(
            err.message,
            "Right side of logical expression must evaluate to a boolean (actual: integer)"
        );
    }

    #[test]
    fn test_not_requires_boolean() {
        let err = analyze(select_one(Expr::not(Expr::string("x")))).unwrap_err();
        assert_eq!(
            err.message,
            "Value of logical NOT expression must evaluate to a boolean (actual: varchar)"
        );
    }

    #[test]
    fn test_comparison_of_incompatible_types() {
        let err = analyze(select_one(Expr::eq(Expr::integer(1), Expr::string("1")))).unwrap_err();
        assert_eq!(err.code, SQL0300);
        assert_eq!(err.message, "Cannot apply operator: integer = varchar");
    }

    #[test]
    fn test_between_incompatible() {
        let err = analyze(select_one(Expr::between(
            Expr::integer(1),
            Expr::string("a"),
            Expr::integer(3),
        )))
        .unwrap_err();
        assert_eq!(err.message, "Cannot check if integer is BETWEEN varchar and integer");
    }

    #[test]
    fn test_case_results_unify() {
        let case = Expr::searched_case(
            vec![WhenClause::new(Expr::boolean(true), Expr::integer(1))],
            Some(Expr::double(2.0)),
        );
        assert_eq!(output_type(case), SqlType::Double);

        let bad = Expr::searched_case(
            vec![WhenClause::new(Expr::boolean(true), Expr::integer(1))],
            Some(Expr::string("x")),
        );
        let err = analyze(select_one(bad)).unwrap_err();
        assert_eq!(
            err.message,
            "All CASE results must be the same type or coercible to a common type. \
             Cannot find common type between integer and varchar"
        );
    }

    #[test]
    fn test_simple_case_operand_mismatch() {
        let case = Expr::simple_case(
            Expr::integer(1),
            vec![WhenClause::new(Expr::string("a"), Expr::integer(1))],
            None,
        );
        let err = analyze(select_one(case)).unwrap_err();
        assert_eq!(
            err.message,
            "CASE operand type does not match WHEN clause operand type: integer vs varchar"
        );
    }

    #[test]
    fn test_cast_rules() {
        let err = analyze(select_one(Expr::cast(Expr::integer(1), "uuid"))).unwrap_err();
        assert_eq!(err.code, SQL0302);
        assert_eq!(err.message, "Unknown type: uuid");

        let err = analyze(select_one(Expr::cast(Expr::boolean(true), "date"))).unwrap_err();
        assert_eq!(err.code, SQL0300);
        assert_eq!(err.message, "Cannot cast boolean to date");
    }

    #[test]
    fn test_function_resolution() {
        let call = Expr::function("length", vec![Expr::string("abc")]);
        let id = call.id;
        let analysis = analyze(select_one(call)).unwrap();
        assert_eq!(analysis.resolved_function(id).unwrap().name, "length");
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::BigInt);
    }

    #[test]
    fn test_unknown_function() {
        let err = analyze(select_one(Expr::function("frobnicate", vec![]))).unwrap_err();
        assert_eq!(err.code, SQL0202);
        assert_eq!(err.message, "Function 'frobnicate' not registered");
    }

    #[test]
    fn test_function_signature_mismatch() {
        let err = analyze(select_one(Expr::function("lower", vec![Expr::integer(1)]))).unwrap_err();
        assert_eq!(err.code, SQL0301);
    }

    #[test]
    fn test_window_function_over_partition() {
        let call = Expr::call(
            FunctionCall::new("rank", vec![])
                .over(WindowSpec::new().partition_by(vec![Expr::identifier("status")])),
        );
        let analysis = analyze(select_from("orders", vec![call])).unwrap();
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::BigInt);
    }

    #[test]
    fn test_parameter_index_out_of_range() {
        let err = analyze_with(select_one(Expr::parameter(1)), vec![Expr::integer(5)], false).unwrap_err();
        assert_eq!(err.code, SQL0211);
        assert_eq!(err.message, "Invalid parameter index 2, max value is 1");
    }

    #[test]
    fn test_bound_parameter_takes_value_type() {
        let analysis = analyze_with(select_one(Expr::parameter(0)), vec![Expr::string("x")], false).unwrap();
        assert_eq!(analysis.output_columns()[0].data_type, SqlType::Varchar);
    }

    #[test]
    fn test_describe_mode_infers_parameter_from_comparison() {
        let statement = select_from(
            "orders",
            vec![Expr::eq(Expr::identifier("total"), Expr::parameter(0))],
        );
        let analysis = analyze_with(statement, vec![], true).unwrap();
        let usages: Vec<_> = analysis.parameter_usages().collect();
        assert_eq!(usages, vec![(0, SqlType::Double)]);
    }

    #[test]
    fn test_denied_column_reference() {
        let analyzer = analyzer_for("bob");
        let err = analyzer
            .analyze(
                select_from("orders", vec![Expr::identifier("customer_id")]).spanned(Span::new(0, 30)),
                vec![],
                false,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(
            err.message,
            "Access Denied: Cannot select from columns [customer_id] in table or view hive.web.orders"
        );
    }
}
