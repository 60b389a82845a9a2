//! Printable SQL forms
//!
//! The printed form of an expression is what error messages quote, so it
//! stays close to how a user would write it: `count(*)`, `sum(b)`,
//! `rank() OVER (PARTITION BY a ORDER BY b)`.

use crate::{
    DescribeKind, Explain, ExplainOption, Expr, ExprKind, FunctionCall, Identifier, JoinCriteria,
    JoinKind, Literal, QualifiedName, Query, QueryBody, Relation, RelationKind, Select, SelectItem,
    SetOperator, SortItem, Statement, TypeSpecifier, Values, WindowSpec,
};
use std::fmt::{self, Display, Formatter, Write};

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.quoted {
            f.write_char('"')?;
            f.write_str(&self.value.replace('"', "\"\""))?;
            f.write_char('"')
        } else {
            f.write_str(&self.value)
        }
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl Display for TypeSpecifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.parameters.is_empty() {
            f.write_char('(')?;
            write_list(f, &self.parameters)?;
            f.write_char(')')?;
        }
        Ok(())
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Integer(v) => write!(f, "{v}"),
            Literal::Double(v) => write!(f, "{v:?}"),
            Literal::String(s) => f.write_str(&quote_string(s)),
            Literal::Date(s) => write!(f, "DATE {}", quote_string(s)),
            Literal::Timestamp(s) => write!(f, "TIMESTAMP {}", quote_string(s)),
        }
    }
}

/// Operands that are themselves binary operations are parenthesized
struct Operand<'a>(&'a Expr);

impl Display for Operand<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ExprKind::BinaryOp { .. } | ExprKind::Between { .. } => write!(f, "({})", self.0),
            _ => write!(f, "{}", self.0),
        }
    }
}

fn not_kw(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Identifier(ident) => write!(f, "{ident}"),
            ExprKind::Dereference { base, field } => write!(f, "{base}.{field}"),
            ExprKind::Parameter { .. } => f.write_char('?'),
            ExprKind::FunctionCall(call) => write!(f, "{call}"),
            ExprKind::BinaryOp { left, op, right } => {
                write!(f, "{} {op} {}", Operand(left), Operand(right))
            }
            ExprKind::UnaryOp { op, operand } => write!(f, "{op}{}", Operand(operand)),
            ExprKind::IsNull { operand, negated } => {
                write!(f, "{} IS {}NULL", Operand(operand), not_kw(*negated))
            }
            ExprKind::Between {
                operand,
                low,
                high,
                negated,
            } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                Operand(operand),
                not_kw(*negated),
                Operand(low),
                Operand(high)
            ),
            ExprKind::InList {
                operand,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", Operand(operand), not_kw(*negated))?;
                write_list(f, list)?;
                f.write_char(')')
            }
            ExprKind::InSubquery {
                operand,
                subquery,
                negated,
            } => write!(f, "{} {}IN ({subquery})", Operand(operand), not_kw(*negated)),
            ExprKind::Exists { subquery, negated } => {
                write!(f, "{}EXISTS ({subquery})", not_kw(*negated))
            }
            ExprKind::Subquery(query) => write!(f, "({query})"),
            ExprKind::Case {
                operand,
                when_clauses,
                else_result,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for clause in when_clauses {
                    write!(f, " WHEN {} THEN {}", clause.condition, clause.result)?;
                }
                if let Some(else_result) = else_result {
                    write!(f, " ELSE {else_result}")?;
                }
                f.write_str(" END")
            }
            ExprKind::Cast {
                operand,
                target,
                safe,
            } => {
                let name = if *safe { "TRY_CAST" } else { "CAST" };
                write!(f, "{name}({operand} AS {target})")
            }
        }
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        if self.args.is_empty() && self.canonical_name() == "count" {
            f.write_char('*')?;
        } else {
            write_list(f, &self.args)?;
        }
        f.write_char(')')?;
        if let Some(filter) = &self.filter {
            write!(f, " FILTER (WHERE {filter})")?;
        }
        if let Some(window) = &self.window {
            write!(f, " OVER ({window})")?;
        }
        Ok(())
    }
}

impl Display for WindowSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.partition_by.is_empty() {
            f.write_str("PARTITION BY ")?;
            write_list(f, &self.partition_by)?;
        }
        if !self.order_by.is_empty() {
            if !self.partition_by.is_empty() {
                f.write_char(' ')?;
            }
            f.write_str("ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        Ok(())
    }
}

impl Display for SortItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if !self.ascending {
            f.write_str(" DESC")?;
        }
        match self.nulls_first {
            Some(true) => f.write_str(" NULLS FIRST"),
            Some(false) => f.write_str(" NULLS LAST"),
            None => Ok(()),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(with) = &self.with {
            f.write_str("WITH ")?;
            if with.recursive {
                f.write_str("RECURSIVE ")?;
            }
            for (i, named) in with.queries.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", named.name)?;
                if let Some(columns) = &named.column_aliases {
                    f.write_str(" (")?;
                    write_list(f, columns)?;
                    f.write_char(')')?;
                }
                write!(f, " AS ({})", named.query)?;
            }
            f.write_char(' ')?;
        }
        write!(f, "{}", self.body)?;
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

impl Display for QueryBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryBody::Select(select) => write!(f, "{select}"),
            QueryBody::SetOperation(op) => {
                let keyword = match op.op {
                    SetOperator::Union => "UNION",
                    SetOperator::Intersect => "INTERSECT",
                    SetOperator::Except => "EXCEPT",
                };
                let all = if op.all { " ALL" } else { "" };
                write!(f, "{} {keyword}{all} {}", op.left, op.right)
            }
            QueryBody::Values(values) => write!(f, "{values}"),
            QueryBody::Nested(query) => write!(f, "({query})"),
        }
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.items)?;
        if !self.from.is_empty() {
            f.write_str(" FROM ")?;
            write_list(f, &self.from)?;
        }
        if let Some(predicate) = &self.where_clause {
            write!(f, " WHERE {predicate}")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(predicate) = &self.having {
            write!(f, " HAVING {predicate}")?;
        }
        Ok(())
    }
}

impl Display for SelectItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Expr { expr, alias: None } => write!(f, "{expr}"),
            SelectItem::Expr {
                expr,
                alias: Some(alias),
            } => write!(f, "{expr} AS {alias}"),
            SelectItem::Wildcard {
                qualifier: Some(q), ..
            } => write!(f, "{q}.*"),
            SelectItem::Wildcard { qualifier: None, .. } => f.write_char('*'),
        }
    }
}

impl Display for Values {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("VALUES ")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_char('(')?;
            write_list(f, row)?;
            f.write_char(')')?;
        }
        Ok(())
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RelationKind::Table(name) => write!(f, "{name}"),
            RelationKind::Aliased {
                relation,
                alias,
                column_aliases,
            } => {
                write!(f, "{relation} AS {alias}")?;
                if let Some(columns) = column_aliases {
                    f.write_str(" (")?;
                    write_list(f, columns)?;
                    f.write_char(')')?;
                }
                Ok(())
            }
            RelationKind::Subquery(query) => write!(f, "({query})"),
            RelationKind::Lateral(query) => write!(f, "LATERAL ({query})"),
            RelationKind::Values(values) => write!(f, "({values})"),
            RelationKind::Join(join) => {
                let keyword = match join.kind {
                    JoinKind::Inner => "JOIN",
                    JoinKind::Left => "LEFT JOIN",
                    JoinKind::Right => "RIGHT JOIN",
                    JoinKind::Full => "FULL JOIN",
                    JoinKind::Cross => "CROSS JOIN",
                };
                match &join.criteria {
                    Some(JoinCriteria::Natural) => {
                        write!(f, "{} NATURAL {keyword} {}", join.left, join.right)
                    }
                    Some(JoinCriteria::On(predicate)) => {
                        write!(f, "{} {keyword} {} ON {predicate}", join.left, join.right)
                    }
                    Some(JoinCriteria::Using(columns)) => {
                        write!(f, "{} {keyword} {} USING (", join.left, join.right)?;
                        write_list(f, columns)?;
                        f.write_char(')')
                    }
                    None => write!(f, "{} {keyword} {}", join.left, join.right),
                }
            }
        }
    }
}

impl Display for Explain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("EXPLAIN ")?;
        if self.analyze {
            f.write_str("ANALYZE ")?;
        }
        if self.verbose {
            f.write_str("VERBOSE ")?;
        }
        if !self.options.is_empty() {
            f.write_char('(')?;
            for (i, option) in self.options.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                match option {
                    ExplainOption::Type(ty) => write!(f, "TYPE {ty}")?,
                    ExplainOption::Format(format) => write!(f, "FORMAT {format}")?,
                }
            }
            f.write_str(") ")?;
        }
        write!(f, "{}", self.statement.inner)
    }
}

fn write_like(f: &mut Formatter<'_>, like: &Option<String>) -> fmt::Result {
    match like {
        Some(pattern) => write!(f, " LIKE {}", quote_string(pattern)),
        None => Ok(()),
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Query(query) => write!(f, "{query}"),
            Statement::CreateTable(create) => {
                f.write_str("CREATE TABLE ")?;
                if create.not_exists {
                    f.write_str("IF NOT EXISTS ")?;
                }
                write!(f, "{} (", create.name)?;
                for (i, column) in create.columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", column.name, column.data_type)?;
                    if !column.nullable {
                        f.write_str(" NOT NULL")?;
                    }
                }
                f.write_char(')')
            }
            Statement::CreateTableAsSelect(create) => {
                f.write_str("CREATE TABLE ")?;
                if create.not_exists {
                    f.write_str("IF NOT EXISTS ")?;
                }
                write!(f, "{}", create.name)?;
                if let Some(columns) = &create.column_aliases {
                    f.write_str(" (")?;
                    write_list(f, columns)?;
                    f.write_char(')')?;
                }
                write!(f, " AS {}", create.query)?;
                if !create.with_data {
                    f.write_str(" WITH NO DATA")?;
                }
                Ok(())
            }
            Statement::Insert(insert) => {
                write!(f, "INSERT INTO {}", insert.target)?;
                if let Some(columns) = &insert.columns {
                    f.write_str(" (")?;
                    write_list(f, columns)?;
                    f.write_char(')')?;
                }
                write!(f, " {}", insert.query)
            }
            Statement::Delete(delete) => {
                write!(f, "DELETE FROM {}", delete.table)?;
                if let Some(predicate) = &delete.where_clause {
                    write!(f, " WHERE {predicate}")?;
                }
                Ok(())
            }
            Statement::Explain(explain) => write!(f, "{explain}"),
            Statement::DescribeInput(describe) => write!(f, "DESCRIBE INPUT {}", describe.name),
            Statement::DescribeOutput(describe) => write!(f, "DESCRIBE OUTPUT {}", describe.name),
            Statement::Described(described) => {
                let kind = match described.kind {
                    DescribeKind::Input => "INPUT",
                    DescribeKind::Output => "OUTPUT",
                };
                write!(f, "DESCRIBE {kind} {}", described.name)
            }
            Statement::ShowCatalogs(show) => {
                f.write_str("SHOW CATALOGS")?;
                write_like(f, &show.like)
            }
            Statement::ShowSchemas(show) => {
                f.write_str("SHOW SCHEMAS")?;
                if let Some(catalog) = &show.catalog {
                    write!(f, " FROM {catalog}")?;
                }
                write_like(f, &show.like)
            }
            Statement::ShowTables(show) => {
                f.write_str("SHOW TABLES")?;
                if let Some(schema) = &show.schema {
                    write!(f, " FROM {schema}")?;
                }
                write_like(f, &show.like)
            }
            Statement::ShowColumns(show) => write!(f, "SHOW COLUMNS FROM {}", show.table),
            Statement::ShowFunctions(show) => {
                f.write_str("SHOW FUNCTIONS")?;
                write_like(f, &show.like)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        BinaryOp, Expr, FunctionCall, JoinCriteria, JoinKind, Query, Relation, Select, SelectItem,
        SortItem, WindowSpec,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_printable_forms() {
        assert_eq!(Expr::count_star().to_string(), "count(*)");
        assert_eq!(Expr::function("sum", vec![Expr::column("b")]).to_string(), "sum(b)");

        let rank = FunctionCall::new("rank", vec![]).over(
            WindowSpec::new()
                .partition_by(vec![Expr::column("a")])
                .order_by(vec![SortItem::ascending(Expr::column("b"))]),
        );
        assert_eq!(
            Expr::call(rank).to_string(),
            "rank() OVER (PARTITION BY a ORDER BY b)"
        );

        let distinct = FunctionCall::new("count", vec![Expr::column("x")]).distinct();
        assert_eq!(Expr::call(distinct).to_string(), "count(DISTINCT x)");
    }

    #[test]
    fn test_nested_binary_is_parenthesized() {
        let expr = Expr::binary(
            Expr::binary(Expr::column("a"), BinaryOp::Add, Expr::integer(1)),
            BinaryOp::Multiply,
            Expr::column("b"),
        );
        assert_eq!(expr.to_string(), "(a + 1) * b");
    }

    #[test]
    fn test_literals() {
        assert_eq!(Expr::string("it's").to_string(), "'it''s'");
        assert_eq!(Expr::double(1.0).to_string(), "1.0");
        assert_eq!(Expr::null().to_string(), "NULL");
    }

    #[test]
    fn test_query_printable_form() {
        let query = Query::select(
            Select::new(vec![SelectItem::expr(Expr::column("t1.x"))])
                .from(Relation::join(
                    JoinKind::Inner,
                    Relation::table("t1"),
                    Relation::table("t2"),
                    Some(JoinCriteria::On(Expr::eq(
                        Expr::column("t1.id"),
                        Expr::column("t2.id"),
                    ))),
                ))
                .filter(Expr::gt(Expr::count_star(), Expr::integer(1))),
        )
        .limit(10);
        assert_eq!(
            query.to_string(),
            "SELECT t1.x FROM t1 JOIN t2 ON t1.id = t2.id WHERE count(*) > 1 LIMIT 10"
        );
    }
}
