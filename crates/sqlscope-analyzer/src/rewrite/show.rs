//! SHOW statements as ordinary queries
//!
//! Catalog, schema, table and column listings read the virtual
//! `information_schema` tables; function listings are a VALUES relation
//! built from the registry.

use sqlscope_ast::{
    Expr, Identifier, QualifiedName, Query, Relation, Select, SelectItem, ShowColumns,
    ShowFunctions, ShowSchemas, ShowTables, SortItem, Spanned, Statement,
};
use sqlscope_diagnostics::{SQL0101, SQL0102};

use super::RewriteContext;
use crate::error::{Result, SemanticError};

pub(super) fn rewrite(ctx: &RewriteContext<'_>, statement: Spanned<Statement>) -> Result<Spanned<Statement>> {
    let span = statement.span;
    let query = match &statement.inner {
        Statement::ShowCatalogs(show) => show_catalogs(ctx, show.like.as_deref()),
        Statement::ShowSchemas(show) => show_schemas(ctx, show)?,
        Statement::ShowTables(show) => show_tables(ctx, show)?,
        Statement::ShowColumns(show) => show_columns(ctx, show)?,
        Statement::ShowFunctions(show) => show_functions(ctx, show),
        _ => return Ok(statement),
    };
    Ok(Statement::from(query).spanned(span))
}

fn missing_catalog() -> SemanticError {
    SemanticError::new(
        SQL0101,
        "Catalog must be specified when session catalog is not set",
    )
}

fn missing_schema() -> SemanticError {
    SemanticError::new(SQL0102, "Schema must be specified when session schema is not set")
}

fn session_catalog(ctx: &RewriteContext<'_>) -> Result<String> {
    ctx.session.catalog.clone().ok_or_else(missing_catalog)
}

fn session_schema(ctx: &RewriteContext<'_>) -> Result<String> {
    ctx.session.schema.clone().ok_or_else(missing_schema)
}

/// `catalog.information_schema.table`
fn information_schema(catalog: &str, table: &str) -> Relation {
    Relation::new(sqlscope_ast::RelationKind::Table(QualifiedName::new(vec![
        Identifier::new(catalog),
        Identifier::new("information_schema"),
        Identifier::new(table),
    ])))
}

/// `column AS "Title"`
fn titled(column: &str, title: &str) -> SelectItem {
    SelectItem::aliased(Expr::identifier(column), Identifier::quoted(title))
}

fn like(column: &str, pattern: Option<&str>) -> Option<Expr> {
    pattern.map(|p| Expr::like(Expr::identifier(column), p))
}

fn conjunction(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    predicates.into_iter().reduce(Expr::and)
}

fn listing(
    items: Vec<SelectItem>,
    from: Relation,
    predicate: Option<Expr>,
    order_by: &str,
) -> Query {
    let mut select = Select::new(items).from(from);
    select.where_clause = predicate;
    Query::select(select).order_by(vec![SortItem::ascending(Expr::identifier(order_by))])
}

fn show_catalogs(ctx: &RewriteContext<'_>, pattern: Option<&str>) -> Query {
    let catalogs = ctx.metadata.list_catalogs();
    let (rows, empty) = if catalogs.is_empty() {
        (vec![vec![Expr::string("")]], true)
    } else {
        (catalogs.into_iter().map(|c| vec![Expr::string(c)]).collect(), false)
    };
    let predicate = if empty {
        Some(Expr::boolean(false))
    } else {
        like("catalog_name", pattern)
    };
    listing(
        vec![titled("catalog_name", "Catalog")],
        Relation::values(rows).alias_with_columns("catalogs", &["catalog_name"]),
        predicate,
        "catalog_name",
    )
}

fn show_schemas(ctx: &RewriteContext<'_>, show: &ShowSchemas) -> Result<Query> {
    let catalog = match &show.catalog {
        Some(catalog) => catalog.canonical(),
        None => session_catalog(ctx)?,
    };
    Ok(listing(
        vec![titled("schema_name", "Schema")],
        information_schema(&catalog, "schemata"),
        like("schema_name", show.like.as_deref()),
        "schema_name",
    ))
}

fn show_tables(ctx: &RewriteContext<'_>, show: &ShowTables) -> Result<Query> {
    let (catalog, schema) = match show.schema.as_ref().map(QualifiedName::canonical_parts) {
        None => (session_catalog(ctx)?, session_schema(ctx)?),
        Some(parts) => match parts.as_slice() {
            [schema] => (session_catalog(ctx)?, schema.clone()),
            [catalog, schema] => (catalog.clone(), schema.clone()),
            _ => {
                return Err(SemanticError::new(
                    SQL0102,
                    format!("Too many parts in schema name: {}", parts.join(".")),
                ));
            }
        },
    };
    let predicate = conjunction(
        std::iter::once(Expr::eq(Expr::identifier("table_schema"), Expr::string(schema)))
            .chain(like("table_name", show.like.as_deref())),
    );
    Ok(listing(
        vec![titled("table_name", "Table")],
        information_schema(&catalog, "tables"),
        predicate,
        "table_name",
    ))
}

fn show_columns(ctx: &RewriteContext<'_>, show: &ShowColumns) -> Result<Query> {
    let parts = show.table.canonical_parts();
    let (catalog, schema, table) = match parts.as_slice() {
        [table] => (session_catalog(ctx)?, session_schema(ctx)?, table.clone()),
        [schema, table] => (session_catalog(ctx)?, schema.clone(), table.clone()),
        [catalog, schema, table] => (catalog.clone(), schema.clone(), table.clone()),
        _ => {
            return Err(SemanticError::new(
                SQL0102,
                format!("Too many parts in table name: {}", show.table),
            ));
        }
    };
    let predicate = conjunction([
        Expr::eq(Expr::identifier("table_schema"), Expr::string(schema)),
        Expr::eq(Expr::identifier("table_name"), Expr::string(table)),
    ]);
    Ok(listing(
        vec![
            titled("column_name", "Column"),
            titled("data_type", "Type"),
            titled("comment", "Comment"),
        ],
        information_schema(&catalog, "columns"),
        predicate,
        "ordinal_position",
    ))
}

fn show_functions(ctx: &RewriteContext<'_>, show: &ShowFunctions) -> Query {
    let functions = ctx.functions.list_functions();
    let empty = functions.is_empty();
    let rows: Vec<Vec<Expr>> = if empty {
        vec![(0..4).map(|_| Expr::string("")).collect()]
    } else {
        functions
            .iter()
            .map(|f| {
                vec![
                    Expr::string(f.name.clone()),
                    Expr::string(f.return_type_name()),
                    Expr::string(f.argument_list()),
                    Expr::string(f.kind.to_string()),
                ]
            })
            .collect()
    };
    let predicate = if empty {
        Some(Expr::boolean(false))
    } else {
        like("function_name", show.like.as_deref())
    };
    listing(
        vec![
            titled("function_name", "Function"),
            titled("return_type", "Return Type"),
            titled("argument_types", "Argument Types"),
            titled("function_type", "Function Type"),
        ],
        Relation::values(rows).alias_with_columns(
            "functions",
            &["function_name", "return_type", "argument_types", "function_type"],
        ),
        predicate,
        "function_name",
    )
}
