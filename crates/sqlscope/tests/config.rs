//! Loading collaborators from files and handing statements over as JSON

mod common;

use std::io::Write;
use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use sqlscope::ast::{Expr, Span, Spanned, Statement};
use sqlscope::catalog::{BuiltinFunctionRegistry, CatalogError, InMemoryMetadata, RuleBasedAccessControl, Session};
use sqlscope::Analyzer;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_analyzer_from_files() -> anyhow::Result<()> {
    let catalog = write_temp(CATALOG_JSON)?;
    let rules = write_temp(RULES_JSON)?;
    let session = write_temp(
        r#"{
            "identity": {"user": "erin"},
            "catalog": "hive",
            "schema": "web",
            "properties": {"hide_inaccessible_columns": true}
        }"#,
    )?;

    let analyzer = Analyzer::new(
        Session::from_json_file(session.path())?,
        Arc::new(InMemoryMetadata::from_json_file(catalog.path())?),
        Arc::new(BuiltinFunctionRegistry::new()),
        Arc::new(RuleBasedAccessControl::from_json_file(rules.path())?),
    );
    assert_eq!(analyzer.session().identity.user, "erin");

    let statement = query(
        sqlscope::ast::Select::new(vec![sqlscope::ast::SelectItem::wildcard()])
            .from(sqlscope::ast::Relation::table("orders")),
    );
    let analysis = analyzer.analyze(statement.spanned(Span::new(0, 20)), vec![], false)?;
    let names: Vec<_> = output(&analysis).into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["id", "total", "status", "placed_at"]);
    Ok(())
}

#[test]
fn test_missing_config_file() {
    let err = InMemoryMetadata::from_json_file("/nonexistent/catalog.json").unwrap_err();
    assert!(matches!(err, CatalogError::IoError(_)));
}

#[test]
fn test_statement_json_handoff() -> anyhow::Result<()> {
    let statement = query(
        select(columns(&["status"]), "orders")
            .filter(Expr::gt(Expr::identifier("total"), Expr::parameter(0))),
    )
    .spanned(Span::new(0, 42));
    let json = serde_json::to_string(&statement)?;
    let received: Spanned<Statement> = serde_json::from_str(&json)?;
    assert_eq!(received, statement);

    let analysis = analyzer("alice").analyze(received, vec![Expr::double(10.0)], false)?;
    assert_eq!(output(&analysis), vec![("status".to_string(), "varchar".to_string())]);
    assert_eq!(analysis.parameter_types(), &[sqlscope::types::SqlType::Double]);
    Ok(())
}

#[test]
fn test_analysis_serializes() -> anyhow::Result<()> {
    let analysis = analyze("SELECT id FROM t1", query(select(columns(&["id"]), "t1")))?;
    let value = serde_json::to_value(&analysis)?;
    assert!(value.is_object());
    Ok(())
}
