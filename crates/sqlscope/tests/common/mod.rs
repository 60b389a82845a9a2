//! Shared fixtures for the end-to-end tests
//!
//! The catalog and the access rules are loaded from JSON the same way an
//! embedding application would load them.

#![allow(dead_code)]

use std::sync::Arc;

use sqlscope::ast::{Expr, Query, Relation, Select, SelectItem, Span, Statement};
use sqlscope::catalog::{BuiltinFunctionRegistry, InMemoryMetadata, RuleBasedAccessControl, Session};
use sqlscope::{Analysis, Analyzer, Result};

/// `hive.web` holds a small shop schema plus `t1`/`t2`, which share the
/// columns `id` and `x`. `memory.default` is empty.
pub const CATALOG_JSON: &str = r#"{
    "catalogs": {
        "hive": {
            "web": {
                "orders": [
                    {"name": "id", "type": "bigint"},
                    {"name": "customer_id", "type": "bigint"},
                    {"name": "total", "type": "double"},
                    {"name": "status", "type": "varchar"},
                    {"name": "placed_at", "type": "timestamp"},
                    {"name": "$path", "type": "varchar", "hidden": true}
                ],
                "customers": [
                    {"name": "id", "type": "bigint"},
                    {"name": "name", "type": "varchar"},
                    {"name": "region", "type": "varchar"}
                ],
                "t1": [
                    {"name": "id", "type": "bigint"},
                    {"name": "x", "type": "integer"}
                ],
                "t2": [
                    {"name": "id", "type": "bigint"},
                    {"name": "x", "type": "varchar"}
                ]
            }
        },
        "memory": {
            "default": {}
        }
    }
}"#;

/// Dave may not read customers; erin may not read `orders.customer_id`
/// and may not call `abs`.
pub const RULES_JSON: &str = r#"{
    "deny": [
        {"user": "dave", "privilege": "select", "object": "hive.web.customers"},
        {"user": "erin", "privilege": "select", "object": "hive.web.orders.customer_id"},
        {"user": "erin", "privilege": "execute", "object": "abs"}
    ]
}"#;

pub fn metadata() -> InMemoryMetadata {
    InMemoryMetadata::from_json(CATALOG_JSON).expect("fixture catalog parses")
}

pub fn access_control() -> RuleBasedAccessControl {
    RuleBasedAccessControl::from_json(RULES_JSON).expect("fixture rules parse")
}

pub fn session(user: &str) -> Session {
    Session::new(user).with_catalog("hive").with_schema("web")
}

pub fn analyzer_with(session: Session) -> Analyzer {
    Analyzer::new(
        session,
        Arc::new(metadata()),
        Arc::new(BuiltinFunctionRegistry::new()),
        Arc::new(access_control()),
    )
}

pub fn analyzer(user: &str) -> Analyzer {
    analyzer_with(session(user))
}

/// Analyze `statement` as alice, spanning the whole of `sql`
pub fn analyze(sql: &str, statement: Statement) -> Result<Analysis> {
    analyzer("alice").analyze(statement.spanned(Span::new(0, sql.len())), vec![], false)
}

/// `SELECT <items> FROM <table>`
pub fn select(items: Vec<SelectItem>, table: &str) -> Select {
    Select::new(items).from(Relation::table(table))
}

pub fn query(select: Select) -> Statement {
    Statement::from(Query::select(select))
}

pub fn columns(exprs: &[&str]) -> Vec<SelectItem> {
    exprs.iter().map(|e| SelectItem::expr(Expr::column(e))).collect()
}

/// `(name, type)` pairs of the output columns
pub fn output(analysis: &Analysis) -> Vec<(String, String)> {
    analysis
        .output_columns()
        .iter()
        .map(|c| (c.name.clone(), c.data_type.to_string()))
        .collect()
}
