//! Session context of an analysis call

use crate::{CatalogError, CatalogResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlscope_ast::{Spanned, Statement};

/// The principal a statement runs as
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user: String,
}

impl Identity {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

/// Session properties that change analysis behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionProperties {
    /// Drop columns the principal may not select from `*` expansion
    /// instead of failing
    pub hide_inaccessible_columns: bool,
}

/// Per-call session
///
/// Loaded from JSON:
///
/// ```json
/// {
///   "identity": { "user": "alice" },
///   "catalog": "hive",
///   "schema": "web",
///   "properties": { "hide_inaccessible_columns": true }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    /// Prepared statements by lower-cased name
    #[serde(default)]
    pub prepared_statements: IndexMap<String, Spanned<Statement>>,
    #[serde(default)]
    pub properties: SessionProperties,
}

impl Session {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            identity: Identity::new(user),
            catalog: None,
            schema: None,
            prepared_statements: IndexMap::new(),
            properties: SessionProperties::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_properties(mut self, properties: SessionProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_prepared_statement(
        mut self,
        name: impl Into<String>,
        statement: Spanned<Statement>,
    ) -> Self {
        self.prepared_statements
            .insert(name.into().to_lowercase(), statement);
        self
    }

    pub fn prepared_statement(&self, name: &str) -> Option<&Spanned<Statement>> {
        self.prepared_statements.get(&name.to_lowercase())
    }

    /// Load a session from a JSON string
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let mut session: Self =
            serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        session.prepared_statements = session
            .prepared_statements
            .into_iter()
            .map(|(name, statement)| (name.to_lowercase(), statement))
            .collect();
        Ok(session)
    }

    /// Load a session from a JSON file at runtime
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> CatalogResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlscope_ast::{Expr, Query, Select, SelectItem, Span};
    use std::io::Write;

    #[test]
    fn test_session_from_json_defaults() {
        let session = Session::from_json(r#"{"identity": {"user": "alice"}}"#).unwrap();
        assert_eq!(session.identity.user, "alice");
        assert_eq!(session.catalog, None);
        assert!(!session.properties.hide_inaccessible_columns);
        assert!(session.prepared_statements.is_empty());
    }

    #[test]
    fn test_session_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = r#"{
            "identity": {"user": "bob"},
            "catalog": "hive",
            "schema": "web",
            "properties": {"hide_inaccessible_columns": true}
        }"#;
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();

        let session = Session::from_json_file(file.path()).unwrap();
        assert_eq!(session.catalog.as_deref(), Some("hive"));
        assert_eq!(session.schema.as_deref(), Some("web"));
        assert!(session.properties.hide_inaccessible_columns);
    }

    #[test]
    fn test_session_from_missing_file() {
        let err = Session::from_json_file("/nonexistent/session.json").unwrap_err();
        assert!(matches!(err, CatalogError::IoError(_)));
    }

    #[test]
    fn test_prepared_statement_lookup_ignores_case() {
        let query = Query::select(Select::new(vec![SelectItem::expr(Expr::integer(1))]));
        let session = Session::new("alice")
            .with_prepared_statement("MyStmt", Statement::from(query).spanned(Span::SYNTHETIC));
        assert!(session.prepared_statement("mystmt").is_some());
        assert!(session.prepared_statement("other").is_none());
    }
}
