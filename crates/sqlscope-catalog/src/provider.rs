//! Collaborator traits the analyzer consults
//!
//! All three are `Send + Sync` so one instance can serve concurrent
//! analyses; each `analyze` call only reads through them.

use crate::Identity;
use serde::{Deserialize, Serialize};
use sqlscope_types::SqlType;
use std::fmt;

/// Fully qualified name of a catalog object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedObjectName {
    pub catalog: String,
    pub schema: String,
    pub object: String,
}

impl QualifiedObjectName {
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for QualifiedObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.object)
    }
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: SqlType,
    /// Hidden columns are addressable by name but excluded from `*`
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            data_type,
            hidden: false,
            comment: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Table schema as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: QualifiedObjectName,
    pub columns: Vec<ColumnMetadata>,
}

impl TableSchema {
    pub fn new(name: QualifiedObjectName, columns: Vec<ColumnMetadata>) -> Self {
        Self { name, columns }
    }

    /// Column by name, case-insensitively
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|c| !c.hidden)
    }
}

/// Catalog metadata lookup
pub trait Metadata: Send + Sync {
    fn catalog_exists(&self, catalog: &str) -> bool;

    fn schema_exists(&self, catalog: &str, schema: &str) -> bool;

    /// Look up a table; `None` if it does not exist
    fn get_table(&self, name: &QualifiedObjectName) -> Option<TableSchema>;

    /// Catalog names in a stable order
    fn list_catalogs(&self) -> Vec<String>;
}

/// How a function may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Scalar,
    Aggregate,
    /// Window-only functions such as `rank`; they require an OVER clause
    Window,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "scalar",
            Self::Aggregate => "aggregate",
            Self::Window => "window",
        })
    }
}

/// A function resolved against concrete argument types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFunction {
    pub name: String,
    pub kind: FunctionKind,
    /// Declared parameter types the arguments coerce to
    pub argument_types: Vec<SqlType>,
    pub return_type: SqlType,
}

/// Function lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionLookupError {
    #[error("Function '{0}' not registered")]
    NotFound(String),

    #[error("Unexpected parameters ({actual}) for function {name}. Expected: {expected}")]
    NoMatchingSignature {
        name: String,
        actual: String,
        expected: String,
    },
}

/// Function catalog
pub trait FunctionRegistry: Send + Sync {
    /// Pick the overload of `name` best matching `argument_types`
    fn resolve_function(
        &self,
        name: &str,
        argument_types: &[SqlType],
    ) -> Result<ResolvedFunction, FunctionLookupError>;

    fn function_kind(&self, name: &str) -> Option<FunctionKind>;

    fn is_aggregate(&self, name: &str) -> bool {
        matches!(self.function_kind(name), Some(FunctionKind::Aggregate))
    }

    /// Window-only function
    fn is_window(&self, name: &str) -> bool {
        matches!(self.function_kind(name), Some(FunctionKind::Window))
    }

    /// All registered signatures, ordered by name
    fn list_functions(&self) -> Vec<crate::FunctionSignature>;
}

/// Privilege checks
///
/// A `false` answer becomes an authorization error in the analyzer.
pub trait AccessControl: Send + Sync {
    fn can_select_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool;

    fn can_select_column(
        &self,
        identity: &Identity,
        table: &QualifiedObjectName,
        column: &str,
    ) -> bool;

    fn can_execute_function(&self, identity: &Identity, function: &str) -> bool;

    fn can_insert_into_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool;

    fn can_delete_from_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool;

    fn can_create_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool;
}

/// Errors loading catalog configuration
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
