//! In-memory catalog
//!
//! Every catalog exposes an `information_schema` schema with `schemata`,
//! `tables` and `columns` tables so rewritten SHOW statements resolve
//! like ordinary queries.

use crate::{CatalogError, CatalogResult, ColumnMetadata, Metadata, QualifiedObjectName, TableSchema};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlscope_types::SqlType;
use std::sync::Arc;

pub const INFORMATION_SCHEMA: &str = "information_schema";

type Tables = IndexMap<String, Vec<ColumnMetadata>>;
type Schemas = IndexMap<String, Tables>;

/// JSON layout: catalog -> schema -> table -> columns
///
/// ```json
/// {
///   "catalogs": {
///     "hive": {
///       "web": {
///         "orders": [
///           { "name": "id", "type": "bigint" },
///           { "name": "total", "type": "double" }
///         ]
///       }
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDescription {
    #[serde(default)]
    catalogs: IndexMap<String, Schemas>,
}

/// Thread-safe in-memory [`Metadata`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    catalogs: Arc<RwLock<IndexMap<String, Schemas>>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog description from a JSON string
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let description: CatalogDescription =
            serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        let catalogs = description
            .catalogs
            .into_iter()
            .map(|(catalog, schemas)| {
                let schemas = schemas
                    .into_iter()
                    .map(|(schema, tables)| {
                        let tables = tables
                            .into_iter()
                            .map(|(table, columns)| (table.to_lowercase(), columns))
                            .collect();
                        (schema.to_lowercase(), tables)
                    })
                    .collect();
                (catalog.to_lowercase(), schemas)
            })
            .collect::<IndexMap<_, _>>();
        log::debug!("loaded {} catalog(s) from JSON", catalogs.len());
        Ok(Self {
            catalogs: Arc::new(RwLock::new(catalogs)),
        })
    }

    /// Load a catalog description from a JSON file at runtime
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> CatalogResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn add_catalog(&self, catalog: &str) {
        self.catalogs
            .write()
            .entry(catalog.to_lowercase())
            .or_default();
    }

    pub fn add_schema(&self, catalog: &str, schema: &str) {
        self.catalogs
            .write()
            .entry(catalog.to_lowercase())
            .or_default()
            .entry(schema.to_lowercase())
            .or_default();
    }

    /// Register a table, creating its catalog and schema as needed
    pub fn add_table(&self, table: TableSchema) {
        let TableSchema { name, columns } = table;
        self.catalogs
            .write()
            .entry(name.catalog.to_lowercase())
            .or_default()
            .entry(name.schema.to_lowercase())
            .or_default()
            .insert(name.object.to_lowercase(), columns);
    }

    /// Builder form of [`add_table`](Self::add_table)
    pub fn with_table(self, name: QualifiedObjectName, columns: Vec<ColumnMetadata>) -> Self {
        self.add_table(TableSchema::new(name, columns));
        self
    }

    fn information_schema_table(&self, name: &QualifiedObjectName) -> Option<TableSchema> {
        let varchar = |n: &str| ColumnMetadata::new(n, SqlType::Varchar);
        let columns = match name.object.as_str() {
            "schemata" => vec![varchar("catalog_name"), varchar("schema_name")],
            "tables" => vec![
                varchar("table_catalog"),
                varchar("table_schema"),
                varchar("table_name"),
                varchar("table_type"),
            ],
            "columns" => vec![
                varchar("table_catalog"),
                varchar("table_schema"),
                varchar("table_name"),
                varchar("column_name"),
                ColumnMetadata::new("ordinal_position", SqlType::BigInt),
                varchar("data_type"),
                varchar("is_nullable"),
                varchar("comment"),
            ],
            _ => return None,
        };
        Some(TableSchema::new(name.clone(), columns))
    }
}

impl Metadata for InMemoryMetadata {
    fn catalog_exists(&self, catalog: &str) -> bool {
        self.catalogs.read().contains_key(&catalog.to_lowercase())
    }

    fn schema_exists(&self, catalog: &str, schema: &str) -> bool {
        let catalogs = self.catalogs.read();
        match catalogs.get(&catalog.to_lowercase()) {
            Some(_) if schema.eq_ignore_ascii_case(INFORMATION_SCHEMA) => true,
            Some(schemas) => schemas.contains_key(&schema.to_lowercase()),
            None => false,
        }
    }

    fn get_table(&self, name: &QualifiedObjectName) -> Option<TableSchema> {
        let name = QualifiedObjectName::new(
            name.catalog.to_lowercase(),
            name.schema.to_lowercase(),
            name.object.to_lowercase(),
        );
        if name.schema == INFORMATION_SCHEMA {
            if !self.catalog_exists(&name.catalog) {
                return None;
            }
            return self.information_schema_table(&name);
        }

        let catalogs = self.catalogs.read();
        let columns = catalogs
            .get(&name.catalog)?
            .get(&name.schema)?
            .get(&name.object)?
            .clone();
        Some(TableSchema::new(name, columns))
    }

    fn list_catalogs(&self) -> Vec<String> {
        self.catalogs.read().keys().cloned().collect()
    }
}
