//! Access control implementations

use crate::{AccessControl, CatalogError, CatalogResult, Identity, QualifiedObjectName};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAccessControl;

impl AccessControl for AllowAllAccessControl {
    fn can_select_table(&self, _identity: &Identity, _table: &QualifiedObjectName) -> bool {
        true
    }

    fn can_select_column(
        &self,
        _identity: &Identity,
        _table: &QualifiedObjectName,
        _column: &str,
    ) -> bool {
        true
    }

    fn can_execute_function(&self, _identity: &Identity, _function: &str) -> bool {
        true
    }

    fn can_insert_into_table(&self, _identity: &Identity, _table: &QualifiedObjectName) -> bool {
        true
    }

    fn can_delete_from_table(&self, _identity: &Identity, _table: &QualifiedObjectName) -> bool {
        true
    }

    fn can_create_table(&self, _identity: &Identity, _table: &QualifiedObjectName) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Select,
    Insert,
    Delete,
    Create,
    Execute,
}

/// A deny rule
///
/// `object` is a dotted pattern where `*` matches any single part:
/// `hive.web.orders` for a table, `hive.web.orders.ssn` for a column,
/// `hive.*.*` for every table of a catalog, `abs` for a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyRule {
    /// Applies to every user when absent
    #[serde(default)]
    pub user: Option<String>,
    pub privilege: Privilege,
    pub object: String,
}

impl DenyRule {
    fn applies(&self, identity: &Identity, privilege: Privilege, object: &[&str]) -> bool {
        if self.privilege != privilege {
            return false;
        }
        if let Some(user) = &self.user {
            if user != &identity.user {
                return false;
            }
        }
        let pattern: Vec<&str> = self.object.split('.').collect();
        pattern.len() == object.len()
            && pattern
                .iter()
                .zip(object)
                .all(|(p, o)| *p == "*" || p.eq_ignore_ascii_case(o))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    deny: Vec<DenyRule>,
}

/// Allows everything not matched by a deny rule
///
/// Loaded from JSON:
///
/// ```json
/// { "deny": [ { "user": "bob", "privilege": "select", "object": "hive.web.orders.ssn" } ] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleBasedAccessControl {
    rules: Arc<RwLock<Vec<DenyRule>>>,
}

impl RuleBasedAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let file: RuleFile =
            serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        log::debug!("loaded {} deny rule(s)", file.deny.len());
        Ok(Self {
            rules: Arc::new(RwLock::new(file.deny)),
        })
    }

    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> CatalogResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Add a deny rule; `user` of `None` applies to everyone
    pub fn deny(self, user: Option<&str>, privilege: Privilege, object: &str) -> Self {
        self.rules.write().push(DenyRule {
            user: user.map(str::to_string),
            privilege,
            object: object.to_string(),
        });
        self
    }

    fn allowed(&self, identity: &Identity, privilege: Privilege, object: &[&str]) -> bool {
        !self
            .rules
            .read()
            .iter()
            .any(|rule| rule.applies(identity, privilege, object))
    }

    fn table_allowed(
        &self,
        identity: &Identity,
        privilege: Privilege,
        table: &QualifiedObjectName,
    ) -> bool {
        self.allowed(
            identity,
            privilege,
            &[table.catalog.as_str(), table.schema.as_str(), table.object.as_str()],
        )
    }
}

impl AccessControl for RuleBasedAccessControl {
    fn can_select_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool {
        self.table_allowed(identity, Privilege::Select, table)
    }

    fn can_select_column(
        &self,
        identity: &Identity,
        table: &QualifiedObjectName,
        column: &str,
    ) -> bool {
        self.allowed(
            identity,
            Privilege::Select,
            &[
                table.catalog.as_str(),
                table.schema.as_str(),
                table.object.as_str(),
                column,
            ],
        )
    }

    fn can_execute_function(&self, identity: &Identity, function: &str) -> bool {
        self.allowed(identity, Privilege::Execute, &[function])
    }

    fn can_insert_into_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool {
        self.table_allowed(identity, Privilege::Insert, table)
    }

    fn can_delete_from_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool {
        self.table_allowed(identity, Privilege::Delete, table)
    }

    fn can_create_table(&self, identity: &Identity, table: &QualifiedObjectName) -> bool {
        self.table_allowed(identity, Privilege::Create, table)
    }
}
