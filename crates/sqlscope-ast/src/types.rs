//! Type names as written in DDL and CAST

use serde::{Deserialize, Serialize};

/// A type as spelled in the statement, e.g. `varchar(20)`
///
/// Resolution to a system type happens in the analyzer, so an unknown name
/// is representable here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSpecifier {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<u32>,
}

impl TypeSpecifier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<u32>) -> Self {
        self.parameters = parameters;
        self
    }
}

impl From<&str> for TypeSpecifier {
    fn from(s: &str) -> Self {
        Self::named(s)
    }
}
