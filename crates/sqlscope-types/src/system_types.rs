//! SQL system types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Types the analyzer reasons about
///
/// `Unknown` is the type of a bare `NULL` literal and of parameters whose
/// type cannot be derived; it coerces to every other type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Unknown,
    Boolean,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    BigInt,
    /// 64-bit IEEE float
    Double,
    Varchar,
    Date,
    Timestamp,
}

impl SqlType {
    /// Canonical lower-case type name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Double => "double",
            Self::Varchar => "varchar",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
        }
    }

    /// Parse a type name as written in DDL or CAST, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "unknown" => Self::Unknown,
            "boolean" => Self::Boolean,
            "int" | "integer" => Self::Integer,
            "bigint" => Self::BigInt,
            "double" => Self::Double,
            "varchar" => Self::Varchar,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            _ => return None,
        };
        Some(ty)
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInt | Self::Double)
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Timestamp)
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Fixed storage width in bytes, where the type has one
    pub const fn fixed_size(&self) -> Option<u32> {
        match self {
            Self::Boolean => Some(1),
            Self::Integer | Self::Date => Some(4),
            Self::BigInt | Self::Double | Self::Timestamp => Some(8),
            Self::Unknown | Self::Varchar => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
