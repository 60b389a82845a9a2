//! Literal values

use serde::{Deserialize, Serialize};

/// A literal value in an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Integer literal; typed `integer` when it fits in 32 bits, else `bigint`
    Integer(i64),
    Double(f64),
    String(String),
    /// `DATE '2024-01-31'`
    Date(String),
    /// `TIMESTAMP '2024-01-31 10:00:00'`
    Timestamp(String),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether an integer literal fits the 32-bit `integer` type
    pub fn fits_integer(value: i64) -> bool {
        i32::try_from(value).is_ok()
    }
}
