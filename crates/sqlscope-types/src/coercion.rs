//! Implicit and explicit conversion rules between SQL types
//!
//! Implicit coercions are the ones the analyzer may insert on its own when
//! matching function signatures, unifying CASE branches, set operation
//! columns and INSERT targets:
//! - unknown -> any type
//! - integer -> bigint -> double
//! - date -> timestamp

use crate::SqlType;
use thiserror::Error;

/// Coercion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// No implicit conversion exists
    #[error("Cannot implicitly coerce {from} to {to}")]
    NotCoercible { from: SqlType, to: SqlType },

    /// No common type exists for two operands
    #[error("Types {left} and {right} are not compatible")]
    Incompatible { left: SqlType, right: SqlType },

    /// No explicit cast exists
    #[error("Cannot cast {from} to {to}")]
    CannotCast { from: SqlType, to: SqlType },
}

/// Coercion result
pub type CoercionResult<T> = Result<T, CoercionError>;

/// Type coercion rules
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCoercer;

impl TypeCoercer {
    pub fn new() -> Self {
        Self
    }

    /// Check if implicit coercion from `from` to `to` is allowed
    pub fn can_coerce(&self, from: SqlType, to: SqlType) -> bool {
        self.conversion_cost(from, to).is_some()
    }

    /// Cost of an implicit coercion; lower is preferred, `None` if impossible
    ///
    /// Used to rank function overloads.
    pub fn conversion_cost(&self, from: SqlType, to: SqlType) -> Option<u32> {
        if from == to {
            return Some(0);
        }

        match (from, to) {
            (SqlType::Integer, SqlType::BigInt) => Some(1),
            (SqlType::Integer, SqlType::Double) => Some(2),
            (SqlType::BigInt, SqlType::Double) => Some(1),
            (SqlType::Date, SqlType::Timestamp) => Some(1),
            (SqlType::Unknown, _) => Some(5),
            _ => None,
        }
    }

    /// Narrowest type both operands coerce to
    pub fn common_super_type(&self, left: SqlType, right: SqlType) -> CoercionResult<SqlType> {
        if self.can_coerce(left, right) {
            return Ok(right);
        }
        if self.can_coerce(right, left) {
            return Ok(left);
        }
        // integer and double meet at double, already covered; the only
        // remaining pairs have no common type
        Err(CoercionError::Incompatible { left, right })
    }

    /// Fold `common_super_type` over a sequence, starting from unknown
    pub fn common_super_type_of(
        &self,
        types: impl IntoIterator<Item = SqlType>,
    ) -> CoercionResult<SqlType> {
        types
            .into_iter()
            .try_fold(SqlType::Unknown, |acc, ty| self.common_super_type(acc, ty))
    }

    /// Require an implicit coercion, reporting the failing pair
    pub fn coerce(&self, from: SqlType, to: SqlType) -> CoercionResult<SqlType> {
        if self.can_coerce(from, to) {
            Ok(to)
        } else {
            Err(CoercionError::NotCoercible { from, to })
        }
    }

    /// Check if an explicit `CAST(from AS to)` is valid
    pub fn can_cast(&self, from: SqlType, to: SqlType) -> bool {
        if self.can_coerce(from, to) {
            return true;
        }

        match (from, to) {
            (_, SqlType::Varchar) | (SqlType::Varchar, _) => to != SqlType::Unknown,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (SqlType::Boolean, b) if b.is_numeric() => true,
            (a, SqlType::Boolean) if a.is_numeric() => true,
            (SqlType::Timestamp, SqlType::Date) => true,
            _ => false,
        }
    }

    pub fn check_cast(&self, from: SqlType, to: SqlType) -> CoercionResult<SqlType> {
        if self.can_cast(from, to) {
            Ok(to)
        } else {
            Err(CoercionError::CannotCast { from, to })
        }
    }
}
