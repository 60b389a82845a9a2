//! Analyzer error codes following a structured numbering system
//!
//! Error code ranges:
//! - SQL0001-SQL0099: Syntax errors (reserved for the external parser)
//! - SQL0100-SQL0199: Rewrite errors (statement shape normalization)
//! - SQL0200-SQL0299: Resolution errors (name lookup, duplicates, arity)
//! - SQL0300-SQL0349: Type errors
//! - SQL0350-SQL0399: Authorization errors
//! - SQL0400-SQL0499: Placement and legality errors
//! - SQL0500-SQL0549: Unsupported constructs
//! - SQL0550-SQL0599: Internal errors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Classify the code by its range
    pub const fn kind(&self) -> ErrorKind {
        match self.0 {
            1..=99 => ErrorKind::Syntax,
            100..=199 => ErrorKind::Rewrite,
            200..=299 => ErrorKind::Resolution,
            300..=349 => ErrorKind::Type,
            350..=399 => ErrorKind::Authorization,
            400..=499 => ErrorKind::Placement,
            500..=549 => ErrorKind::NotSupported,
            _ => ErrorKind::Internal,
        }
    }

    pub const fn is_rewrite_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Rewrite)
    }

    pub const fn is_resolution_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Resolution)
    }

    pub const fn is_type_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Type)
    }

    pub const fn is_authorization_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Authorization)
    }

    pub const fn is_placement_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Placement)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SQL{:04}", self.0)
    }
}

/// Broad category of an error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Syntax,
    Rewrite,
    Resolution,
    Type,
    Authorization,
    Placement,
    NotSupported,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syntax => "syntax",
            Self::Rewrite => "rewrite",
            Self::Resolution => "resolution",
            Self::Type => "type",
            Self::Authorization => "authorization",
            Self::Placement => "placement",
            Self::NotSupported => "not supported",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Rewrite errors (0100-0199)
    map.insert(100, ErrorInfo::new("Prepared statement not found"));
    map.insert(101, ErrorInfo::new("Missing catalog name")
        .with_help("Qualify the name or set a session catalog"));
    map.insert(102, ErrorInfo::new("Missing schema name")
        .with_help("Qualify the name or set a session schema"));
    map.insert(103, ErrorInfo::new("Duplicate EXPLAIN option"));
    map.insert(104, ErrorInfo::new("Invalid EXPLAIN option"));

    // Resolution errors (0200-0299)
    map.insert(200, ErrorInfo::new("Table not found"));
    map.insert(201, ErrorInfo::new("Column not found")
        .with_help("Check that the column exists in one of the relations in scope"));
    map.insert(202, ErrorInfo::new("Function not found"));
    map.insert(203, ErrorInfo::new("Catalog not found"));
    map.insert(204, ErrorInfo::new("Schema not found"));
    map.insert(205, ErrorInfo::new("Ambiguous name")
        .with_help("Qualify the column with a table name or alias"));
    map.insert(206, ErrorInfo::new("Duplicate relation alias"));
    map.insert(207, ErrorInfo::new("Duplicate named query"));
    map.insert(208, ErrorInfo::new("Mismatched column aliases"));
    map.insert(209, ErrorInfo::new("Table already exists"));
    map.insert(210, ErrorInfo::new("Duplicate column name"));
    map.insert(211, ErrorInfo::new("Invalid parameter usage"));
    map.insert(212, ErrorInfo::new("Mismatched column count"));
    map.insert(213, ErrorInfo::new("Missing column name"));

    // Type errors (0300-0349)
    map.insert(300, ErrorInfo::new("Type mismatch"));
    map.insert(301, ErrorInfo::new("No matching function signature"));
    map.insert(302, ErrorInfo::new("Unknown type"));
    map.insert(303, ErrorInfo::new("Subquery has too many columns"));

    // Authorization errors (0350-0399)
    map.insert(350, ErrorInfo::new("Access denied"));

    // Placement errors (0400-0499)
    map.insert(400, ErrorInfo::new("Aggregation or window function in a clause that forbids it"));
    map.insert(401, ErrorInfo::new("Nested aggregation"));
    map.insert(402, ErrorInfo::new("Nested window function"));
    map.insert(403, ErrorInfo::new("Expression is not an aggregate and does not appear in GROUP BY"));
    map.insert(404, ErrorInfo::new("Window function requires an OVER clause"));
    map.insert(405, ErrorInfo::new("Invalid function usage"));

    // Unsupported (0500-0549)
    map.insert(500, ErrorInfo::new("Not supported"));

    // Internal (0550-0599)
    map.insert(550, ErrorInfo::new("Internal analyzer error"));

    map
});

// Rewrite errors
pub const SQL0100: ErrorCode = ErrorCode::new(100);
pub const SQL0101: ErrorCode = ErrorCode::new(101);
pub const SQL0102: ErrorCode = ErrorCode::new(102);
pub const SQL0103: ErrorCode = ErrorCode::new(103);
pub const SQL0104: ErrorCode = ErrorCode::new(104);

// Resolution errors
pub const SQL0200: ErrorCode = ErrorCode::new(200);
pub const SQL0201: ErrorCode = ErrorCode::new(201);
pub const SQL0202: ErrorCode = ErrorCode::new(202);
pub const SQL0203: ErrorCode = ErrorCode::new(203);
pub const SQL0204: ErrorCode = ErrorCode::new(204);
pub const SQL0205: ErrorCode = ErrorCode::new(205);
pub const SQL0206: ErrorCode = ErrorCode::new(206);
pub const SQL0207: ErrorCode = ErrorCode::new(207);
pub const SQL0208: ErrorCode = ErrorCode::new(208);
pub const SQL0209: ErrorCode = ErrorCode::new(209);
pub const SQL0210: ErrorCode = ErrorCode::new(210);
pub const SQL0211: ErrorCode = ErrorCode::new(211);
pub const SQL0212: ErrorCode = ErrorCode::new(212);
pub const SQL0213: ErrorCode = ErrorCode::new(213);

// Type errors
pub const SQL0300: ErrorCode = ErrorCode::new(300);
pub const SQL0301: ErrorCode = ErrorCode::new(301);
pub const SQL0302: ErrorCode = ErrorCode::new(302);
pub const SQL0303: ErrorCode = ErrorCode::new(303);

// Authorization errors
pub const SQL0350: ErrorCode = ErrorCode::new(350);

// Placement errors
pub const SQL0400: ErrorCode = ErrorCode::new(400);
pub const SQL0401: ErrorCode = ErrorCode::new(401);
pub const SQL0402: ErrorCode = ErrorCode::new(402);
pub const SQL0403: ErrorCode = ErrorCode::new(403);
pub const SQL0404: ErrorCode = ErrorCode::new(404);
pub const SQL0405: ErrorCode = ErrorCode::new(405);

// Unsupported
pub const SQL0500: ErrorCode = ErrorCode::new(500);

// Internal
pub const SQL0550: ErrorCode = ErrorCode::new(550);
