//! Statement tree for SQL semantic analysis
//!
//! The tree is produced by an external parser (or deserialized from JSON)
//! and consumed read-only by the analyzer. Rewrites build new trees rather
//! than mutating the input. Every expression, relation and query node
//! carries a [`NodeId`] that the analyzer keys its side tables by.

mod display;
mod expression;
mod literal;
mod operator;
mod query;
mod statement;
mod types;

pub use expression::*;
pub use literal::*;
pub use operator::*;
pub use query::*;
pub use statement::*;
pub use types::*;

pub use sqlscope_diagnostics::Span;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// A node with source span information
pub type Spanned<T> = sqlscope_diagnostics::Spanned<T>;

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a tree node
///
/// Two structurally equal sub-trees at different positions have different
/// ids, so analysis results never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A SQL identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The identifier text as written
    pub value: String,
    /// Whether this is a quoted (delimited) identifier
    pub quoted: bool,
}

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: false,
        }
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quoted: true,
        }
    }

    /// Name used for comparisons: lower-cased unless quoted
    pub fn canonical(&self) -> String {
        if self.quoted {
            self.value.clone()
        } else {
            self.value.to_lowercase()
        }
    }

    /// Compare against an already canonical name
    pub fn matches(&self, canonical: &str) -> bool {
        if self.quoted {
            self.value == canonical
        } else {
            self.value.eq_ignore_ascii_case(canonical)
        }
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A dotted name such as `catalog.schema.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub parts: Vec<Identifier>,
}

impl QualifiedName {
    pub fn new(parts: Vec<Identifier>) -> Self {
        Self { parts }
    }

    pub fn of<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Last part of the name
    ///
    /// Names always have at least one part; an empty name yields an empty
    /// identifier rather than panicking.
    pub fn suffix(&self) -> Identifier {
        self.parts
            .last()
            .cloned()
            .unwrap_or_else(|| Identifier::new(""))
    }

    /// Everything but the last part
    pub fn prefix(&self) -> Option<QualifiedName> {
        if self.parts.len() < 2 {
            return None;
        }
        Some(Self::new(self.parts[..self.parts.len() - 1].to_vec()))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Canonical parts
    pub fn canonical_parts(&self) -> Vec<String> {
        self.parts.iter().map(Identifier::canonical).collect()
    }

    /// Whether `other` matches the trailing parts of this name
    ///
    /// `hive.web.orders` has suffix `orders` and `web.orders`.
    pub fn has_suffix(&self, other: &QualifiedName) -> bool {
        if other.len() > self.len() {
            return false;
        }
        let skip = self.len() - other.len();
        self.parts[skip..]
            .iter()
            .zip(&other.parts)
            .all(|(mine, theirs)| mine.canonical() == theirs.canonical())
    }
}

/// Split on dots; quoting is not recognized
impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::of(s.split('.'))
    }
}
