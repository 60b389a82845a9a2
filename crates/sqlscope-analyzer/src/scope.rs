//! Scope management for SQL semantic analysis
//!
//! Scopes form a tree stored in an arena and addressed by [`ScopeId`]. A
//! frame is pushed whenever the resolver enters a query block, a subquery,
//! a lateral relation or a WITH clause. Frames hold the relations visible
//! at that level, each with its fields, plus the named queries defined by
//! a WITH clause. Lookups walk from the innermost frame outward; a field
//! found in an outer frame is a correlated reference.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use sqlscope_ast::NodeId;
use sqlscope_catalog::QualifiedObjectName;
use sqlscope_diagnostics::{SQL0206, SQL0207};
use sqlscope_types::SqlType;
use std::fmt;

use crate::error::{Result, SemanticError};

/// Index of a frame in the [`ScopeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

/// Kind of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    /// Statement level; holds nothing
    Root,
    /// A query block (SELECT, VALUES, set operation)
    Query,
    /// A subquery expression or derived table
    Subquery,
    /// LATERAL relation
    Lateral,
    /// Named queries of a WITH clause
    With,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Root => write!(f, "Root"),
            ScopeKind::Query => write!(f, "Query"),
            ScopeKind::Subquery => write!(f, "Subquery"),
            ScopeKind::Lateral => write!(f, "Lateral"),
            ScopeKind::With => write!(f, "With"),
        }
    }
}

/// Base table column a field was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnOrigin {
    pub table: QualifiedObjectName,
    pub column: String,
}

/// A column of a relation or of a query's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Canonical name; `None` for unnamed columns such as VALUES columns
    pub name: Option<String>,
    pub data_type: SqlType,
    /// Addressable by name, skipped by `*`
    pub hidden: bool,
    pub origin: Option<ColumnOrigin>,
    /// Named by an explicit alias
    pub aliased: bool,
}

impl Field {
    pub fn new(name: Option<String>, data_type: SqlType) -> Self {
        Self {
            name,
            data_type,
            hidden: false,
            origin: None,
            aliased: false,
        }
    }

    /// Field backed by a base table column
    pub fn column(table: &QualifiedObjectName, name: &str, data_type: SqlType, hidden: bool) -> Self {
        let name = name.to_lowercase();
        Self {
            origin: Some(ColumnOrigin {
                table: table.clone(),
                column: name.clone(),
            }),
            name: Some(name),
            data_type,
            hidden,
            aliased: false,
        }
    }

    pub fn with_origin(mut self, origin: Option<ColumnOrigin>) -> Self {
        self.origin = origin;
        self
    }

    pub fn aliased(mut self, aliased: bool) -> Self {
        self.aliased = aliased;
        self
    }

    /// Same field under a new name
    pub fn renamed(&self, name: String) -> Self {
        Self {
            name: Some(name),
            aliased: true,
            ..self.clone()
        }
    }
}

/// How a relation can be qualified in column references
///
/// A base table `hive.web.orders` matches `orders.x`, `web.orders.x` and
/// `hive.web.orders.x`; an alias matches only by its single name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationAlias {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl RelationAlias {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: name.into(),
        }
    }

    pub fn table(name: &QualifiedObjectName) -> Self {
        Self {
            catalog: Some(name.catalog.clone()),
            schema: Some(name.schema.clone()),
            table: name.object.clone(),
        }
    }

    /// Whether a canonical qualifier such as `["web", "orders"]` names
    /// this relation
    pub fn matches(&self, qualifier: &[String]) -> bool {
        let eq = |part: &Option<String>, q: &String| part.as_ref().is_some_and(|p| p == q);
        match qualifier {
            [table] => &self.table == table,
            [schema, table] => eq(&self.schema, schema) && &self.table == table,
            [catalog, schema, table] => {
                eq(&self.catalog, catalog) && eq(&self.schema, schema) && &self.table == table
            }
            _ => false,
        }
    }
}

impl fmt::Display for RelationAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table)
    }
}

/// A relation visible in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeRelation {
    /// The FROM-clause node it came from
    pub node: NodeId,
    pub alias: Option<RelationAlias>,
    pub fields: Vec<Field>,
}

impl ScopeRelation {
    pub fn new(node: NodeId, alias: Option<RelationAlias>, fields: Vec<Field>) -> Self {
        Self {
            node,
            alias,
            fields,
        }
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = (usize, &Field)> {
        self.fields.iter().enumerate().filter(|(_, f)| !f.hidden)
    }
}

/// A WITH query registered in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub node: NodeId,
    pub fields: Vec<Field>,
}

/// Column merged by `JOIN ... USING`; unqualified references resolve to
/// the left side instead of being ambiguous
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsingColumn {
    pub name: String,
    pub relation: usize,
    pub field: usize,
}

/// One frame of the scope tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    relations: Vec<ScopeRelation>,
    ctes: IndexMap<String, NamedQuery>,
    using: Vec<UsingColumn>,
    /// Relations lookups may see while a join condition is analyzed
    #[serde(skip)]
    join_visible: Option<Vec<usize>>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            relations: Vec::new(),
            ctes: IndexMap::new(),
            using: Vec::new(),
            join_visible: None,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn relations(&self) -> &[ScopeRelation] {
        &self.relations
    }

    pub fn named_queries(&self) -> impl Iterator<Item = (&String, &NamedQuery)> {
        self.ctes.iter()
    }

    fn is_visible(&self, relation: usize) -> bool {
        self.join_visible
            .as_ref()
            .is_none_or(|visible| visible.contains(&relation))
    }
}

/// Location of a resolved field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub scope: ScopeId,
    pub relation: usize,
    pub field: usize,
    /// Found in a frame enclosing the one the lookup started from
    pub correlated: bool,
}

/// Outcome of a column lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLookup {
    Found(FieldRef),
    /// Printable candidates, e.g. `["t1.x", "t2.x"]`
    Ambiguous(Vec<String>),
    NotFound,
}

/// Arena of scope frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeArena {
    frames: Vec<Scope>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    /// Arena holding a single root frame
    pub fn new() -> Self {
        Self {
            frames: vec![Scope::new(ScopeKind::Root, None)],
        }
    }

    pub const fn root() -> ScopeId {
        ScopeId(0)
    }

    pub fn push(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.frames.len());
        log::trace!(
            "enter {id} ({kind}){}",
            parent.map(|p| format!(" under {p}")).unwrap_or_default()
        );
        self.frames.push(Scope::new(kind, parent));
        id
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, id: ScopeId) -> Result<&Scope> {
        self.frames
            .get(id.0)
            .ok_or_else(|| SemanticError::internal(format!("Missing scope frame: {id}")))
    }

    fn get_mut(&mut self, id: ScopeId) -> Result<&mut Scope> {
        self.frames
            .get_mut(id.0)
            .ok_or_else(|| SemanticError::internal(format!("Missing scope frame: {id}")))
    }

    /// Frames from `id` outward to the root
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = (ScopeId, &Scope)> {
        std::iter::successors(
            self.frames.get(id.0).map(|scope| (id, scope)),
            |(_, scope)| {
                scope
                    .parent
                    .and_then(|p| self.frames.get(p.0).map(|s| (p, s)))
            },
        )
    }

    /// Add a relation to a frame, returning its index
    ///
    /// Two relations of one frame may not share an alias.
    pub fn add_relation(&mut self, id: ScopeId, relation: ScopeRelation) -> Result<usize> {
        let frame = self.get_mut(id)?;
        if let Some(alias) = &relation.alias {
            if frame
                .relations
                .iter()
                .any(|existing| existing.alias.as_ref() == Some(alias))
            {
                return Err(SemanticError::new(
                    SQL0206,
                    format!("Duplicate table alias '{alias}'"),
                )
                .with_node(relation.node));
            }
        }
        log::trace!(
            "{id}: add relation {} with {} field(s)",
            relation
                .alias
                .as_ref()
                .map_or_else(|| "<anonymous>".to_string(), ToString::to_string),
            relation.fields.len()
        );
        frame.relations.push(relation);
        Ok(frame.relations.len() - 1)
    }

    pub fn add_named_query(&mut self, id: ScopeId, name: &str, query: NamedQuery) -> Result<()> {
        let frame = self.get_mut(id)?;
        if frame.ctes.contains_key(name) {
            return Err(SemanticError::new(
                SQL0207,
                format!("WITH query name '{name}' specified more than once"),
            )
            .with_node(query.node));
        }
        frame.ctes.insert(name.to_string(), query);
        Ok(())
    }

    /// Innermost named query called `name` visible from `id`
    pub fn find_named_query(&self, id: ScopeId, name: &str) -> Option<&NamedQuery> {
        self.ancestors(id).find_map(|(_, scope)| scope.ctes.get(name))
    }

    pub fn add_using_column(&mut self, id: ScopeId, column: UsingColumn) -> Result<()> {
        self.get_mut(id)?.using.push(column);
        Ok(())
    }

    /// Limit lookups in frame `id` to `relations`, or lift the limit with
    /// `None`; returns the previous limit so nested joins can restore it
    pub fn restrict_to_join(&mut self, id: ScopeId, relations: Option<Vec<usize>>) -> Result<Option<Vec<usize>>> {
        let frame = self.get_mut(id)?;
        Ok(std::mem::replace(&mut frame.join_visible, relations))
    }

    pub fn field(&self, field: &FieldRef) -> Result<&Field> {
        self.get(field.scope)?
            .relations
            .get(field.relation)
            .and_then(|r| r.fields.get(field.field))
            .ok_or_else(|| SemanticError::internal(format!("Dangling field reference in {}", field.scope)))
    }

    pub fn relation(&self, id: ScopeId, index: usize) -> Result<&ScopeRelation> {
        self.get(id)?
            .relations
            .get(index)
            .ok_or_else(|| SemanticError::internal(format!("Dangling relation {index} in {id}")))
    }

    /// Resolve a column by canonical qualifier and name
    ///
    /// The innermost frame with a match wins. Within a frame more than one
    /// match is ambiguous unless an unqualified name is a USING column.
    pub fn lookup_column(&self, start: ScopeId, qualifier: &[String], name: &str) -> ColumnLookup {
        for (id, scope) in self.ancestors(start) {
            let mut matches: SmallVec<[(usize, usize); 2]> = SmallVec::new();
            for (ri, relation) in scope.relations.iter().enumerate() {
                if !scope.is_visible(ri) {
                    continue;
                }
                if !qualifier.is_empty()
                    && !relation.alias.as_ref().is_some_and(|a| a.matches(qualifier))
                {
                    continue;
                }
                for (fi, field) in relation.fields.iter().enumerate() {
                    if field.name.as_deref() == Some(name) {
                        matches.push((ri, fi));
                    }
                }
            }

            let found = |relation, field| {
                ColumnLookup::Found(FieldRef {
                    scope: id,
                    relation,
                    field,
                    correlated: id != start,
                })
            };
            match matches.as_slice() {
                [] => continue,
                [(relation, field)] => return found(*relation, *field),
                _ => {
                    if qualifier.is_empty() {
                        if let Some(using) = scope.using.iter().find(|u| u.name == name) {
                            return found(using.relation, using.field);
                        }
                    }
                    let candidates = matches
                        .iter()
                        .map(|(ri, _)| match &scope.relations[*ri].alias {
                            Some(alias) => format!("{alias}.{name}"),
                            None => name.to_string(),
                        })
                        .collect();
                    return ColumnLookup::Ambiguous(candidates);
                }
            }
        }
        ColumnLookup::NotFound
    }

    /// Relations of one frame a `*` or `t.*` expands over
    pub fn wildcard_relations(&self, id: ScopeId, qualifier: &[String]) -> Result<Vec<usize>> {
        Ok(self
            .get(id)?
            .relations
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                qualifier.is_empty() || r.alias.as_ref().is_some_and(|a| a.matches(qualifier))
            })
            .map(|(i, _)| i)
            .collect())
    }
}
