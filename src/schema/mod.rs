//! Schema model for dependency-ordered export.
//!
//! This module provides:
//! - Object identity: schema-qualified names and object kinds
//! - Dependency edges between tables (from foreign keys)
//! - Table and module definitions consumed by the script renderer
//! - Dependency graph construction and table ordering (see [`graph`] and [`resolve`])

mod graph;
mod resolve;

pub use graph::*;
pub use resolve::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema assumed for names given without a qualifier
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Schema-qualified object name.
///
/// Ordering is ordinal on `(schema, name)`; it is the tie-break order used by the
/// resolver, so it must stay stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Name in the default `dbo` schema
    pub fn dbo(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_SCHEMA, name)
    }

    /// Unquoted `schema.name` form, used for console output
    pub fn unquoted(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Displays as a bracket-quoted T-SQL identifier, e.g. `[dbo].[Orders]`
impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl FromStr for QualifiedName {
    type Err = String;

    /// Accepts `name`, `schema.name`, and bracketed forms like `[dbo].[Order Items]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = split_identifier(s.trim())?;
        match parts.as_slice() {
            [name] => Ok(QualifiedName::dbo(name.clone())),
            [schema, name] => Ok(QualifiedName::new(schema.clone(), name.clone())),
            _ => Err(format!("invalid object name: {}", s)),
        }
    }
}

fn split_identifier(s: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut chars = s.chars().peekable();
    let mut current = String::new();

    while let Some(c) = chars.next() {
        match c {
            '[' => loop {
                match chars.next() {
                    Some(']') if chars.peek() == Some(&']') => {
                        chars.next();
                        current.push(']');
                    }
                    Some(']') => break,
                    Some(ch) => current.push(ch),
                    None => return Err(format!("unterminated bracket in name: {}", s)),
                }
            },
            '.' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    if parts.iter().any(|p| p.is_empty()) {
        return Err(format!("invalid object name: {}", s));
    }
    Ok(parts)
}

/// Quote an identifier with brackets, escaping `]` as `]]`
pub fn quote_ident(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// Kind of schema object the exporter handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    StoredProcedure,
    View,
}

impl ObjectKind {
    /// Object type as written in script headers (`Object:  Table [dbo].[X]`)
    pub fn script_label(self) -> &'static str {
        match self {
            ObjectKind::Table => "Table",
            ObjectKind::StoredProcedure => "StoredProcedure",
            ObjectKind::View => "View",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::StoredProcedure => write!(f, "stored procedure"),
            ObjectKind::View => write!(f, "view"),
        }
    }
}

/// An object listed by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaObject {
    pub kind: ObjectKind,
    pub name: QualifiedName,
    pub is_system_object: bool,
}

impl SchemaObject {
    pub fn table(name: QualifiedName) -> Self {
        Self {
            kind: ObjectKind::Table,
            name,
            is_system_object: false,
        }
    }

    pub fn stored_procedure(name: QualifiedName) -> Self {
        Self {
            kind: ObjectKind::StoredProcedure,
            name,
            is_system_object: false,
        }
    }

    pub fn view(name: QualifiedName) -> Self {
        Self {
            kind: ObjectKind::View,
            name,
            is_system_object: false,
        }
    }
}

/// `from` references `to` and must be created after it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: QualifiedName,
    pub to: QualifiedName,
}

impl DependencyEdge {
    pub fn new(from: QualifiedName, to: QualifiedName) -> Self {
        Self { from, to }
    }

    pub fn is_self_reference(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Column definition as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Catalog type name (`int`, `nvarchar`, `decimal`, ...)
    pub type_name: String,
    /// Storage length in bytes, -1 for `max`
    #[serde(default)]
    pub max_length: i16,
    #[serde(default)]
    pub precision: u8,
    #[serde(default)]
    pub scale: u8,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentitySpec>,
    /// Expression of a computed column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<ComputedSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultConstraint>,
}

fn default_true() -> bool {
    true
}

impl ColumnDefinition {
    /// Plain column of the given type, nullable, no extras
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            max_length: 0,
            precision: 0,
            scale: 0,
            is_nullable: true,
            identity: None,
            computed: None,
            collation: None,
            default: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub seed: i64,
    pub increment: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedSpec {
    pub definition: String,
    #[serde(default)]
    pub is_persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultConstraint {
    pub name: String,
    pub definition: String,
}

/// Column reference inside an index or key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    #[serde(default)]
    pub descending: bool,
}

/// Primary key, unique constraint, or plain index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub kind: IndexKind,
    #[serde(default)]
    pub clustered: bool,
    #[serde(default)]
    pub is_unique: bool,
    pub columns: Vec<IndexColumn>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    PrimaryKey,
    UniqueConstraint,
    Index,
}

impl IndexKind {
    /// Whether the index is scripted inline as a table constraint
    pub fn is_constraint(self) -> bool {
        matches!(self, IndexKind::PrimaryKey | IndexKind::UniqueConstraint)
    }
}

/// Referential action on delete/update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn to_sql(self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse `sys.foreign_keys.*_referential_action_desc` values
    pub fn from_catalog_desc(desc: &str) -> Option<Self> {
        match desc {
            "NO_ACTION" => Some(ReferentialAction::NoAction),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET_NULL" => Some(ReferentialAction::SetNull),
            "SET_DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Foreign key constraint definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: QualifiedName,
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub is_not_trusted: bool,
}

/// Complete table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: QualifiedName,
    #[serde(default)]
    pub is_system_object: bool,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyDefinition>,
}

impl TableDefinition {
    pub fn new(name: QualifiedName) -> Self {
        Self {
            name,
            is_system_object: false,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn object(&self) -> SchemaObject {
        SchemaObject {
            kind: ObjectKind::Table,
            name: self.name.clone(),
            is_system_object: self.is_system_object,
        }
    }

    /// One edge per foreign key, self-references included
    pub fn dependency_edges(&self) -> impl Iterator<Item = DependencyEdge> + '_ {
        self.foreign_keys
            .iter()
            .map(|fk| DependencyEdge::new(self.name.clone(), fk.referenced_table.clone()))
    }
}

/// Stored procedure or view body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: QualifiedName,
    #[serde(default)]
    pub is_system_object: bool,
    /// Module text; `None` when the module is encrypted
    pub definition: Option<String>,
    #[serde(default = "default_true")]
    pub uses_ansi_nulls: bool,
    #[serde(default = "default_true")]
    pub uses_quoted_identifier: bool,
}

impl ModuleDefinition {
    pub fn new(name: QualifiedName, definition: impl Into<String>) -> Self {
        Self {
            name,
            is_system_object: false,
            definition: Some(definition.into()),
            uses_ansi_nulls: true,
            uses_quoted_identifier: true,
        }
    }

    pub fn object(&self, kind: ObjectKind) -> SchemaObject {
        SchemaObject {
            kind,
            name: self.name.clone(),
            is_system_object: self.is_system_object,
        }
    }
}
