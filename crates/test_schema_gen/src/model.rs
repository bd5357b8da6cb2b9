//! Serialized snapshot shape.
//!
//! Field names follow the exporter's snapshot format; only the fields the
//! generator fills are modelled.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Name {
    pub schema: String,
    pub name: String,
}

impl Name {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}].[{}]", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    pub type_name: String,
    pub max_length: i16,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexColumn {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Index {
    pub name: String,
    pub kind: &'static str,
    pub clustered: bool,
    pub is_unique: bool,
    pub columns: Vec<IndexColumn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: Name,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub name: Name,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub name: Name,
    pub definition: String,
}

/// A generated database schema
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSchema {
    pub database: String,
    pub tables: Vec<Table>,
    pub stored_procedures: Vec<Module>,
    pub views: Vec<Module>,
}

impl GeneratedSchema {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// All reference edges as `(from, to)`, self-references included
    pub fn edges(&self) -> Vec<(&Name, &Name)> {
        self.tables
            .iter()
            .flat_map(|t| t.foreign_keys.iter().map(move |fk| (&t.name, &fk.referenced_table)))
            .collect()
    }

    /// Whether any reference chain leads back to where it started
    pub fn has_cycle(&self) -> bool {
        self.tables.iter().any(|t| {
            let mut stack: Vec<&Name> = t
                .foreign_keys
                .iter()
                .map(|fk| &fk.referenced_table)
                .filter(|n| *n != &t.name)
                .collect();
            let mut seen = std::collections::HashSet::new();
            while let Some(next) = stack.pop() {
                if next == &t.name {
                    return true;
                }
                if !seen.insert(next) {
                    continue;
                }
                if let Some(table) = self.tables.iter().find(|x| &x.name == next) {
                    stack.extend(
                        table
                            .foreign_keys
                            .iter()
                            .map(|fk| &fk.referenced_table)
                            .filter(|n| *n != next),
                    );
                }
            }
            false
        })
    }
}
