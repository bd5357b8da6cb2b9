//! File-backed catalog.
//!
//! A snapshot holds everything an export reads from a server: the table
//! definitions (with their foreign keys, which double as dependency edges) and
//! the module text of stored procedures and views. Exporting from a snapshot
//! reproduces the live export byte for byte.

use super::Catalog;
use crate::error::ConnectError;
use crate::schema::{
    DependencyEdge, ModuleDefinition, ObjectKind, QualifiedName, SchemaObject, TableDefinition,
};
use ahash::AHashSet;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Serialization format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Yaml,
}

impl SnapshotFormat {
    /// `.yaml`/`.yml` means YAML, anything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => SnapshotFormat::Yaml,
            _ => SnapshotFormat::Json,
        }
    }
}

impl std::str::FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "yaml" | "yml" => Ok(SnapshotFormat::Yaml),
            _ => Err(format!(
                "Unknown snapshot format: {}. Valid options: json, yaml",
                s
            )),
        }
    }
}

/// Captured schema of one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub database: String,
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
    #[serde(default)]
    pub stored_procedures: Vec<ModuleDefinition>,
    #[serde(default)]
    pub views: Vec<ModuleDefinition>,
}

impl SchemaSnapshot {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: Vec::new(),
            stored_procedures: Vec::new(),
            views: Vec::new(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::parse(&content, SnapshotFormat::from_path(path))
            .with_context(|| format!("failed to parse snapshot {}", path.display()))
    }

    pub fn parse(content: &str, format: SnapshotFormat) -> Result<Self> {
        let snapshot = match format {
            SnapshotFormat::Json => serde_json::from_str(content)?,
            SnapshotFormat::Yaml => serde_yaml_ng::from_str(content)?,
        };
        Ok(snapshot)
    }

    pub fn to_text(&self, format: SnapshotFormat) -> Result<String> {
        let mut text = match format {
            SnapshotFormat::Json => serde_json::to_string_pretty(self)?,
            SnapshotFormat::Yaml => serde_yaml_ng::to_string(self)?,
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_text(SnapshotFormat::from_path(path))?;
        fs::write(path, text).with_context(|| format!("failed to write snapshot {}", path.display()))
    }

    /// Capture everything the exporter reads from `catalog`.
    ///
    /// System stored procedures and views are left out; they are never exported.
    pub fn capture(catalog: &mut dyn Catalog) -> Result<Self> {
        let mut snapshot = SchemaSnapshot::new(catalog.database_name());

        for table in catalog.tables()? {
            let definition = catalog
                .table_definition(&table.name)
                .with_context(|| format!("reading table {}", table.name))?;
            snapshot.tables.push(definition);
        }

        for procedure in catalog.stored_procedures()? {
            if procedure.is_system_object {
                continue;
            }
            snapshot
                .stored_procedures
                .push(catalog.module_definition(&procedure)?);
        }

        for view in catalog.views()? {
            if view.is_system_object {
                continue;
            }
            snapshot.views.push(catalog.module_definition(&view)?);
        }

        tracing::info!(
            database = %snapshot.database,
            tables = snapshot.tables.len(),
            stored_procedures = snapshot.stored_procedures.len(),
            views = snapshot.views.len(),
            "captured schema snapshot"
        );
        Ok(snapshot)
    }
}

/// [`Catalog`] over a [`SchemaSnapshot`]; enumeration follows file order
#[derive(Debug, Clone)]
pub struct SnapshotCatalog {
    snapshot: SchemaSnapshot,
}

impl SnapshotCatalog {
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot and bind to `database`, which must match the snapshot's
    pub fn open(path: &Path, database: &str) -> Result<Self, ConnectError> {
        let snapshot = SchemaSnapshot::from_path(path)?;
        if snapshot.database != database {
            return Err(ConnectError::UnknownDatabase(database.to_string()));
        }
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }

    fn modules(&self, kind: ObjectKind) -> Result<&[ModuleDefinition]> {
        match kind {
            ObjectKind::StoredProcedure => Ok(&self.snapshot.stored_procedures),
            ObjectKind::View => Ok(&self.snapshot.views),
            ObjectKind::Table => bail!("tables have no module definition"),
        }
    }
}

impl Catalog for SnapshotCatalog {
    fn database_name(&self) -> &str {
        &self.snapshot.database
    }

    fn tables(&mut self) -> Result<Vec<SchemaObject>> {
        Ok(self.snapshot.tables.iter().map(TableDefinition::object).collect())
    }

    fn stored_procedures(&mut self) -> Result<Vec<SchemaObject>> {
        Ok(self
            .snapshot
            .stored_procedures
            .iter()
            .map(|m| m.object(ObjectKind::StoredProcedure))
            .collect())
    }

    fn views(&mut self) -> Result<Vec<SchemaObject>> {
        Ok(self
            .snapshot
            .views
            .iter()
            .map(|m| m.object(ObjectKind::View))
            .collect())
    }

    fn table_dependencies(&mut self, tables: &[SchemaObject]) -> Result<Vec<DependencyEdge>> {
        let wanted: AHashSet<&QualifiedName> = tables.iter().map(|t| &t.name).collect();
        Ok(self
            .snapshot
            .tables
            .iter()
            .filter(|t| wanted.contains(&t.name))
            .flat_map(TableDefinition::dependency_edges)
            .collect())
    }

    fn table_definition(&mut self, name: &QualifiedName) -> Result<TableDefinition> {
        self.snapshot
            .tables
            .iter()
            .find(|t| &t.name == name)
            .cloned()
            .ok_or_else(|| anyhow!("table {} not found in snapshot", name))
    }

    fn module_definition(&mut self, object: &SchemaObject) -> Result<ModuleDefinition> {
        self.modules(object.kind)?
            .iter()
            .find(|m| m.name == object.name)
            .cloned()
            .ok_or_else(|| anyhow!("{} {} not found in snapshot", object.kind, object.name))
    }
}
