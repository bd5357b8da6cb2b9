//! Snapshot command - capture a schema into a JSON or YAML file.

use super::SourceArgs;
use anyhow::Result;
use mssql_schema_export::catalog::{CatalogConnector, Connector, SchemaSnapshot, SnapshotFormat};
use std::path::PathBuf;

pub fn run(source: &SourceArgs, output: PathBuf) -> Result<()> {
    let settings = source
        .settings()
        .map_err(|e| super::usage_error("snapshot", e))?;
    let (target, database) = settings
        .connection()
        .map_err(|e| super::usage_error("snapshot", e))?;

    eprintln!("Capturing schema of [{}] from {}...", database, target);

    let mut catalog = CatalogConnector.connect(&target, &database)?;
    let snapshot = SchemaSnapshot::capture(catalog.as_mut())?;
    snapshot.save(&output)?;

    let format = match SnapshotFormat::from_path(&output) {
        SnapshotFormat::Json => "JSON",
        SnapshotFormat::Yaml => "YAML",
    };
    eprintln!(
        "Wrote {} snapshot to {}: {} tables, {} stored procedures, {} views",
        format,
        output.display(),
        snapshot.tables.len(),
        snapshot.stored_procedures.len(),
        snapshot.views.len()
    );

    Ok(())
}
