//! Order command - print the table creation order.

use super::SourceArgs;
use anyhow::{Context, Result};
use mssql_schema_export::catalog::{CatalogConnector, Connector};
use mssql_schema_export::schema::resolve;
use serde::Serialize;

#[derive(Serialize)]
struct OrderJsonOutput {
    database: String,
    tables: Vec<String>,
    broken_dependencies: Vec<String>,
    unmatched_tables: Vec<String>,
}

pub fn run(source: &SourceArgs, json: bool) -> Result<()> {
    let settings = source
        .settings()
        .map_err(|e| super::usage_error("order", e))?;
    let (target, database) = settings
        .connection()
        .map_err(|e| super::usage_error("order", e))?;

    if !json {
        eprintln!("Resolving table order of [{}] from {}...", database, target);
    }

    let mut catalog = CatalogConnector.connect(&target, &database)?;
    let tables = catalog.tables().context("listing tables")?;
    let edges = catalog
        .table_dependencies(&tables)
        .context("discovering table dependencies")?;
    let resolution = resolve(&tables, &edges);

    if json {
        let output = OrderJsonOutput {
            database,
            tables: resolution.tables.iter().map(|t| t.name.to_string()).collect(),
            broken_dependencies: resolution
                .broken_edges
                .iter()
                .map(|e| e.to_string())
                .collect(),
            unmatched_tables: resolution.unmatched.iter().map(|n| n.to_string()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if resolution.tables.is_empty() {
        eprintln!("No tables found.");
        return Ok(());
    }

    if resolution.has_cycles() {
        eprintln!("\nWarning: Circular dependencies detected!");
        eprintln!("Dropped to break the cycles:");
        for edge in &resolution.broken_edges {
            eprintln!("  - {}", edge);
        }
    }

    eprintln!("\nCreation order ({} tables):", resolution.tables.len());
    for (i, name) in resolution.names().iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }

    if !resolution.unmatched.is_empty() {
        eprintln!("\nReferenced but not listed (skipped):");
        for name in &resolution.unmatched {
            eprintln!("  - {}", name);
        }
    }

    Ok(())
}
