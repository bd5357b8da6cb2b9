//! Catalog boundary: listing schema objects, discovering table dependencies and
//! reading object definitions.

pub mod snapshot;

use crate::config::ConnectionTarget;
use crate::error::ConnectError;
use crate::schema::{DependencyEdge, ModuleDefinition, QualifiedName, SchemaObject, TableDefinition};
use anyhow::Result;

pub use snapshot::{SchemaSnapshot, SnapshotCatalog, SnapshotFormat};

/// An open session against one database's metadata
pub trait Catalog {
    /// Database the session is bound to
    fn database_name(&self) -> &str;

    /// All user tables
    fn tables(&mut self) -> Result<Vec<SchemaObject>>;

    /// All stored procedures, system objects flagged
    fn stored_procedures(&mut self) -> Result<Vec<SchemaObject>>;

    /// All views, system objects flagged
    fn views(&mut self) -> Result<Vec<SchemaObject>>;

    /// Raw reference edges for the given tables (`from` references `to`).
    ///
    /// Edges may point at tables outside `tables`; the resolver tolerates that.
    fn table_dependencies(&mut self, tables: &[SchemaObject]) -> Result<Vec<DependencyEdge>>;

    fn table_definition(&mut self, name: &QualifiedName) -> Result<TableDefinition>;

    fn module_definition(&mut self, object: &SchemaObject) -> Result<ModuleDefinition>;
}

/// Opens catalog sessions
pub trait Connector {
    /// Open a session on `database`; a missing database is [`ConnectError::UnknownDatabase`]
    fn connect(
        &self,
        target: &ConnectionTarget,
        database: &str,
    ) -> Result<Box<dyn Catalog>, ConnectError>;
}

/// Connects to whatever a [`ConnectionTarget`] names: a live server or a snapshot file
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogConnector;

impl Connector for CatalogConnector {
    fn connect(
        &self,
        target: &ConnectionTarget,
        database: &str,
    ) -> Result<Box<dyn Catalog>, ConnectError> {
        match target {
            ConnectionTarget::Server {
                address,
                credentials,
                trust_server_certificate,
            } => {
                let catalog = crate::mssql::MssqlCatalog::connect(
                    address,
                    credentials,
                    database,
                    *trust_server_certificate,
                )?;
                Ok(Box::new(catalog))
            }
            ConnectionTarget::Snapshot { path } => {
                let catalog = SnapshotCatalog::open(path, database)?;
                Ok(Box::new(catalog))
            }
        }
    }
}
