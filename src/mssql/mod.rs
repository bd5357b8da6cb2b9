//! Live SQL Server catalog over TDS.
//!
//! The session owns a current-thread tokio runtime and blocks on each query, so
//! callers see a plain synchronous [`Catalog`] and the export stays strictly
//! sequential.

mod query;

use crate::catalog::Catalog;
use crate::config::{Credentials, ServerAddress};
use crate::error::ConnectError;
use crate::schema::{
    quote_ident, DependencyEdge, ModuleDefinition, ObjectKind, QualifiedName, SchemaObject,
    TableDefinition,
};
use ahash::AHashSet;
use anyhow::{Context, Result};
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

pub(crate) type SqlClient = Client<Compat<TcpStream>>;

const APPLICATION_NAME: &str = "mssql-schema-export";

/// Catalog session bound to one database on a live server
pub struct MssqlCatalog {
    runtime: Runtime,
    client: SqlClient,
    database: String,
    system_tables: AHashSet<QualifiedName>,
}

impl MssqlCatalog {
    /// Log in, check that `database` exists, and switch to it
    pub fn connect(
        address: &ServerAddress,
        credentials: &Credentials,
        database: &str,
        trust_server_certificate: bool,
    ) -> Result<Self, ConnectError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting I/O runtime")?;

        let mut config = Config::new();
        config.host(&address.host);
        config.port(address.port);
        config.authentication(AuthMethod::sql_server(
            &credentials.login,
            credentials.password(),
        ));
        config.application_name(APPLICATION_NAME);
        if trust_server_certificate {
            config.trust_cert();
        }

        tracing::debug!(server = %address, login = %credentials.login, "connecting");
        let mut client = runtime.block_on(async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .with_context(|| format!("connecting to SQL Server at {}", address))?;
            tcp.set_nodelay(true)
                .context("setting nodelay socket option")?;

            Client::connect(config, tcp.compat_write())
                .await
                .context("logging in to SQL Server")
        })?;

        let exists = runtime.block_on(query::database_exists(&mut client, database))?;
        if !exists {
            return Err(ConnectError::UnknownDatabase(database.to_string()));
        }
        runtime
            .block_on(client.execute(format!("USE {}", quote_ident(database)), &[]))
            .with_context(|| format!("selecting database {}", database))?;

        Ok(Self {
            runtime,
            client,
            database: database.to_string(),
            system_tables: AHashSet::new(),
        })
    }
}

impl Catalog for MssqlCatalog {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn tables(&mut self) -> Result<Vec<SchemaObject>> {
        let tables = self
            .runtime
            .block_on(query::list_objects(&mut self.client, ObjectKind::Table))?;
        self.system_tables = tables
            .iter()
            .filter(|t| t.is_system_object)
            .map(|t| t.name.clone())
            .collect();
        Ok(tables)
    }

    fn stored_procedures(&mut self) -> Result<Vec<SchemaObject>> {
        self.runtime
            .block_on(query::list_objects(&mut self.client, ObjectKind::StoredProcedure))
    }

    fn views(&mut self) -> Result<Vec<SchemaObject>> {
        self.runtime
            .block_on(query::list_objects(&mut self.client, ObjectKind::View))
    }

    fn table_dependencies(&mut self, tables: &[SchemaObject]) -> Result<Vec<DependencyEdge>> {
        let wanted: AHashSet<&QualifiedName> = tables.iter().map(|t| &t.name).collect();
        let edges = self
            .runtime
            .block_on(query::foreign_key_edges(&mut self.client))?;
        Ok(edges
            .into_iter()
            .filter(|e| wanted.contains(&e.from))
            .collect())
    }

    fn table_definition(&mut self, name: &QualifiedName) -> Result<TableDefinition> {
        let mut definition = self
            .runtime
            .block_on(query::table_definition(&mut self.client, name))?;
        definition.is_system_object = self.system_tables.contains(name);
        Ok(definition)
    }

    fn module_definition(&mut self, object: &SchemaObject) -> Result<ModuleDefinition> {
        let mut module = self
            .runtime
            .block_on(query::module_definition(&mut self.client, &object.name))?;
        module.is_system_object = object.is_system_object;
        Ok(module)
    }
}
