//! Export orchestration.
//!
//! One run removes the old artifact, opens a catalog session, writes the
//! `USE [db]` header, and then appends tables (in dependency order), stored
//! procedures and views, one phase after another. The first failure aborts the
//! run; bytes already appended stay on disk.

use crate::catalog::{Catalog, CatalogConnector, Connector};
use crate::config::ExportJob;
use crate::error::{ConnectError, ExportError};
use crate::schema::{self, DependencyEdge, ObjectKind, QualifiedName, SchemaObject};
use crate::script::{ScriptOptions, ScriptRenderer, TsqlScripter};
use crate::writer::{self, ScriptWriter};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Result of one object phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseOutcome {
    /// The catalog listed nothing to export; not an error
    Empty,
    Exported { count: usize },
}

impl PhaseOutcome {
    fn from_count(count: usize) -> Self {
        if count == 0 {
            PhaseOutcome::Empty
        } else {
            PhaseOutcome::Exported { count }
        }
    }

    pub fn count(&self) -> usize {
        match self {
            PhaseOutcome::Empty => 0,
            PhaseOutcome::Exported { count } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PhaseOutcome::Empty)
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseOutcome::Empty => write!(f, "none"),
            PhaseOutcome::Exported { count } => write!(f, "{}", count),
        }
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub database: String,
    pub output_path: PathBuf,
    pub tables: PhaseOutcome,
    pub stored_procedures: PhaseOutcome,
    pub views: PhaseOutcome,
    /// Reference edges dropped to break cycles, `from -> to`
    pub broken_dependencies: Vec<String>,
    /// Dependency targets the catalog did not list; not scripted
    pub unmatched_tables: Vec<String>,
    /// Artifact size including the header
    pub bytes_written: u64,
    pub sha256: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ExportReport {
    pub fn objects_exported(&self) -> usize {
        self.tables.count() + self.stored_procedures.count() + self.views.count()
    }
}

/// Progress notifications; purely observational
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Connected { database: String },
    PhaseStarted { kind: ObjectKind, total: usize },
    DependencyBroken { edge: DependencyEdge },
    ObjectExported {
        kind: ObjectKind,
        name: QualifiedName,
        position: usize,
        total: usize,
    },
    PhaseFinished { kind: ObjectKind, outcome: PhaseOutcome },
}

type ProgressFn<'a> = Box<dyn FnMut(&ExportEvent) + 'a>;

/// Drives one export run over a [`Connector`] and a [`ScriptRenderer`]
pub struct Exporter<'a> {
    connector: Box<dyn Connector + 'a>,
    renderer: Box<dyn ScriptRenderer + 'a>,
    progress: Option<ProgressFn<'a>>,
}

impl Default for Exporter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Exporter<'a> {
    /// Exporter over live servers and snapshot files, rendering T-SQL
    pub fn new() -> Self {
        Self {
            connector: Box::new(CatalogConnector),
            renderer: Box::new(TsqlScripter::new()),
            progress: None,
        }
    }

    pub fn with_connector(mut self, connector: impl Connector + 'a) -> Self {
        self.connector = Box::new(connector);
        self
    }

    pub fn with_renderer(mut self, renderer: impl ScriptRenderer + 'a) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_progress(mut self, progress: impl FnMut(&ExportEvent) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn emit(&mut self, event: ExportEvent) {
        if let Some(progress) = self.progress.as_mut() {
            progress(&event);
        }
    }

    /// Run the export described by `job`
    pub fn run(&mut self, job: ExportJob) -> Result<ExportReport, ExportError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let path = job.output_path.as_path();

        ScriptWriter::remove_existing(path).map_err(|e| output_error(path, e))?;

        let mut catalog = self
            .connector
            .connect(&job.connection, &job.database)
            .map_err(|e| match e {
                ConnectError::UnknownDatabase(name) => ExportError::UnknownDatabase { name },
                ConnectError::Failed(source) => ExportError::Connectivity {
                    target: job.connection.to_string(),
                    source,
                },
            })?;
        tracing::info!(database = %job.database, source = %job.connection, "connected");
        self.emit(ExportEvent::Connected {
            database: job.database.clone(),
        });

        if job.use_db_context {
            tracing::debug!("database context requested; the artifact header already selects the database");
        }

        let header_bytes =
            ScriptWriter::create_with_header(path, &job.database).map_err(|e| output_error(path, e))?;
        let mut artifact = ScriptWriter::open_append(path).map_err(|e| output_error(path, e))?;

        let catalog = catalog.as_mut();
        let options = job.script_options;

        let (tables, resolution) = self.export_tables(catalog, &options, &mut artifact)?;

        let procedures = catalog
            .stored_procedures()
            .map_err(|source| ExportError::Catalog {
                kind: ObjectKind::StoredProcedure,
                source,
            })?;
        let stored_procedures =
            self.export_modules(catalog, &options, &mut artifact, ObjectKind::StoredProcedure, procedures)?;

        let views = catalog.views().map_err(|source| ExportError::Catalog {
            kind: ObjectKind::View,
            source,
        })?;
        let views = self.export_modules(catalog, &options, &mut artifact, ObjectKind::View, views)?;

        let appended = artifact.finish().map_err(|e| output_error(path, e))?;
        let sha256 = writer::file_digest(path).map_err(|e| output_error(path, e))?;

        let report = ExportReport {
            database: job.database.clone(),
            output_path: job.output_path.clone(),
            tables,
            stored_procedures,
            views,
            broken_dependencies: resolution.broken_edges.iter().map(|e| e.to_string()).collect(),
            unmatched_tables: resolution.unmatched.iter().map(|n| n.to_string()).collect(),
            bytes_written: header_bytes + appended,
            sha256,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            database = %report.database,
            tables = %report.tables,
            stored_procedures = %report.stored_procedures,
            views = %report.views,
            bytes = report.bytes_written,
            "export complete"
        );
        Ok(report)
    }

    fn export_tables(
        &mut self,
        catalog: &mut dyn Catalog,
        options: &ScriptOptions,
        artifact: &mut ScriptWriter,
    ) -> Result<(PhaseOutcome, schema::Resolution), ExportError> {
        let catalog_error = |source| ExportError::Catalog {
            kind: ObjectKind::Table,
            source,
        };

        let tables = catalog.tables().map_err(catalog_error)?;
        if tables.is_empty() {
            tracing::info!("no tables");
            self.emit(ExportEvent::PhaseFinished {
                kind: ObjectKind::Table,
                outcome: PhaseOutcome::Empty,
            });
            return Ok((PhaseOutcome::Empty, schema::Resolution::default()));
        }

        let edges = catalog.table_dependencies(&tables).map_err(catalog_error)?;
        let resolution = schema::resolve(&tables, &edges);
        for edge in &resolution.broken_edges {
            tracing::warn!(
                from = %edge.from,
                to = %edge.to,
                "dependency cycle broken; table is created before the table it references"
            );
            self.emit(ExportEvent::DependencyBroken { edge: edge.clone() });
        }

        let count = self.render_all(catalog, options, artifact, ObjectKind::Table, &resolution.tables)?;
        Ok((PhaseOutcome::from_count(count), resolution))
    }

    fn export_modules(
        &mut self,
        catalog: &mut dyn Catalog,
        options: &ScriptOptions,
        artifact: &mut ScriptWriter,
        kind: ObjectKind,
        objects: Vec<SchemaObject>,
    ) -> Result<PhaseOutcome, ExportError> {
        let objects: Vec<SchemaObject> = objects.into_iter().filter(|o| !o.is_system_object).collect();
        if objects.is_empty() {
            tracing::info!(kind = %kind, "none to export");
            self.emit(ExportEvent::PhaseFinished {
                kind,
                outcome: PhaseOutcome::Empty,
            });
            return Ok(PhaseOutcome::Empty);
        }

        let count = self.render_all(catalog, options, artifact, kind, &objects)?;
        Ok(PhaseOutcome::from_count(count))
    }

    fn render_all(
        &mut self,
        catalog: &mut dyn Catalog,
        options: &ScriptOptions,
        artifact: &mut ScriptWriter,
        kind: ObjectKind,
        objects: &[SchemaObject],
    ) -> Result<usize, ExportError> {
        let total = objects.len();
        self.emit(ExportEvent::PhaseStarted { kind, total });

        for (i, object) in objects.iter().enumerate() {
            tracing::debug!(kind = %kind, name = %object.name, "scripting");
            self.renderer
                .render(catalog, object, options, artifact)
                .map_err(|source| ExportError::Render {
                    kind,
                    name: object.name.clone(),
                    source,
                })?;
            self.emit(ExportEvent::ObjectExported {
                kind,
                name: object.name.clone(),
                position: i + 1,
                total,
            });
        }

        let outcome = PhaseOutcome::from_count(total);
        tracing::info!(kind = %kind, count = total, "phase complete");
        self.emit(ExportEvent::PhaseFinished { kind, outcome });
        Ok(total)
    }
}

fn output_error(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Output {
        path: path.to_path_buf(),
        source,
    }
}
