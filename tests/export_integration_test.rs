//! Integration tests for the export orchestrator, driven through snapshot and
//! in-test catalogs so no SQL Server is needed.

use anyhow::{anyhow, bail};
use mssql_schema_export::catalog::{Catalog, Connector, SchemaSnapshot, SnapshotCatalog};
use mssql_schema_export::config::{ConnectionTarget, ExportJob};
use mssql_schema_export::error::{ConnectError, ExportError};
use mssql_schema_export::export::{ExportEvent, Exporter, PhaseOutcome};
use mssql_schema_export::schema::{
    ColumnDefinition, DependencyEdge, ForeignKeyDefinition, IndexColumn, IndexDefinition,
    IndexKind, ModuleDefinition, ObjectKind, QualifiedName, ReferentialAction, SchemaObject,
    TableDefinition,
};
use mssql_schema_export::script::{ScriptOptions, ScriptRenderer, TsqlScripter};
use mssql_schema_export::writer::ScriptWriter;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn table(name: &str, references: &[&str]) -> TableDefinition {
    let mut t = TableDefinition::new(QualifiedName::dbo(name));
    let mut id = ColumnDefinition::new(format!("{}Id", name), "int");
    id.is_nullable = false;
    t.columns.push(id);
    t.indexes.push(IndexDefinition {
        name: format!("PK_{}", name),
        kind: IndexKind::PrimaryKey,
        clustered: true,
        is_unique: true,
        columns: vec![IndexColumn {
            name: format!("{}Id", name),
            descending: false,
        }],
        included_columns: vec![],
        filter: None,
    });
    for r in references {
        t.columns.push(ColumnDefinition::new(format!("{}Id", r), "int"));
        t.foreign_keys.push(ForeignKeyDefinition {
            name: format!("FK_{}_{}", name, r),
            columns: vec![format!("{}Id", r)],
            referenced_table: QualifiedName::dbo(*r),
            referenced_columns: vec![format!("{}Id", r)],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
            is_disabled: false,
            is_not_trusted: false,
        });
    }
    t
}

fn module(name: &str, body: &str) -> ModuleDefinition {
    ModuleDefinition::new(QualifiedName::dbo(name), body)
}

fn shop() -> SchemaSnapshot {
    let mut snapshot = SchemaSnapshot::new("Shop");
    snapshot.tables = vec![
        table("Orders", &["Customers"]),
        table("OrderLines", &["Orders", "Products"]),
        table("Customers", &[]),
        table("Products", &[]),
    ];
    snapshot.stored_procedures = vec![
        module("usp_Zeta", "CREATE PROCEDURE [dbo].[usp_Zeta] AS SELECT 1"),
        module("usp_Alpha", "CREATE PROCEDURE [dbo].[usp_Alpha] AS SELECT 2"),
    ];
    let mut system = module("sp_helpdiagrams", "CREATE PROCEDURE [dbo].[sp_helpdiagrams] AS RETURN");
    system.is_system_object = true;
    snapshot.stored_procedures.push(system);
    snapshot.views = vec![module(
        "vw_OrderTotals",
        "CREATE VIEW [dbo].[vw_OrderTotals]\nAS\nSELECT o.OrderId FROM dbo.Orders o",
    )];
    snapshot
}

fn write_snapshot(dir: &TempDir, snapshot: &SchemaSnapshot) -> PathBuf {
    let path = dir.path().join("snapshot.json");
    snapshot.save(&path).unwrap();
    path
}

fn snapshot_job(snapshot_path: &Path, database: &str, output: &Path) -> ExportJob {
    ExportJob::new(
        ConnectionTarget::Snapshot {
            path: snapshot_path.to_path_buf(),
        },
        database,
        output,
    )
}

/// Hands out in-memory catalogs; the target is ignored
struct FixedConnector<F>(F);

impl<F> Connector for FixedConnector<F>
where
    F: Fn(&str) -> Result<Box<dyn Catalog>, ConnectError>,
{
    fn connect(
        &self,
        _target: &ConnectionTarget,
        database: &str,
    ) -> Result<Box<dyn Catalog>, ConnectError> {
        (self.0)(database)
    }
}

/// Snapshot catalog whose view listing fails
struct BrokenViews(SnapshotCatalog);

impl Catalog for BrokenViews {
    fn database_name(&self) -> &str {
        self.0.database_name()
    }
    fn tables(&mut self) -> anyhow::Result<Vec<SchemaObject>> {
        self.0.tables()
    }
    fn stored_procedures(&mut self) -> anyhow::Result<Vec<SchemaObject>> {
        self.0.stored_procedures()
    }
    fn views(&mut self) -> anyhow::Result<Vec<SchemaObject>> {
        bail!("permission denied on sys.views")
    }
    fn table_dependencies(&mut self, tables: &[SchemaObject]) -> anyhow::Result<Vec<DependencyEdge>> {
        self.0.table_dependencies(tables)
    }
    fn table_definition(&mut self, name: &QualifiedName) -> anyhow::Result<TableDefinition> {
        self.0.table_definition(name)
    }
    fn module_definition(&mut self, object: &SchemaObject) -> anyhow::Result<ModuleDefinition> {
        self.0.module_definition(object)
    }
}

/// Renders like the real scripter but fails on one object
struct FailOn {
    name: &'static str,
    inner: TsqlScripter,
}

impl ScriptRenderer for FailOn {
    fn render(
        &mut self,
        catalog: &mut dyn Catalog,
        object: &SchemaObject,
        options: &ScriptOptions,
        artifact: &mut ScriptWriter,
    ) -> anyhow::Result<()> {
        if object.name.name == self.name {
            return Err(anyhow!("scripting engine refused {}", object.name));
        }
        self.inner.render(catalog, object, options, artifact)
    }
}

#[test]
fn test_export_writes_header_then_phases_in_order() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let output = dir.path().join("shop.sql");

    let report = Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();
    let content = fs::read_to_string(&output).unwrap();

    assert!(content.starts_with("USE [Shop]\r\nGO\r\n"));
    assert_eq!(&fs::read(&output).unwrap()[..16], b"USE [Shop]\r\nGO\r\n");
    assert_eq!(content.matches("USE [Shop]").count(), 1);

    let pos = |needle: &str| {
        content
            .find(needle)
            .unwrap_or_else(|| panic!("{} missing from output", needle))
    };
    let customers = pos("Object:  Table [dbo].[Customers]");
    let orders = pos("Object:  Table [dbo].[Orders]");
    let products = pos("Object:  Table [dbo].[Products]");
    let lines = pos("Object:  Table [dbo].[OrderLines]");
    let zeta = pos("Object:  StoredProcedure [dbo].[usp_Zeta]");
    let alpha = pos("Object:  StoredProcedure [dbo].[usp_Alpha]");
    let view = pos("Object:  View [dbo].[vw_OrderTotals]");

    assert!(customers < orders);
    assert!(orders < lines && products < lines);
    assert!(lines < zeta);
    // Procedures keep catalog order
    assert!(zeta < alpha);
    assert!(alpha < view);

    assert_eq!(report.tables, PhaseOutcome::Exported { count: 4 });
    assert_eq!(report.stored_procedures, PhaseOutcome::Exported { count: 2 });
    assert_eq!(report.views, PhaseOutcome::Exported { count: 1 });
    assert_eq!(report.objects_exported(), 7);
    assert_eq!(report.bytes_written, content.len() as u64);
    assert!(report.broken_dependencies.is_empty());
}

#[test]
fn test_module_text_exported_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut snapshot = shop();
    snapshot.stored_procedures = vec![module(
        "usp_Lines",
        "CREATE PROCEDURE [dbo].[usp_Lines] AS SELECT 'a\nb' AS x",
    )];
    let snapshot = write_snapshot(&dir, &snapshot);
    let output = dir.path().join("shop.sql");

    Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();
    let content = fs::read_to_string(&output).unwrap();

    assert!(content.contains("SELECT 'a\nb' AS x\r\nGO\r\n"));
    assert!(!content.contains("'a\r\nb'"));
    assert!(content.contains("CREATE VIEW [dbo].[vw_OrderTotals]\nAS\nSELECT o.OrderId"));
}

#[test]
fn test_system_procedures_not_exported() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let output = dir.path().join("shop.sql");

    Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();
    let content = fs::read_to_string(&output).unwrap();
    assert!(!content.contains("sp_helpdiagrams"));
}

#[test]
fn test_two_runs_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let first = dir.path().join("first.sql");
    let second = dir.path().join("second.sql");

    let a = Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &first))
        .unwrap();
    let b = Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &second))
        .unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    assert_eq!(a.sha256, b.sha256);
}

#[test]
fn test_rerun_replaces_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let output = dir.path().join("shop.sql");

    fs::write(&output, "-- stale content\r\nGO\r\n").unwrap();
    Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();
    let once = fs::read(&output).unwrap();

    Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();
    let twice = fs::read(&output).unwrap();

    assert_eq!(once, twice);
    assert!(!String::from_utf8(twice).unwrap().contains("stale"));
}

#[test]
fn test_empty_procedure_phase_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let mut schema = shop();
    schema.stored_procedures.retain(|p| p.is_system_object);
    let snapshot = write_snapshot(&dir, &schema);
    let output = dir.path().join("shop.sql");

    let report = Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();

    assert_eq!(report.stored_procedures, PhaseOutcome::Empty);
    assert_eq!(report.stored_procedures.to_string(), "none");
    let content = fs::read_to_string(&output).unwrap();
    assert!(content.contains("Object:  Table"));
    assert!(!content.contains("Object:  StoredProcedure"));
    assert!(content.contains("Object:  View"));
}

#[test]
fn test_empty_database_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &SchemaSnapshot::new("Empty"));
    let output = dir.path().join("empty.sql");

    let report = Exporter::new()
        .run(snapshot_job(&snapshot, "Empty", &output))
        .unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "USE [Empty]\r\nGO\r\n");
    assert!(report.tables.is_empty());
    assert!(report.stored_procedures.is_empty());
    assert!(report.views.is_empty());
}

#[test]
fn test_cycle_is_broken_and_reported() {
    let dir = TempDir::new().unwrap();
    let mut schema = SchemaSnapshot::new("Loop");
    schema.tables = vec![table("A", &["B"]), table("B", &["C"]), table("C", &["A"])];
    let snapshot = write_snapshot(&dir, &schema);
    let output = dir.path().join("loop.sql");

    let report = Exporter::new()
        .run(snapshot_job(&snapshot, "Loop", &output))
        .unwrap();

    assert_eq!(report.tables, PhaseOutcome::Exported { count: 3 });
    assert_eq!(report.broken_dependencies, vec!["[dbo].[B] -> [dbo].[C]"]);

    let content = fs::read_to_string(&output).unwrap();
    let b = content.find("Object:  Table [dbo].[B]").unwrap();
    let a = content.find("Object:  Table [dbo].[A]").unwrap();
    let c = content.find("Object:  Table [dbo].[C]").unwrap();
    assert!(b < a && a < c);
}

#[test]
fn test_unknown_database_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let output = dir.path().join("shop.sql");
    fs::write(&output, "old").unwrap();

    let err = Exporter::new()
        .run(snapshot_job(&snapshot, "Nope", &output))
        .unwrap_err();

    assert!(matches!(&err, ExportError::UnknownDatabase { name } if name == "Nope"));
    assert!(err.is_configuration());
    // Old artifact is gone and no new one was started
    assert!(!output.exists());
}

#[test]
fn test_connection_failure_is_connectivity_error() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("shop.sql");
    let connector = FixedConnector(|_: &str| -> Result<Box<dyn Catalog>, ConnectError> {
        Err(ConnectError::Failed(anyhow!("login failed for user 'sa'")))
    });

    let err = Exporter::new()
        .with_connector(connector)
        .run(snapshot_job(Path::new("unused.json"), "Shop", &output))
        .unwrap_err();

    match err {
        ExportError::Connectivity { source, .. } => {
            assert!(source.to_string().contains("login failed"))
        }
        other => panic!("unexpected error {}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_render_failure_aborts_and_keeps_prior_bytes() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let output = dir.path().join("shop.sql");

    let err = Exporter::new()
        .with_renderer(FailOn {
            name: "OrderLines",
            inner: TsqlScripter::new(),
        })
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap_err();

    match &err {
        ExportError::Render { kind, name, .. } => {
            assert_eq!(*kind, ObjectKind::Table);
            assert_eq!(name, &QualifiedName::dbo("OrderLines"));
        }
        other => panic!("unexpected error {}", other),
    }

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("USE [Shop]\r\nGO\r\n"));
    assert!(content.contains("[dbo].[Orders]"));
    assert!(!content.contains("StoredProcedure"));
}

#[test]
fn test_catalog_failure_in_view_phase_aborts_run() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("shop.sql");
    let connector = FixedConnector(|_: &str| -> Result<Box<dyn Catalog>, ConnectError> {
        Ok(Box::new(BrokenViews(SnapshotCatalog::new(shop()))))
    });

    let err = Exporter::new()
        .with_connector(connector)
        .run(snapshot_job(Path::new("unused.json"), "Shop", &output))
        .unwrap_err();

    assert!(matches!(
        err,
        ExportError::Catalog {
            kind: ObjectKind::View,
            ..
        }
    ));
    let content = fs::read_to_string(&output).unwrap();
    assert!(content.contains("Object:  StoredProcedure [dbo].[usp_Alpha]"));
}

#[test]
fn test_encrypted_view_is_render_error() {
    let dir = TempDir::new().unwrap();
    let mut schema = shop();
    schema.views[0].definition = None;
    let snapshot = write_snapshot(&dir, &schema);
    let output = dir.path().join("shop.sql");

    let err = Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap_err();
    assert!(matches!(
        err,
        ExportError::Render {
            kind: ObjectKind::View,
            ..
        }
    ));
}

#[test]
fn test_progress_events() {
    let dir = TempDir::new().unwrap();
    let mut schema = shop();
    schema.views.clear();
    let snapshot = write_snapshot(&dir, &schema);
    let output = dir.path().join("shop.sql");

    let mut events = Vec::new();
    Exporter::new()
        .with_progress(|e| events.push(e.clone()))
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();

    assert_eq!(
        events.first(),
        Some(&ExportEvent::Connected {
            database: "Shop".to_string()
        })
    );
    assert!(events.contains(&ExportEvent::PhaseStarted {
        kind: ObjectKind::Table,
        total: 4
    }));
    let exported_tables: Vec<&QualifiedName> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::ObjectExported {
                kind: ObjectKind::Table,
                name,
                ..
            } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(exported_tables.len(), 4);
    assert_eq!(exported_tables[0], &QualifiedName::dbo("Customers"));
    assert_eq!(
        events.last(),
        Some(&ExportEvent::PhaseFinished {
            kind: ObjectKind::View,
            outcome: PhaseOutcome::Empty
        })
    );
}

#[test]
fn test_report_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(&dir, &shop());
    let output = dir.path().join("shop.sql");

    let report = Exporter::new()
        .run(snapshot_job(&snapshot, "Shop", &output))
        .unwrap();
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();

    assert_eq!(json["database"], "Shop");
    assert_eq!(json["tables"]["status"], "exported");
    assert_eq!(json["tables"]["count"], 4);
    assert_eq!(json["sha256"].as_str().unwrap().len(), 64);
}
