//! Unit tests for T-SQL rendering (script module).

use mssql_schema_export::catalog::{SchemaSnapshot, SnapshotCatalog};
use mssql_schema_export::schema::{
    ColumnDefinition, ComputedSpec, DefaultConstraint, ForeignKeyDefinition, IdentitySpec,
    IndexColumn, IndexDefinition, IndexKind, ModuleDefinition, ObjectKind, QualifiedName,
    ReferentialAction, SchemaObject, TableDefinition,
};
use mssql_schema_export::script::tsql::{format_data_type, object_header, script_module, script_table};
use mssql_schema_export::script::{ScriptOptions, TsqlScripter};
use mssql_schema_export::writer::Batch;

fn column(name: &str, type_name: &str, max_length: i16) -> ColumnDefinition {
    let mut c = ColumnDefinition::new(name, type_name);
    c.max_length = max_length;
    c
}

fn orders_table() -> TableDefinition {
    let mut table = TableDefinition::new(QualifiedName::dbo("Orders"));

    let mut id = column("OrderId", "int", 4);
    id.is_nullable = false;
    id.identity = Some(IdentitySpec { seed: 1, increment: 1 });

    let mut customer = column("CustomerId", "int", 4);
    customer.is_nullable = false;

    let mut note = column("Note", "nvarchar", 200);
    note.collation = Some("SQL_Latin1_General_CP1_CI_AS".to_string());

    let mut created = column("CreatedAt", "datetime2", 8);
    created.scale = 7;
    created.is_nullable = false;
    created.default = Some(DefaultConstraint {
        name: "DF_Orders_CreatedAt".to_string(),
        definition: "(sysutcdatetime())".to_string(),
    });

    table.columns = vec![id, customer, note, created];
    table.indexes = vec![
        IndexDefinition {
            name: "PK_Orders".to_string(),
            kind: IndexKind::PrimaryKey,
            clustered: true,
            is_unique: true,
            columns: vec![IndexColumn {
                name: "OrderId".to_string(),
                descending: false,
            }],
            included_columns: vec![],
            filter: None,
        },
        IndexDefinition {
            name: "IX_Orders_CustomerId".to_string(),
            kind: IndexKind::Index,
            clustered: false,
            is_unique: false,
            columns: vec![IndexColumn {
                name: "CustomerId".to_string(),
                descending: false,
            }],
            included_columns: vec!["Note".to_string()],
            filter: Some("([Note] IS NOT NULL)".to_string()),
        },
    ];
    table.foreign_keys = vec![ForeignKeyDefinition {
        name: "FK_Orders_Customers".to_string(),
        columns: vec!["CustomerId".to_string()],
        referenced_table: QualifiedName::dbo("Customers"),
        referenced_columns: vec!["CustomerId".to_string()],
        on_delete: ReferentialAction::Cascade,
        on_update: ReferentialAction::NoAction,
        is_disabled: false,
        is_not_trusted: false,
    }];
    table
}

#[test]
fn test_object_header() {
    assert_eq!(
        object_header(ObjectKind::Table, &QualifiedName::dbo("Orders")),
        "/****** Object:  Table [dbo].[Orders] ******/"
    );
}

#[test]
fn test_format_data_types() {
    assert_eq!(format_data_type(&column("a", "int", 4)), "[int]");
    assert_eq!(format_data_type(&column("a", "varchar", 50)), "[varchar](50)");
    assert_eq!(format_data_type(&column("a", "nvarchar", 100)), "[nvarchar](50)");
    assert_eq!(format_data_type(&column("a", "nvarchar", -1)), "[nvarchar](max)");
    assert_eq!(format_data_type(&column("a", "varbinary", -1)), "[varbinary](max)");

    let mut dec = column("a", "decimal", 9);
    dec.precision = 10;
    dec.scale = 2;
    assert_eq!(format_data_type(&dec), "[decimal](10, 2)");

    let mut float = column("a", "float", 8);
    float.precision = 53;
    assert_eq!(format_data_type(&float), "[float]");
    float.precision = 24;
    assert_eq!(format_data_type(&float), "[float](24)");
}

#[test]
fn test_table_script_batches() {
    let batches = script_table(&orders_table(), &ScriptOptions::for_export());

    assert_eq!(
        batches[0],
        "/****** Object:  Table [dbo].[Orders] ******/\nSET ANSI_NULLS ON"
    );
    assert_eq!(batches[1], "SET QUOTED_IDENTIFIER ON");
    assert_eq!(
        batches[2],
        "CREATE TABLE [dbo].[Orders](\n\
         \t[OrderId] [int] IDENTITY(1,1) NOT NULL,\n\
         \t[CustomerId] [int] NOT NULL,\n\
         \t[Note] [nvarchar](100) NULL,\n\
         \t[CreatedAt] [datetime2](7) NOT NULL,\n \
         CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED\n(\n\t[OrderId] ASC\n)\n)"
    );
    assert_eq!(
        batches[3],
        "CREATE NONCLUSTERED INDEX [IX_Orders_CustomerId] ON [dbo].[Orders]\n(\n\t[CustomerId] ASC\n)\nINCLUDE([Note])\nWHERE ([Note] IS NOT NULL)"
    );
    assert_eq!(
        batches[4],
        "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [DF_Orders_CreatedAt] DEFAULT (sysutcdatetime()) FOR [CreatedAt]"
    );
    assert_eq!(
        batches[5],
        "ALTER TABLE [dbo].[Orders] WITH CHECK ADD CONSTRAINT [FK_Orders_Customers] FOREIGN KEY([CustomerId])\nREFERENCES [dbo].[Customers] ([CustomerId])\nON DELETE CASCADE"
    );
    assert_eq!(
        batches[6],
        "ALTER TABLE [dbo].[Orders] CHECK CONSTRAINT [FK_Orders_Customers]"
    );
    assert_eq!(batches.len(), 7);
}

#[test]
fn test_collation_included_when_not_suppressed() {
    let mut options = ScriptOptions::for_export();
    options.no_collation = false;
    let batches = script_table(&orders_table(), &options);
    assert!(batches[2].contains("[Note] [nvarchar](100) COLLATE SQL_Latin1_General_CP1_CI_AS NULL"));

    let batches = script_table(&orders_table(), &ScriptOptions::for_export());
    assert!(!batches[2].contains("COLLATE"));
}

#[test]
fn test_options_disable_constraints_and_indexes() {
    let mut options = ScriptOptions::for_export();
    options.dri_indexes = false;
    options.indexes = false;
    options.dri_defaults = false;
    options.dri_foreign_keys = false;
    options.include_headers = false;

    let batches = script_table(&orders_table(), &options);
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0], "SET ANSI_NULLS ON");
    assert!(!batches[2].contains("PRIMARY KEY"));
}

#[test]
fn test_untrusted_disabled_foreign_key() {
    let mut table = orders_table();
    table.foreign_keys[0].is_not_trusted = true;
    table.foreign_keys[0].is_disabled = true;

    let batches = script_table(&table, &ScriptOptions::for_export());
    assert!(batches[5].starts_with("ALTER TABLE [dbo].[Orders] WITH NOCHECK ADD CONSTRAINT"));
    assert_eq!(
        batches[6],
        "ALTER TABLE [dbo].[Orders] NOCHECK CONSTRAINT [FK_Orders_Customers]"
    );
}

#[test]
fn test_computed_column() {
    let mut table = TableDefinition::new(QualifiedName::dbo("Lines"));
    let mut total = column("Total", "decimal", 9);
    total.computed = Some(ComputedSpec {
        definition: "([Qty]*[Price])".to_string(),
        is_persisted: true,
    });
    total.is_nullable = false;
    table.columns = vec![total];

    let batches = script_table(&table, &ScriptOptions::for_export());
    assert!(batches[2].contains("\t[Total] AS ([Qty]*[Price]) PERSISTED NOT NULL"));
}

#[test]
fn test_module_script() {
    let mut module = ModuleDefinition::new(
        QualifiedName::dbo("usp_GetOrders"),
        "CREATE PROCEDURE [dbo].[usp_GetOrders]\nAS\nSELECT 1\n\n",
    );
    module.uses_quoted_identifier = false;

    let batches =
        script_module(ObjectKind::StoredProcedure, &module, &ScriptOptions::for_export()).unwrap();
    assert_eq!(
        batches,
        vec![
            Batch::generated(
                "/****** Object:  StoredProcedure [dbo].[usp_GetOrders] ******/\nSET ANSI_NULLS ON"
            ),
            Batch::generated("SET QUOTED_IDENTIFIER OFF"),
            Batch::verbatim("CREATE PROCEDURE [dbo].[usp_GetOrders]\nAS\nSELECT 1\n\n"),
        ]
    );
}

#[test]
fn test_module_text_is_not_rewritten() {
    let text = "CREATE PROCEDURE [dbo].[p] AS\r\n  SELECT 'a\nb' AS x  ";
    let module = ModuleDefinition::new(QualifiedName::dbo("p"), text);

    let batches =
        script_module(ObjectKind::StoredProcedure, &module, &ScriptOptions::for_export()).unwrap();
    assert_eq!(batches[2], Batch::Verbatim(text.to_string()));
}

#[test]
fn test_encrypted_module_fails() {
    let mut module = ModuleDefinition::new(QualifiedName::dbo("v"), "x");
    module.definition = None;
    let err = script_module(ObjectKind::View, &module, &ScriptOptions::for_export()).unwrap_err();
    assert!(err.to_string().contains("encrypted"));

    module.definition = Some("   \n".to_string());
    assert!(script_module(ObjectKind::View, &module, &ScriptOptions::for_export()).is_err());
}

#[test]
fn test_export_options_match_fixed_set() {
    let options = ScriptOptions::for_export();
    assert!(options.no_collation);
    assert!(options.dri_defaults && options.dri_foreign_keys && options.dri_indexes);
    assert!(options.indexes && options.include_headers);
    assert!(!options.include_database_context);
    assert!(!options.with_dependencies);
    assert_eq!(ScriptOptions::default(), options);
}

#[test]
fn test_scripter_database_context_and_dependency_expansion() {
    let mut snapshot = SchemaSnapshot::new("Shop");
    snapshot.views.push(ModuleDefinition::new(
        QualifiedName::dbo("vw_All"),
        "CREATE VIEW [dbo].[vw_All] AS SELECT 1 AS x",
    ));
    let mut catalog = SnapshotCatalog::new(snapshot);
    let view = SchemaObject::view(QualifiedName::dbo("vw_All"));
    let scripter = TsqlScripter::new();

    let mut options = ScriptOptions::for_export();
    let batches = scripter.script(&mut catalog, &view, &options).unwrap();
    assert!(!batches.iter().any(|b| b.text().starts_with("USE ")));

    options.include_database_context = true;
    let batches = scripter.script(&mut catalog, &view, &options).unwrap();
    assert_eq!(batches[0], Batch::generated("USE [Shop]"));

    options.with_dependencies = true;
    assert!(scripter.script(&mut catalog, &view, &options).is_err());
}
