//! Catalog queries against the `sys` views.

use super::SqlClient;
use crate::schema::{
    ColumnDefinition, ComputedSpec, DefaultConstraint, DependencyEdge, ForeignKeyDefinition,
    IdentitySpec, IndexColumn, IndexDefinition, IndexKind, ModuleDefinition, ObjectKind,
    QualifiedName, ReferentialAction, SchemaObject, TableDefinition,
};
use anyhow::{anyhow, bail, Result};
use tiberius::{FromSql, Row};

/// Objects SSMS tooling installs into user databases (e.g. `sysdiagrams`,
/// `sp_upgraddiagrams`) carry this extended property and count as system objects.
const SYSTEM_OBJECT_FLAG: &str = "CAST(CASE WHEN o.is_ms_shipped = 1 OR EXISTS (
        SELECT 1 FROM sys.extended_properties ep
        WHERE ep.class = 1 AND ep.minor_id = 0 AND ep.major_id = o.object_id
            AND ep.name = N'microsoft_database_tools_support')
    THEN 1 ELSE 0 END AS bit)";

fn list_objects_query(kind: ObjectKind) -> String {
    let (source, filter) = match kind {
        ObjectKind::Table => ("sys.tables", ""),
        // CLR procedures have no T-SQL text to script
        ObjectKind::StoredProcedure => ("sys.procedures", "WHERE o.type = 'P'"),
        ObjectKind::View => ("sys.views", ""),
    };
    format!(
        "SELECT s.name AS schema_name, o.name AS object_name, {SYSTEM_OBJECT_FLAG} AS is_system
FROM {source} o
JOIN sys.schemas s ON o.schema_id = s.schema_id
{filter}
ORDER BY s.name, o.name;"
    )
}

static DATABASE_EXISTS_QUERY: &str = "SELECT DB_ID(@P1) AS database_id;";

static FOREIGN_KEY_EDGES_QUERY: &str = "
SELECT
    ps.name AS from_schema,
    pt.name AS from_table,
    rs.name AS to_schema,
    rt.name AS to_table
FROM sys.foreign_keys fk
JOIN sys.tables pt ON fk.parent_object_id = pt.object_id
JOIN sys.schemas ps ON pt.schema_id = ps.schema_id
JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
JOIN sys.schemas rs ON rt.schema_id = rs.schema_id
ORDER BY ps.name, pt.name, fk.name;";

static COLUMNS_QUERY: &str = "
SELECT
    c.name AS col_name,
    ty.name AS type_name,
    c.max_length AS max_length,
    c.precision AS precision,
    c.scale AS scale,
    c.is_nullable AS is_nullable,
    c.collation_name AS collation_name,
    CAST(ic.seed_value AS bigint) AS identity_seed,
    CAST(ic.increment_value AS bigint) AS identity_increment,
    cc.definition AS computed_definition,
    cc.is_persisted AS computed_persisted,
    dc.name AS default_name,
    dc.definition AS default_definition
FROM sys.columns c
JOIN sys.types ty ON c.user_type_id = ty.user_type_id
LEFT JOIN sys.identity_columns ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id
LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id
LEFT JOIN sys.default_constraints dc
    ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
WHERE c.object_id = OBJECT_ID(@P1)
ORDER BY c.column_id;";

// Rowstore clustered (1) and nonclustered (2) indexes only
static INDEXES_QUERY: &str = "
SELECT
    i.index_id AS index_id,
    i.name AS index_name,
    i.type AS index_type,
    i.is_unique AS is_unique,
    i.is_primary_key AS is_primary_key,
    i.is_unique_constraint AS is_unique_constraint,
    i.filter_definition AS filter_definition,
    c.name AS col_name,
    ic.is_descending_key AS is_descending_key,
    ic.is_included_column AS is_included_column
FROM sys.indexes i
JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
WHERE i.object_id = OBJECT_ID(@P1) AND i.type IN (1, 2) AND i.is_hypothetical = 0
ORDER BY i.index_id, ic.is_included_column, ic.key_ordinal, ic.index_column_id;";

static FOREIGN_KEYS_QUERY: &str = "
SELECT
    fk.object_id AS fk_id,
    fk.name AS fk_name,
    rs.name AS ref_schema,
    rt.name AS ref_table,
    fk.delete_referential_action_desc AS on_delete,
    fk.update_referential_action_desc AS on_update,
    fk.is_disabled AS is_disabled,
    fk.is_not_trusted AS is_not_trusted,
    pc.name AS col_name,
    rc.name AS ref_col_name
FROM sys.foreign_keys fk
JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
JOIN sys.columns rc
    ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
WHERE fk.parent_object_id = OBJECT_ID(@P1)
ORDER BY fk.name, fkc.constraint_column_id;";

static MODULE_QUERY: &str = "
SELECT
    m.definition AS definition,
    m.uses_ansi_nulls AS uses_ansi_nulls,
    m.uses_quoted_identifier AS uses_quoted_identifier
FROM sys.sql_modules m
WHERE m.object_id = OBJECT_ID(@P1);";

fn get_value<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T> {
    row.try_get::<T, _>(name)?
        .ok_or_else(|| anyhow!("column '{}' was unexpectedly NULL", name))
}

fn get_optional<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<Option<T>> {
    Ok(row.try_get::<T, _>(name)?)
}

fn get_string(row: &Row, name: &str) -> Result<String> {
    get_value::<&str>(row, name).map(str::to_string)
}

fn get_optional_string(row: &Row, name: &str) -> Result<Option<String>> {
    Ok(get_optional::<&str>(row, name)?.map(str::to_string))
}

async fn query_rows(client: &mut SqlClient, sql: &str, name: &QualifiedName) -> Result<Vec<Row>> {
    let param = name.to_string();
    tracing::debug!(object = %name, "querying catalog");
    let rows = client
        .query(sql, &[&param.as_str()])
        .await?
        .into_first_result()
        .await?;
    Ok(rows)
}

pub(super) async fn database_exists(client: &mut SqlClient, database: &str) -> Result<bool> {
    let rows = client
        .query(DATABASE_EXISTS_QUERY, &[&database])
        .await?
        .into_first_result()
        .await?;
    match rows.as_slice() {
        [row] => Ok(get_optional::<i32>(row, "database_id")?.is_some()),
        other => bail!("expected one row from DB_ID, found {}", other.len()),
    }
}

pub(super) async fn list_objects(
    client: &mut SqlClient,
    kind: ObjectKind,
) -> Result<Vec<SchemaObject>> {
    let rows = client
        .simple_query(list_objects_query(kind))
        .await?
        .into_first_result()
        .await?;

    let objects = rows
        .iter()
        .map(|row| {
            Ok(SchemaObject {
                kind,
                name: QualifiedName::new(
                    get_string(row, "schema_name")?,
                    get_string(row, "object_name")?,
                ),
                is_system_object: get_value::<bool>(row, "is_system")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(kind = %kind, count = objects.len(), "listed objects");
    Ok(objects)
}

pub(super) async fn foreign_key_edges(client: &mut SqlClient) -> Result<Vec<DependencyEdge>> {
    let rows = client
        .simple_query(FOREIGN_KEY_EDGES_QUERY)
        .await?
        .into_first_result()
        .await?;

    rows.iter()
        .map(|row| {
            Ok(DependencyEdge::new(
                QualifiedName::new(get_string(row, "from_schema")?, get_string(row, "from_table")?),
                QualifiedName::new(get_string(row, "to_schema")?, get_string(row, "to_table")?),
            ))
        })
        .collect()
}

pub(super) async fn table_definition(
    client: &mut SqlClient,
    name: &QualifiedName,
) -> Result<TableDefinition> {
    let mut table = TableDefinition::new(name.clone());

    let rows = query_rows(client, COLUMNS_QUERY, name).await?;
    if rows.is_empty() {
        bail!("table {} has no columns or does not exist", name);
    }
    table.columns = rows.iter().map(decode_column).collect::<Result<_>>()?;

    let rows = query_rows(client, INDEXES_QUERY, name).await?;
    table.indexes = decode_indexes(&rows)?;

    let rows = query_rows(client, FOREIGN_KEYS_QUERY, name).await?;
    table.foreign_keys = decode_foreign_keys(&rows)?;

    Ok(table)
}

fn decode_column(row: &Row) -> Result<ColumnDefinition> {
    let mut column = ColumnDefinition::new(get_string(row, "col_name")?, get_string(row, "type_name")?);
    column.max_length = get_value::<i16>(row, "max_length")?;
    column.precision = get_value::<u8>(row, "precision")?;
    column.scale = get_value::<u8>(row, "scale")?;
    column.is_nullable = get_optional::<bool>(row, "is_nullable")?.unwrap_or(true);
    column.collation = get_optional_string(row, "collation_name")?;

    if let (Some(seed), Some(increment)) = (
        get_optional::<i64>(row, "identity_seed")?,
        get_optional::<i64>(row, "identity_increment")?,
    ) {
        column.identity = Some(IdentitySpec { seed, increment });
    }

    if let Some(definition) = get_optional_string(row, "computed_definition")? {
        column.computed = Some(ComputedSpec {
            definition,
            is_persisted: get_optional::<bool>(row, "computed_persisted")?.unwrap_or(false),
        });
    }

    if let (Some(name), Some(definition)) = (
        get_optional_string(row, "default_name")?,
        get_optional_string(row, "default_definition")?,
    ) {
        column.default = Some(DefaultConstraint { name, definition });
    }

    Ok(column)
}

/// One row per index column, grouped by consecutive `index_id`
fn decode_indexes(rows: &[Row]) -> Result<Vec<IndexDefinition>> {
    let mut indexes: Vec<(i32, IndexDefinition)> = Vec::new();

    for row in rows {
        let index_id = get_value::<i32>(row, "index_id")?;
        if indexes.last().map(|(id, _)| *id) != Some(index_id) {
            let kind = if get_value::<bool>(row, "is_primary_key")? {
                IndexKind::PrimaryKey
            } else if get_value::<bool>(row, "is_unique_constraint")? {
                IndexKind::UniqueConstraint
            } else {
                IndexKind::Index
            };
            indexes.push((
                index_id,
                IndexDefinition {
                    name: get_string(row, "index_name")?,
                    kind,
                    clustered: get_value::<u8>(row, "index_type")? == 1,
                    is_unique: get_value::<bool>(row, "is_unique")?,
                    columns: Vec::new(),
                    included_columns: Vec::new(),
                    filter: get_optional_string(row, "filter_definition")?,
                },
            ));
        }

        let Some((_, index)) = indexes.last_mut() else {
            continue;
        };
        let column = get_string(row, "col_name")?;
        if get_value::<bool>(row, "is_included_column")? {
            index.included_columns.push(column);
        } else {
            index.columns.push(IndexColumn {
                name: column,
                descending: get_value::<bool>(row, "is_descending_key")?,
            });
        }
    }

    Ok(indexes.into_iter().map(|(_, index)| index).collect())
}

fn referential_action(row: &Row, name: &str) -> Result<ReferentialAction> {
    let desc = get_value::<&str>(row, name)?;
    ReferentialAction::from_catalog_desc(desc)
        .ok_or_else(|| anyhow!("unknown referential action '{}'", desc))
}

/// One row per foreign key column, grouped by consecutive `fk_id`
fn decode_foreign_keys(rows: &[Row]) -> Result<Vec<ForeignKeyDefinition>> {
    let mut keys: Vec<(i32, ForeignKeyDefinition)> = Vec::new();

    for row in rows {
        let fk_id = get_value::<i32>(row, "fk_id")?;
        if keys.last().map(|(id, _)| *id) != Some(fk_id) {
            keys.push((
                fk_id,
                ForeignKeyDefinition {
                    name: get_string(row, "fk_name")?,
                    columns: Vec::new(),
                    referenced_table: QualifiedName::new(
                        get_string(row, "ref_schema")?,
                        get_string(row, "ref_table")?,
                    ),
                    referenced_columns: Vec::new(),
                    on_delete: referential_action(row, "on_delete")?,
                    on_update: referential_action(row, "on_update")?,
                    is_disabled: get_value::<bool>(row, "is_disabled")?,
                    is_not_trusted: get_value::<bool>(row, "is_not_trusted")?,
                },
            ));
        }

        if let Some((_, fk)) = keys.last_mut() {
            fk.columns.push(get_string(row, "col_name")?);
            fk.referenced_columns.push(get_string(row, "ref_col_name")?);
        }
    }

    Ok(keys.into_iter().map(|(_, fk)| fk).collect())
}

pub(super) async fn module_definition(
    client: &mut SqlClient,
    name: &QualifiedName,
) -> Result<ModuleDefinition> {
    let rows = query_rows(client, MODULE_QUERY, name).await?;
    let [row] = rows.as_slice() else {
        bail!("module {} not found in sys.sql_modules", name);
    };

    Ok(ModuleDefinition {
        name: name.clone(),
        is_system_object: false,
        definition: get_optional_string(row, "definition")?,
        uses_ansi_nulls: get_optional::<bool>(row, "uses_ansi_nulls")?.unwrap_or(true),
        uses_quoted_identifier: get_optional::<bool>(row, "uses_quoted_identifier")?
            .unwrap_or(true),
    })
}
