//! T-SQL text generation.
//!
//! Every function here is pure: the same definition and options always give the
//! same batches. Batches carry no `GO` terminator; the writer adds it. Module
//! definitions are passed through untouched as [`Batch::Verbatim`].

use super::ScriptOptions;
use crate::schema::{
    quote_ident, ColumnDefinition, ForeignKeyDefinition, IndexDefinition, IndexKind,
    ModuleDefinition, ObjectKind, QualifiedName, ReferentialAction, TableDefinition,
};
use crate::writer::Batch;
use anyhow::{bail, Result};

/// `Object:` comment placed before an object's first batch
pub fn object_header(kind: ObjectKind, name: &QualifiedName) -> String {
    format!("/****** Object:  {} {} ******/", kind.script_label(), name)
}

pub fn use_database(database: &str) -> String {
    format!("USE {}", quote_ident(database))
}

/// Render a column's data type, e.g. `[nvarchar](50)` or `[decimal](10, 2)`
pub fn format_data_type(column: &ColumnDefinition) -> String {
    let base = quote_ident(&column.type_name);
    let length = |bytes: i16| {
        if bytes < 0 {
            "max".to_string()
        } else {
            bytes.to_string()
        }
    };

    match column.type_name.to_ascii_lowercase().as_str() {
        "varchar" | "char" | "varbinary" | "binary" => {
            format!("{}({})", base, length(column.max_length))
        }
        // max_length is in bytes; UTF-16 types store two per character
        "nvarchar" | "nchar" => {
            let chars = if column.max_length < 0 {
                column.max_length
            } else {
                column.max_length / 2
            };
            format!("{}({})", base, length(chars))
        }
        "decimal" | "numeric" => format!("{}({}, {})", base, column.precision, column.scale),
        "datetime2" | "time" | "datetimeoffset" => format!("{}({})", base, column.scale),
        "float" if column.precision != 0 && column.precision != 53 => {
            format!("{}({})", base, column.precision)
        }
        _ => base,
    }
}

fn is_character_type(type_name: &str) -> bool {
    matches!(
        type_name.to_ascii_lowercase().as_str(),
        "varchar" | "char" | "nvarchar" | "nchar" | "text" | "ntext"
    )
}

fn column_line(column: &ColumnDefinition, options: &ScriptOptions) -> String {
    let mut line = format!("\t{}", quote_ident(&column.name));

    if let Some(computed) = &column.computed {
        line.push_str(" AS ");
        line.push_str(&computed.definition);
        if computed.is_persisted {
            line.push_str(" PERSISTED");
            if !column.is_nullable {
                line.push_str(" NOT NULL");
            }
        }
        return line;
    }

    line.push(' ');
    line.push_str(&format_data_type(column));

    if !options.no_collation && is_character_type(&column.type_name) {
        if let Some(collation) = &column.collation {
            line.push_str(" COLLATE ");
            line.push_str(collation);
        }
    }

    if let Some(identity) = column.identity {
        line.push_str(&format!(" IDENTITY({},{})", identity.seed, identity.increment));
    }

    line.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    line
}

fn key_columns(index: &IndexDefinition) -> String {
    index
        .columns
        .iter()
        .map(|c| {
            format!(
                "\t{} {}",
                quote_ident(&c.name),
                if c.descending { "DESC" } else { "ASC" }
            )
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

fn clustering(index: &IndexDefinition) -> &'static str {
    if index.clustered {
        "CLUSTERED"
    } else {
        "NONCLUSTERED"
    }
}

fn key_constraint(index: &IndexDefinition) -> String {
    let kind = match index.kind {
        IndexKind::PrimaryKey => "PRIMARY KEY",
        _ => "UNIQUE",
    };
    format!(
        " CONSTRAINT {} {} {}\n(\n{}\n)",
        quote_ident(&index.name),
        kind,
        clustering(index),
        key_columns(index)
    )
}

fn create_index(table: &QualifiedName, index: &IndexDefinition) -> String {
    let mut sql = format!(
        "CREATE {}{} INDEX {} ON {}\n(\n{}\n)",
        if index.is_unique { "UNIQUE " } else { "" },
        clustering(index),
        quote_ident(&index.name),
        table,
        key_columns(index)
    );
    if !index.included_columns.is_empty() {
        let included: Vec<String> = index.included_columns.iter().map(|c| quote_ident(c)).collect();
        sql.push_str(&format!("\nINCLUDE({})", included.join(",")));
    }
    if let Some(filter) = &index.filter {
        sql.push_str(&format!("\nWHERE {}", filter));
    }
    sql
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn foreign_key(table: &QualifiedName, fk: &ForeignKeyDefinition) -> [String; 2] {
    let mut add = format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} FOREIGN KEY({})\nREFERENCES {} ({})",
        table,
        if fk.is_not_trusted { "NOCHECK" } else { "CHECK" },
        quote_ident(&fk.name),
        column_list(&fk.columns),
        fk.referenced_table,
        column_list(&fk.referenced_columns)
    );
    if fk.on_update != ReferentialAction::NoAction {
        add.push_str(&format!("\nON UPDATE {}", fk.on_update.to_sql()));
    }
    if fk.on_delete != ReferentialAction::NoAction {
        add.push_str(&format!("\nON DELETE {}", fk.on_delete.to_sql()));
    }

    let check = format!(
        "ALTER TABLE {} {} CONSTRAINT {}",
        table,
        if fk.is_disabled { "NOCHECK" } else { "CHECK" },
        quote_ident(&fk.name)
    );
    [add, check]
}

fn with_header(
    options: &ScriptOptions,
    kind: ObjectKind,
    name: &QualifiedName,
    first_batch: String,
) -> String {
    if options.include_headers {
        format!("{}\n{}", object_header(kind, name), first_batch)
    } else {
        first_batch
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Batches recreating a table, its keys, indexes, defaults and foreign keys
pub fn script_table(table: &TableDefinition, options: &ScriptOptions) -> Vec<String> {
    let mut batches = vec![
        with_header(
            options,
            ObjectKind::Table,
            &table.name,
            "SET ANSI_NULLS ON".to_string(),
        ),
        "SET QUOTED_IDENTIFIER ON".to_string(),
    ];

    let mut items: Vec<String> = table
        .columns
        .iter()
        .map(|c| column_line(c, options))
        .collect();
    if options.dri_indexes {
        items.extend(
            table
                .indexes
                .iter()
                .filter(|i| i.kind.is_constraint())
                .map(key_constraint),
        );
    }
    batches.push(format!(
        "CREATE TABLE {}(\n{}\n)",
        table.name,
        items.join(",\n")
    ));

    if options.indexes {
        batches.extend(
            table
                .indexes
                .iter()
                .filter(|i| i.kind == IndexKind::Index)
                .map(|i| create_index(&table.name, i)),
        );
    }

    if options.dri_defaults {
        for column in &table.columns {
            if let Some(default) = &column.default {
                batches.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {}",
                    table.name,
                    quote_ident(&default.name),
                    default.definition,
                    quote_ident(&column.name)
                ));
            }
        }
    }

    if options.dri_foreign_keys {
        for fk in &table.foreign_keys {
            batches.extend(foreign_key(&table.name, fk));
        }
    }

    batches
}

/// Batches recreating a stored procedure or view from its module text
pub fn script_module(
    kind: ObjectKind,
    module: &ModuleDefinition,
    options: &ScriptOptions,
) -> Result<Vec<Batch>> {
    let definition = match module.definition.as_deref() {
        Some(text) if !text.trim().is_empty() => text,
        Some(_) => bail!("{} {} has an empty definition", kind, module.name),
        None => bail!(
            "definition of {} {} is not available (the module may be encrypted)",
            kind,
            module.name
        ),
    };

    Ok(vec![
        Batch::Generated(with_header(
            options,
            kind,
            &module.name,
            format!("SET ANSI_NULLS {}", on_off(module.uses_ansi_nulls)),
        )),
        Batch::Generated(format!(
            "SET QUOTED_IDENTIFIER {}",
            on_off(module.uses_quoted_identifier)
        )),
        Batch::verbatim(definition),
    ])
}
