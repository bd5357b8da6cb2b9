//! Script renderer: turns one schema object into T-SQL batches appended to the
//! output artifact.

pub mod tsql;

use crate::catalog::Catalog;
use crate::schema::{ObjectKind, SchemaObject};
use crate::writer::{Batch, ScriptWriter};
use anyhow::{bail, Context, Result};
use serde::Serialize;

/// Text encoding of the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// UTF-8 without a byte-order mark
    #[default]
    Utf8,
}

/// Fixed scripting options, passed explicitly to every render call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScriptOptions {
    /// Leave out `COLLATE` clauses
    pub no_collation: bool,
    /// Script default constraints
    pub dri_defaults: bool,
    /// Script foreign keys
    pub dri_foreign_keys: bool,
    /// Script primary key and unique constraints
    pub dri_indexes: bool,
    /// Script non-constraint indexes
    pub indexes: bool,
    /// Prefix each object with an `Object:` comment
    pub include_headers: bool,
    /// Prefix each object with `USE [db]`
    pub include_database_context: bool,
    pub encoding: TextEncoding,
    /// Pull in the object's own dependencies (unsupported)
    pub with_dependencies: bool,
}

impl ScriptOptions {
    /// Options used by the exporter.
    ///
    /// The database-context directive is off because the artifact is written in
    /// append mode; the header selects the database exactly once instead.
    pub const fn for_export() -> Self {
        Self {
            no_collation: true,
            dri_defaults: true,
            dri_foreign_keys: true,
            dri_indexes: true,
            indexes: true,
            include_headers: true,
            include_database_context: false,
            encoding: TextEncoding::Utf8,
            with_dependencies: false,
        }
    }
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self::for_export()
    }
}

/// Renders one object and appends it to the artifact
pub trait ScriptRenderer {
    fn render(
        &mut self,
        catalog: &mut dyn Catalog,
        object: &SchemaObject,
        options: &ScriptOptions,
        artifact: &mut ScriptWriter,
    ) -> Result<()>;
}

/// T-SQL renderer backed by catalog definitions
#[derive(Debug, Default)]
pub struct TsqlScripter;

impl TsqlScripter {
    pub fn new() -> Self {
        Self
    }

    /// Render `object` into batches without writing them
    pub fn script(
        &self,
        catalog: &mut dyn Catalog,
        object: &SchemaObject,
        options: &ScriptOptions,
    ) -> Result<Vec<Batch>> {
        if options.with_dependencies {
            bail!("dependency expansion is not supported; objects are sequenced by the exporter");
        }

        let mut batches = Vec::new();
        if options.include_database_context {
            batches.push(Batch::Generated(tsql::use_database(catalog.database_name())));
        }

        match object.kind {
            ObjectKind::Table => {
                let definition = catalog
                    .table_definition(&object.name)
                    .with_context(|| format!("reading definition of table {}", object.name))?;
                batches.extend(
                    tsql::script_table(&definition, options)
                        .into_iter()
                        .map(Batch::Generated),
                );
            }
            ObjectKind::StoredProcedure | ObjectKind::View => {
                let module = catalog
                    .module_definition(object)
                    .with_context(|| format!("reading definition of {} {}", object.kind, object.name))?;
                batches.extend(tsql::script_module(object.kind, &module, options)?);
            }
        }

        Ok(batches)
    }
}

impl ScriptRenderer for TsqlScripter {
    fn render(
        &mut self,
        catalog: &mut dyn Catalog,
        object: &SchemaObject,
        options: &ScriptOptions,
        artifact: &mut ScriptWriter,
    ) -> Result<()> {
        for batch in self.script(catalog, object, options)? {
            artifact.write(&batch)?;
        }
        Ok(())
    }
}
