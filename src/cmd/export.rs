//! Export command - write the schema script.

use super::SourceArgs;
use crate::progress::{phase_title, ExportConsole};
use anyhow::Result;
use mssql_schema_export::config::JobSettings;
use mssql_schema_export::export::{ExportReport, Exporter, PhaseOutcome};
use mssql_schema_export::schema::ObjectKind;
use std::path::PathBuf;

/// Export command options
pub struct ExportOptions {
    pub source: SourceArgs,
    pub output: Option<PathBuf>,
    pub use_db_context: bool,
    pub progress: bool,
    pub json: bool,
    pub verbose: bool,
}

pub fn run(options: ExportOptions) -> Result<()> {
    let settings = options
        .source
        .settings()
        .map_err(|e| super::usage_error("export", e))?;
    let settings = settings.merge(JobSettings {
        output: options.output,
        use_db_context: options.use_db_context.then_some(true),
        ..JobSettings::default()
    });
    let job = settings
        .into_job()
        .map_err(|e| super::usage_error("export", e))?;

    if !options.json {
        eprintln!(
            "Exporting schema of [{}] from {} to {}",
            job.database,
            job.connection,
            job.output_path.display()
        );
    }

    let mut console = ExportConsole::new(
        options.progress && !options.json,
        options.verbose && !options.json,
    );
    let result = Exporter::new()
        .with_progress(|event| console.handle(event))
        .run(job);
    console.finish();

    let report = result.inspect_err(|e| {
        if e.is_configuration() {
            super::print_usage("export");
        }
    })?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &ExportReport) {
    eprintln!();
    for (kind, outcome) in [
        (ObjectKind::Table, report.tables),
        (ObjectKind::StoredProcedure, report.stored_procedures),
        (ObjectKind::View, report.views),
    ] {
        match outcome {
            PhaseOutcome::Empty => eprintln!("{}: none", phase_title(kind)),
            PhaseOutcome::Exported { count } => eprintln!("{}: {}", phase_title(kind), count),
        }
    }

    if !report.broken_dependencies.is_empty() {
        eprintln!(
            "\nWarning: {} reference cycle(s) broken; these tables are created before a table they reference:",
            report.broken_dependencies.len()
        );
        for edge in &report.broken_dependencies {
            eprintln!("  - {}", edge);
        }
    }

    if !report.unmatched_tables.is_empty() {
        eprintln!("\nReferenced tables not listed by the catalog (skipped):");
        for name in &report.unmatched_tables {
            eprintln!("  - {}", name);
        }
    }

    eprintln!(
        "\nWrote {} bytes to {} in {} ms",
        report.bytes_written,
        report.output_path.display(),
        report.elapsed_ms
    );
    eprintln!("SHA-256: {}", report.sha256);
}
