//! Console feedback for export runs.
//!
//! Turns exporter events into an indicatif bar per phase, or plain per-object
//! lines in verbose mode. Only ever writes to stderr.

use indicatif::{ProgressBar, ProgressStyle};
use mssql_schema_export::export::{ExportEvent, PhaseOutcome};
use mssql_schema_export::schema::ObjectKind;
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {prefix} {msg}";

pub struct ExportConsole {
    show_bars: bool,
    verbose: bool,
    bar: Option<ProgressBar>,
}

impl ExportConsole {
    pub fn new(show_bars: bool, verbose: bool) -> Self {
        Self {
            show_bars,
            verbose,
            bar: None,
        }
    }

    pub fn handle(&mut self, event: &ExportEvent) {
        match event {
            ExportEvent::Connected { database } => {
                if self.verbose {
                    eprintln!("Connected, database [{}] selected", database);
                }
            }
            ExportEvent::PhaseStarted { kind, total } => {
                if self.show_bars {
                    self.bar = Some(phase_bar(*kind, *total));
                } else if self.verbose {
                    eprintln!("\n{} ({}):", phase_title(*kind), total);
                }
            }
            ExportEvent::DependencyBroken { edge } => {
                let line = format!("Warning: dependency cycle broken at {}", edge);
                match &self.bar {
                    Some(bar) => bar.println(line),
                    None => eprintln!("{}", line),
                }
            }
            ExportEvent::ObjectExported { name, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(name.to_string());
                    bar.inc(1);
                } else if self.verbose {
                    eprintln!("  {}", name);
                }
            }
            ExportEvent::PhaseFinished { kind, outcome } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_with_message("done");
                } else if *outcome == PhaseOutcome::Empty && (self.verbose || self.show_bars) {
                    eprintln!("No {} found.", phase_title(*kind).to_lowercase());
                }
            }
        }
    }

    /// Clear any bar left behind by a failed run
    pub fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

pub fn phase_title(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Table => "Tables",
        ObjectKind::StoredProcedure => "Stored procedures",
        ObjectKind::View => "Views",
    }
}

fn phase_bar(kind: ObjectKind, total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    bar.set_style(style);
    bar.set_prefix(phase_title(kind));
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
