//! CLI for generating schema snapshots.
//!
//! Usage:
//!   gen-snapshot --scale medium --seed 42 --database Shop > shop.json
//!   gen-snapshot --tables 200 --back-references 5 -o cyclic.json

use clap::Parser;
use std::fs;
use test_schema_gen::{Generator, Scale};

#[derive(Parser, Debug)]
#[command(name = "gen-snapshot")]
#[command(about = "Generate schema snapshots for mssql-schema-export", long_about = None)]
struct Args {
    /// Scale preset: small, medium, large
    #[arg(short, long, default_value = "small")]
    scale: String,

    /// Random seed for reproducibility
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Database name recorded in the snapshot
    #[arg(short, long, default_value = "Generated")]
    database: String,

    /// Override the preset's table count
    #[arg(long)]
    tables: Option<usize>,

    /// Foreign keys pointing at later tables (may introduce cycles)
    #[arg(long, default_value = "0")]
    back_references: usize,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let scale: Scale = args.scale.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let mut config = scale.config().with_back_references(args.back_references);
    if let Some(tables) = args.tables {
        config.tables = tables;
    }

    let schema = Generator::new(args.seed, config).generate(&args.database);
    let json = schema.to_json()?;

    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            eprintln!(
                "Generated {} tables, {} stored procedures, {} views to {}",
                schema.tables.len(),
                schema.stored_procedures.len(),
                schema.views.len(),
                path
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
