mod export;
mod order;
mod snapshot;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use mssql_schema_export::config::JobSettings;
use mssql_schema_export::error::ConfigError;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mssql-schema-export")]
#[command(version)]
#[command(
    about = "Export a SQL Server database schema as one ordered T-SQL script",
    long_about = None
)]
pub struct Cli {
    /// Verbose output (object names as they are scripted, info-level logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the schema comes from: a live server or a snapshot file
#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Server address as host[,port] (port defaults to 1433)
    #[arg(short = 'c', long = "connection", value_name = "HOST[,PORT]")]
    pub connection: Option<String>,

    /// SQL Server login id
    #[arg(short = 'i', long = "id", value_name = "LOGIN")]
    pub login: Option<String>,

    /// SQL Server login password
    #[arg(short, long, env = "MSSQL_EXPORT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database name
    #[arg(short = 'd', long = "db-name", value_name = "NAME")]
    pub database: Option<String>,

    /// Read the schema from a snapshot file (.json, .yaml) instead of a server
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Accept the server's TLS certificate without validation
    #[arg(long)]
    pub trust_server_certificate: bool,

    /// YAML job file; command-line values override its settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl SourceArgs {
    fn overrides(&self) -> JobSettings {
        JobSettings {
            server: self.connection.clone(),
            login: self.login.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            snapshot: self.snapshot.clone(),
            trust_server_certificate: self.trust_server_certificate.then_some(true),
            ..JobSettings::default()
        }
    }

    /// Job file settings (if any) with flags layered on top
    pub fn settings(&self) -> Result<JobSettings, ConfigError> {
        let base = match &self.config {
            Some(path) => JobSettings::from_path(path)?,
            None => JobSettings::default(),
        };
        Ok(base.merge(self.overrides()))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export tables (in dependency order), stored procedures and views to one script
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Output script path; an existing file is replaced
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Request a database-context clause per object (the script header already
        /// selects the database, so rendered objects never repeat it)
        #[arg(short = 'u', long)]
        use_db_context: bool,

        /// Show progress during export
        #[arg(long)]
        progress: bool,

        /// Print the export report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print the table creation order without writing a script
    Order {
        #[command(flatten)]
        source: SourceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Capture a database schema into a snapshot file for offline exports
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Snapshot path; .yaml/.yml writes YAML, anything else JSON
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let verbose = cli.verbose;
    match cli.command {
        Commands::Export {
            source,
            output,
            use_db_context,
            progress,
            json,
        } => export::run(export::ExportOptions {
            source,
            output,
            use_db_context,
            progress,
            json,
            verbose,
        }),
        Commands::Order { source, json } => order::run(&source, json),
        Commands::Snapshot { source, output } => snapshot::run(&source, output),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "mssql-schema-export",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

/// Print the subcommand's usage to stderr and turn `err` into the command error
fn usage_error(subcommand: &str, err: ConfigError) -> anyhow::Error {
    print_usage(subcommand);
    anyhow::Error::new(err)
}

fn print_usage(subcommand: &str) {
    let mut cli = Cli::command();
    cli.build();
    if let Some(cmd) = cli.find_subcommand_mut(subcommand) {
        eprintln!("{}", cmd.render_usage());
        eprintln!("For more information, try '--help'.");
    }
}
