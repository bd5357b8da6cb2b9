//! Export job configuration.
//!
//! Settings come from command-line flags and an optional YAML job file; flags win.
//! [`JobSettings::into_job`] validates the merged settings into an immutable
//! [`ExportJob`].

use crate::error::ConfigError;
use crate::script::ScriptOptions;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default SQL Server TCP port
pub const DEFAULT_PORT: u16 = 1433;

/// Server endpoint given as `host[,port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for ServerAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (host, port) = match trimmed.split_once(',') {
            Some((host, port)) => {
                let port = port.trim();
                let parsed = port.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                    address: s.to_string(),
                    port: port.to_string(),
                })?;
                if parsed == 0 {
                    return Err(ConfigError::InvalidPort {
                        address: s.to_string(),
                        port: port.to_string(),
                    });
                }
                (host.trim(), parsed)
            }
            None => (trimmed, DEFAULT_PORT),
        };

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidAddress(s.to_string()));
        }

        Ok(ServerAddress {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.host, self.port)
    }
}

/// SQL Server login
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the catalog comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Live server
    Server {
        address: ServerAddress,
        credentials: Credentials,
        trust_server_certificate: bool,
    },
    /// Snapshot file captured earlier (JSON or YAML)
    Snapshot { path: PathBuf },
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Server { address, .. } => write!(f, "server {}", address),
            ConnectionTarget::Snapshot { path } => write!(f, "snapshot {}", path.display()),
        }
    }
}

/// Validated export job. Immutable once built.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub connection: ConnectionTarget,
    pub database: String,
    pub output_path: PathBuf,
    pub script_options: ScriptOptions,
    /// Accepted for compatibility. Rendered objects never carry their own
    /// database-context directive; the artifact header selects the database once.
    pub use_db_context: bool,
}

impl ExportJob {
    pub fn new(
        connection: ConnectionTarget,
        database: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connection,
            database: database.into(),
            output_path: output_path.into(),
            script_options: ScriptOptions::for_export(),
            use_db_context: false,
        }
    }
}

/// Raw, possibly incomplete settings (job file and/or flags)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobSettings {
    pub output: Option<PathBuf>,
    pub server: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub use_db_context: Option<bool>,
    pub trust_server_certificate: Option<bool>,
}

impl JobSettings {
    /// Load settings from a YAML job file
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml_ng::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content)
    }

    /// Overlay `overrides` on top of `self`; values present in `overrides` win
    pub fn merge(self, overrides: JobSettings) -> Self {
        Self {
            output: overrides.output.or(self.output),
            server: overrides.server.or(self.server),
            login: overrides.login.or(self.login),
            password: overrides.password.or(self.password),
            database: overrides.database.or(self.database),
            snapshot: overrides.snapshot.or(self.snapshot),
            use_db_context: overrides.use_db_context.or(self.use_db_context),
            trust_server_certificate: overrides
                .trust_server_certificate
                .or(self.trust_server_certificate),
        }
    }

    /// Resolve the catalog source only (no output path needed)
    pub fn connection(&self) -> Result<(ConnectionTarget, String), ConfigError> {
        let database = required(&self.database, "dbName")?;

        let connection = match &self.snapshot {
            Some(path) => ConnectionTarget::Snapshot { path: path.clone() },
            None => {
                let server = required(&self.server, "connection")?;
                let login = required(&self.login, "id")?;
                let password = self
                    .password
                    .clone()
                    .ok_or(ConfigError::MissingOption("password"))?;
                ConnectionTarget::Server {
                    address: server.parse()?,
                    credentials: Credentials::new(login, password),
                    trust_server_certificate: self.trust_server_certificate.unwrap_or(false),
                }
            }
        };

        Ok((connection, database))
    }

    /// Validate into an [`ExportJob`]
    pub fn into_job(self) -> Result<ExportJob, ConfigError> {
        let output = self
            .output
            .clone()
            .ok_or(ConfigError::MissingOption("outputFilePath"))?;
        if output.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue("outputFilePath"));
        }

        let (connection, database) = self.connection()?;

        let mut job = ExportJob::new(connection, database, output);
        job.use_db_context = self.use_db_context.unwrap_or(false);
        Ok(job)
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        None => Err(ConfigError::MissingOption(name)),
        Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(name)),
        Some(v) => Ok(v.trim().to_string()),
    }
}
