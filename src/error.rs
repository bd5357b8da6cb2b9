//! Error taxonomy for export runs.
//!
//! Collaborators (catalogs, renderers) report failures as [`anyhow::Error`]; the
//! exporter classifies them by phase so callers can tell a bad login from a
//! broken object script.

use crate::schema::{ObjectKind, QualifiedName};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid or incomplete job configuration, detected before connecting
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} option was missing")]
    MissingOption(&'static str),

    #[error("{0} must not be empty")]
    EmptyValue(&'static str),

    #[error("invalid server address '{0}': expected host[,port]")]
    InvalidAddress(String),

    #[error("invalid port '{port}' in server address '{address}'")]
    InvalidPort { address: String, port: String },

    #[error("failed to read job file {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse job file {}", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

/// Failure opening a catalog session
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("database [{0}] does not exist")]
    UnknownDatabase(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Fatal error of an export run.
///
/// Any of these aborts the run; bytes already appended to the artifact stay on
/// disk but the artifact is incomplete.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write output file {}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {target}")]
    Connectivity {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("database [{name}] does not exist")]
    UnknownDatabase { name: String },

    #[error("failed to enumerate {kind}s")]
    Catalog {
        kind: ObjectKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to script {kind} {name}")]
    Render {
        kind: ObjectKind,
        name: QualifiedName,
        #[source]
        source: anyhow::Error,
    },
}

impl ExportError {
    /// Whether the failure is a configuration problem rather than a runtime one
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExportError::UnknownDatabase { .. })
    }
}
