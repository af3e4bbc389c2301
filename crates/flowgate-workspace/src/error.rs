use std::path::PathBuf;

use flowgate_core::{EventMatrixError, GateError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkspaceError>;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported workspace schema version {found} (expected {expected})")]
    UnsupportedSchema { found: u16, expected: u16 },

    #[error("sample `{id}` is not in the workspace")]
    UnknownSample { id: String },

    #[error("group `{id}` is not in the workspace")]
    UnknownGroup { id: String },

    #[error("no sample in the workspace matches event file `{file}`")]
    NoMatch { file: String },

    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("event table row {row}, column {column}: {message}")]
    EventTable {
        row: usize,
        column: usize,
        message: String,
    },

    #[error("event table: {0}")]
    EventMatrix(#[from] EventMatrixError),

    #[error(transparent)]
    Gate(#[from] GateError),
}

impl WorkspaceError {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn table(row: usize, column: usize, message: impl Into<String>) -> Self {
        Self::EventTable {
            row,
            column,
            message: message.into(),
        }
    }

    /// Whether the error comes from user-supplied settings rather than data.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Toml(_) | Self::InvalidConfig(_))
    }
}
