use flowgate_workspace::WorkspaceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code for bad input data or failed evaluation.
pub const EXIT_DATA: i32 = 1;
/// Exit code for bad arguments or configuration.
pub const EXIT_USAGE: i32 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("logging setup failed: {message}")]
    Logging { message: String },
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Logging { .. } => EXIT_USAGE,
            Self::Workspace(error) if error.is_config() => EXIT_USAGE,
            _ => EXIT_DATA,
        }
    }
}
