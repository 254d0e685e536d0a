//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the command layer.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file did not contain the expected JSON.
    #[error("{path}: invalid JSON: {source}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// `--mapping` named a mapping the job does not define.
    #[error("job has no mapping named '{0}'")]
    UnknownMapping(String),

    /// The job defines no mappings, or two with the same name.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// `check` found configuration problems.
    #[error("{0} mapping(s) failed validation")]
    Validation(usize),

    /// `run` finished but not everything was applied.
    #[error("{failed} mapping(s) failed, {rejected} item(s) rejected")]
    Incomplete {
        /// Mappings aborted by a fatal error.
        failed: usize,
        /// Operations the destination rejected.
        rejected: usize,
    },
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CliError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
