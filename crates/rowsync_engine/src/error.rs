//! Error types for the reconciliation engine.

use crate::apply::{ApplyFailure, ApplyReport};
use rowsync_protocol::{OperationKind, RecordId, Value};
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Stage of a sync pass, reported with every fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Validating the mapping configuration.
    Configure,
    /// Reading rows from the source.
    FetchSource,
    /// Deriving the field set from the source schema.
    Project,
    /// Reading records from the destination.
    FetchDestination,
    /// Indexing destination records by primary key.
    BuildIndex,
    /// Checking source keys and classifying rows and records.
    Diff,
    /// Submitting batches to the destination.
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Configure => "configure",
            Phase::FetchSource => "fetch source",
            Phase::Project => "project schema",
            Phase::FetchDestination => "fetch destination",
            Phase::BuildIndex => "build index",
            Phase::Diff => "diff",
            Phase::Apply => "apply",
        })
    }
}

/// Invalid mapping or field configuration. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required name is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the configuration field.
        field: &'static str,
    },

    /// A size setting is zero.
    #[error("{field} must be greater than zero")]
    ZeroSize {
        /// Name of the configuration field.
        field: &'static str,
    },

    /// The declared primary key is not among the source columns.
    #[error("primary key '{key}' is not a source column (columns: {columns:?})")]
    MissingPrimaryKey {
        /// Declared primary key.
        key: String,
        /// Columns reported by the source.
        columns: Vec<String>,
    },

    /// The primary key names the destination identity field.
    #[error("primary key '{0}' is the destination identity field")]
    PrimaryKeyIsIdentity(String),

    /// Destination records share a primary key and duplicates are not allowed.
    #[error("destination holds {count} records with primary key {key}")]
    DuplicateDestinationKey {
        /// The duplicated key, rendered.
        key: String,
        /// Number of records sharing it.
        count: usize,
    },

    /// Source rows share a primary key and duplicates are not allowed.
    #[error("source holds {count} rows with primary key {key}")]
    DuplicateSourceKey {
        /// The duplicated key, rendered.
        key: String,
        /// Number of rows sharing it.
        count: usize,
    },
}

/// Failure reading from the source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The query was rejected or failed mid-read.
    #[error("query '{query}' failed: {message}")]
    QueryFailed {
        /// The query text.
        query: String,
        /// Error message.
        message: String,
    },
}

/// Transport-level failure talking to the destination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DestinationError {
    /// Network or transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The destination list does not exist.
    #[error("list not found: {0}")]
    ListNotFound(String),

    /// The destination answered a batch with the wrong number of outcomes.
    #[error("destination returned {actual} outcomes for a batch of {expected}")]
    OutcomeMismatch {
        /// Operations submitted.
        expected: usize,
        /// Outcomes received.
        actual: usize,
    },
}

/// A single operation rejected inside an otherwise successful batch.
///
/// These are collected into the sync summary and never abort a mapping.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} of {key} rejected: {reason}")]
pub struct ItemApplyError {
    /// What was attempted.
    pub kind: OperationKind,
    /// Primary-key value of the affected row.
    pub key: Value,
    /// Destination identity, for updates and deletes.
    pub id: Option<RecordId>,
    /// Reason given by the destination.
    pub reason: String,
}

/// Fatal errors that abort a mapping.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid configuration.
    #[error("mapping '{mapping}' failed during {phase}: {source}")]
    Config {
        /// Mapping name.
        mapping: String,
        /// Phase that failed.
        phase: Phase,
        /// Underlying error.
        source: ConfigError,
    },

    /// Source read failure.
    #[error("mapping '{mapping}' failed during {phase}: {source}")]
    Source {
        /// Mapping name.
        mapping: String,
        /// Phase that failed.
        phase: Phase,
        /// Underlying error.
        source: SourceError,
    },

    /// Destination transport failure.
    #[error("mapping '{mapping}' failed during {phase}: {source}")]
    Destination {
        /// Mapping name.
        mapping: String,
        /// Phase that failed.
        phase: Phase,
        /// Underlying error.
        source: DestinationError,
    },

    /// Transport failure after some batches were already applied.
    ///
    /// `applied` holds the accepted writes and rejected items of every
    /// batch that got an answer before the failure.
    #[error("mapping '{mapping}' failed during apply: {source}")]
    PartialApply {
        /// Mapping name.
        mapping: String,
        /// Underlying error.
        source: DestinationError,
        /// What the destination accepted before the failure.
        applied: ApplyReport,
    },

    /// Invalid state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl SyncError {
    pub(crate) fn from_config(mapping: &str, phase: Phase, source: ConfigError) -> Self {
        Self::Config {
            mapping: mapping.to_string(),
            phase,
            source,
        }
    }

    pub(crate) fn from_source(mapping: &str, phase: Phase, source: SourceError) -> Self {
        Self::Source {
            mapping: mapping.to_string(),
            phase,
            source,
        }
    }

    pub(crate) fn from_destination(mapping: &str, phase: Phase, source: DestinationError) -> Self {
        Self::Destination {
            mapping: mapping.to_string(),
            phase,
            source,
        }
    }

    pub(crate) fn from_apply(mapping: &str, failure: ApplyFailure) -> Self {
        Self::PartialApply {
            mapping: mapping.to_string(),
            source: failure.error,
            applied: failure.applied,
        }
    }

    /// Returns the mapping that failed, if the error belongs to one.
    pub fn mapping(&self) -> Option<&str> {
        match self {
            SyncError::Config { mapping, .. }
            | SyncError::Source { mapping, .. }
            | SyncError::Destination { mapping, .. }
            | SyncError::PartialApply { mapping, .. } => Some(mapping),
            SyncError::InvalidStateTransition { .. } => None,
        }
    }

    /// Returns the phase that failed.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SyncError::Config { phase, .. }
            | SyncError::Source { phase, .. }
            | SyncError::Destination { phase, .. } => Some(*phase),
            SyncError::PartialApply { .. } => Some(Phase::Apply),
            SyncError::InvalidStateTransition { .. } => None,
        }
    }

    /// Writes that landed before an apply-phase failure.
    pub fn applied(&self) -> Option<&ApplyReport> {
        match self {
            SyncError::PartialApply { applied, .. } => Some(applied),
            _ => None,
        }
    }
}
