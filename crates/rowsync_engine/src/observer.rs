//! Progress reporting.
//!
//! The applier reports every row it touches through a [`SyncObserver`]
//! instead of printing, so diff and apply stay testable without capturing
//! output.

use parking_lot::Mutex;
use rowsync_protocol::{OperationKind, Value};
use std::fmt;
use std::io::Write;
use tracing::{info, warn};

/// What happened to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressAction {
    /// Row inserted.
    Added,
    /// Record rewritten.
    Updated,
    /// Record removed.
    Deleted,
    /// The destination rejected the operation.
    Failed {
        /// Attempted operation.
        kind: OperationKind,
        /// Reason given by the destination.
        reason: String,
    },
}

/// A single progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Mapping being synced.
    pub mapping: String,
    /// What happened.
    pub action: ProgressAction,
    /// Primary-key value of the row.
    pub key: Value,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            ProgressAction::Added => write!(f, "Added: {}", self.key),
            ProgressAction::Updated => write!(f, "Updated: {}", self.key),
            ProgressAction::Deleted => write!(f, "Deleted: {}", self.key),
            ProgressAction::Failed { kind, reason } => {
                write!(f, "Failed {kind}: {} ({reason})", self.key)
            }
        }
    }
}

/// Receives progress events during a sync pass.
pub trait SyncObserver: Send + Sync {
    /// Called once per applied or rejected operation.
    fn on_progress(&self, event: &ProgressEvent);
}

/// Logs progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.action {
            ProgressAction::Failed { .. } => warn!(mapping = %event.mapping, "{event}"),
            _ => info!(mapping = %event.mapping, "{event}"),
        }
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Writes one line per event, e.g. to a transcript file.
pub struct WriterObserver<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterObserver<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> SyncObserver for WriterObserver<W> {
    fn on_progress(&self, event: &ProgressEvent) {
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "[{}] {}", event.mapping, event) {
            warn!(error = %e, "failed to write progress line");
        }
    }
}

/// Collects events in memory for testing.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all events seen so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Returns the rendered progress lines.
    pub fn lines(&self) -> Vec<String> {
        self.events.lock().iter().map(ToString::to_string).collect()
    }
}

impl SyncObserver for RecordingObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}
