//! Batch applier: turns a diff into destination batches.

use crate::diff::DiffResult;
use crate::error::{DestinationError, ItemApplyError};
use crate::observer::{NoopObserver, ProgressAction, ProgressEvent, SyncObserver};
use crate::transport::DestinationStore;
use rowsync_protocol::{BatchOperation, OperationKind, OperationOutcome, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Counts and anomalies from applying a diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Inserts the destination accepted.
    pub added: usize,
    /// Updates the destination accepted.
    pub updated: usize,
    /// Deletes the destination accepted.
    pub deleted: usize,
    /// Operations the destination rejected.
    pub failures: Vec<ItemApplyError>,
    /// Batches submitted.
    pub round_trips: usize,
}

impl ApplyReport {
    fn record(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Insert => self.added += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Delete => self.deleted += 1,
        }
    }
}

/// A transport failure part way through a diff.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct ApplyFailure {
    /// The failure that stopped the applier.
    #[source]
    pub error: DestinationError,
    /// Outcomes recorded before the failure.
    pub applied: ApplyReport,
}

/// Submits a [`DiffResult`] to a [`DestinationStore`].
///
/// Deletes go out first as one batch; inserts followed by updates go out as
/// a second batch. With a maximum batch size set, each phase is split into
/// consecutive chunks. Empty phases are not submitted.
///
/// A rejected item is recorded and processing continues. A transport error
/// stops immediately. Batches already submitted stay applied and are
/// returned in [`ApplyFailure::applied`].
pub struct BatchApplier<'a, D: DestinationStore + ?Sized> {
    store: &'a D,
    list: &'a str,
    mapping: &'a str,
    max_batch_size: Option<usize>,
    observer: &'a dyn SyncObserver,
}

impl<'a, D: DestinationStore + ?Sized> BatchApplier<'a, D> {
    /// Creates an applier for one destination list.
    pub fn new(store: &'a D, list: &'a str) -> Self {
        Self {
            store,
            list,
            mapping: list,
            max_batch_size: None,
            observer: &NoopObserver,
        }
    }

    /// Caps operations per batch.
    pub fn with_max_batch_size(mut self, size: Option<usize>) -> Self {
        self.max_batch_size = size.filter(|n| *n > 0);
        self
    }

    /// Reports progress to `observer`, tagged with `mapping`.
    pub fn with_observer(mut self, observer: &'a dyn SyncObserver, mapping: &'a str) -> Self {
        self.observer = observer;
        self.mapping = mapping;
        self
    }

    /// Applies the diff.
    pub fn apply(&self, diff: &DiffResult) -> Result<ApplyReport, ApplyFailure> {
        let mut report = ApplyReport::default();
        match self.apply_phases(diff, &mut report) {
            Ok(()) => Ok(report),
            Err(error) => Err(ApplyFailure {
                error,
                applied: report,
            }),
        }
    }

    fn apply_phases(
        &self,
        diff: &DiffResult,
        report: &mut ApplyReport,
    ) -> Result<(), DestinationError> {
        let deletes: Vec<(BatchOperation, &Value)> = diff
            .to_delete
            .iter()
            .map(|d| (BatchOperation::delete(d.id.clone()), &d.key))
            .collect();
        self.submit_phase(&deletes, report)?;

        let upserts: Vec<(BatchOperation, &Value)> = diff
            .to_insert
            .iter()
            .map(|i| (BatchOperation::insert(i.fields.clone()), &i.key))
            .chain(
                diff.to_update
                    .iter()
                    .map(|u| (BatchOperation::update(u.id.clone(), u.fields.clone()), &u.key)),
            )
            .collect();
        self.submit_phase(&upserts, report)
    }

    fn submit_phase(
        &self,
        items: &[(BatchOperation, &Value)],
        report: &mut ApplyReport,
    ) -> Result<(), DestinationError> {
        if items.is_empty() {
            return Ok(());
        }
        let chunk_size = self.max_batch_size.unwrap_or(items.len());

        for chunk in items.chunks(chunk_size) {
            let operations: Vec<BatchOperation> = chunk.iter().map(|(op, _)| op.clone()).collect();
            debug!(list = %self.list, operations = operations.len(), "submitting batch");

            let outcomes = self.store.submit_batch(self.list, &operations)?;
            report.round_trips += 1;
            let actual = outcomes.len();

            // Outcomes answer operations in order, even from a short reply.
            for ((operation, key), outcome) in chunk.iter().zip(outcomes) {
                self.record_outcome(operation, key, outcome, report);
            }
            if actual != operations.len() {
                return Err(DestinationError::OutcomeMismatch {
                    expected: operations.len(),
                    actual,
                });
            }
        }

        Ok(())
    }

    fn record_outcome(
        &self,
        operation: &BatchOperation,
        key: &Value,
        outcome: OperationOutcome,
        report: &mut ApplyReport,
    ) {
        let kind = operation.kind();
        let action = match outcome {
            OperationOutcome::Applied { .. } => {
                report.record(kind);
                match kind {
                    OperationKind::Insert => ProgressAction::Added,
                    OperationKind::Update => ProgressAction::Updated,
                    OperationKind::Delete => ProgressAction::Deleted,
                }
            }
            OperationOutcome::Rejected { reason } => {
                warn!(list = %self.list, %kind, key = %key, %reason, "destination rejected operation");
                report.failures.push(ItemApplyError {
                    kind,
                    key: key.clone(),
                    id: operation.id().cloned(),
                    reason: reason.clone(),
                });
                ProgressAction::Failed { kind, reason }
            }
        };

        self.observer.on_progress(&ProgressEvent {
            mapping: self.mapping.to_string(),
            action,
            key: key.clone(),
        });
    }
}
