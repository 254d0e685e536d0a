//! Sync orchestrator state machine.

use crate::apply::BatchApplier;
use crate::config::{DestinationConfig, DuplicateKeyPolicy, MappingConfig, SourceConfig};
use crate::diff::DiffEngine;
use crate::error::{ItemApplyError, Phase, SyncError, SyncResult};
use crate::index::KeyIndex;
use crate::normalize::RowNormalizer;
use crate::observer::{SyncObserver, TracingObserver};
use crate::schema::FieldSet;
use crate::transport::{DestinationStore, SourceProvider};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// The current state of a sync pass.
///
/// A pass moves strictly forward through these states and returns to
/// `Idle` when it finishes or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass running.
    Idle,
    /// Source rows read and normalized, field set derived.
    SourceFetched,
    /// Destination records read.
    DestinationFetched,
    /// Key index built.
    IndexBuilt,
    /// Diff computed.
    Diffed,
    /// Batches submitted.
    Applied,
    /// Summary produced.
    Reported,
}

impl SyncState {
    /// The state that follows this one.
    pub fn next(self) -> SyncState {
        match self {
            SyncState::Idle => SyncState::SourceFetched,
            SyncState::SourceFetched => SyncState::DestinationFetched,
            SyncState::DestinationFetched => SyncState::IndexBuilt,
            SyncState::IndexBuilt => SyncState::Diffed,
            SyncState::Diffed => SyncState::Applied,
            SyncState::Applied => SyncState::Reported,
            SyncState::Reported => SyncState::Idle,
        }
    }

    /// Returns true while a pass is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of syncing one mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    /// Mapping name.
    pub mapping: String,
    /// Rows returned by the source.
    pub source_row_count: usize,
    /// Records in the destination before the pass.
    pub destination_row_count_before: usize,
    /// Records inserted.
    pub added: usize,
    /// Records rewritten.
    pub updated: usize,
    /// Records removed.
    pub deleted: usize,
    /// Source rows that already matched.
    pub unchanged: usize,
    /// Duplicate destination records skipped.
    pub shadowed: usize,
    /// Operations the destination rejected.
    pub failures: Vec<ItemApplyError>,
    /// Batches submitted to the destination.
    pub round_trips: usize,
    /// Wall-clock time of the pass.
    pub duration: Duration,
}

impl SyncSummary {
    /// Returns true if any operation was rejected.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of accepted writes.
    pub fn changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: source={} destination={} added={} updated={} deleted={} unchanged={} failed={}",
            self.mapping,
            self.source_row_count,
            self.destination_row_count_before,
            self.added,
            self.updated,
            self.deleted,
            self.unchanged,
            self.failures.len()
        )
    }
}

/// Running totals across passes on one reconciler.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerStats {
    /// Passes that produced a summary.
    pub passes_completed: u64,
    /// Passes aborted by a fatal error.
    pub passes_failed: u64,
    /// Total records inserted.
    pub rows_added: u64,
    /// Total records rewritten.
    pub rows_updated: u64,
    /// Total records removed.
    pub rows_deleted: u64,
    /// Total rejected operations.
    pub item_failures: u64,
    /// Last completed pass.
    pub last_sync_time: Option<Instant>,
    /// Last fatal error message.
    pub last_error: Option<String>,
}

/// Reconciles a destination list with a source query, one mapping at a time.
///
/// Each call to [`sync`](Self::sync) is a single, strictly sequential pass:
/// fetch source, project, fetch destination, index, diff, apply, report.
/// Nothing is retried; any fatal error aborts the pass and names the
/// mapping and phase.
pub struct Reconciler<S: SourceProvider, D: DestinationStore> {
    source: Arc<S>,
    destination: Arc<D>,
    observer: Arc<dyn SyncObserver>,
    state: RwLock<SyncState>,
    stats: RwLock<ReconcilerStats>,
    in_flight: AtomicBool,
}

impl<S: SourceProvider, D: DestinationStore> Reconciler<S, D> {
    /// Creates a reconciler that logs progress through `tracing`.
    pub fn new(source: S, destination: D) -> Self {
        Self::with_shared(Arc::new(source), Arc::new(destination))
    }

    /// Creates a reconciler over shared collaborators.
    pub fn with_shared(source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            source,
            destination,
            observer: Arc::new(TracingObserver),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(ReconcilerStats::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Replaces the progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The source collaborator.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The destination collaborator.
    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the running totals.
    pub fn stats(&self) -> ReconcilerStats {
        self.stats.read().clone()
    }

    /// Runs one sync pass for `mapping`.
    pub fn sync(
        &self,
        source_config: &SourceConfig,
        destination_config: &DestinationConfig,
        mapping: &MappingConfig,
    ) -> SyncResult<SyncSummary> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::InvalidStateTransition {
                from: self.state().to_string(),
                to: SyncState::SourceFetched.to_string(),
            });
        }

        let start = Instant::now();
        let result = self.run(source_config, destination_config, mapping, start);

        match &result {
            Ok(summary) => {
                info!(
                    mapping = %summary.mapping,
                    source = summary.source_row_count,
                    destination = summary.destination_row_count_before,
                    added = summary.added,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    failed = summary.failures.len(),
                    "sync complete"
                );
                let mut stats = self.stats.write();
                stats.passes_completed += 1;
                stats.rows_added += summary.added as u64;
                stats.rows_updated += summary.updated as u64;
                stats.rows_deleted += summary.deleted as u64;
                stats.item_failures += summary.failures.len() as u64;
                stats.last_sync_time = Some(Instant::now());
                stats.last_error = None;
            }
            Err(e) => {
                error!(mapping = %mapping.name, error = %e, "sync aborted");
                let mut stats = self.stats.write();
                stats.passes_failed += 1;
                if let Some(applied) = e.applied() {
                    stats.rows_added += applied.added as u64;
                    stats.rows_updated += applied.updated as u64;
                    stats.rows_deleted += applied.deleted as u64;
                    stats.item_failures += applied.failures.len() as u64;
                }
                stats.last_error = Some(e.to_string());
            }
        }

        self.set_state(SyncState::Idle);
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn run(
        &self,
        source_config: &SourceConfig,
        destination_config: &DestinationConfig,
        mapping: &MappingConfig,
        start: Instant,
    ) -> SyncResult<SyncSummary> {
        let name = mapping.name.as_str();
        mapping
            .validate(destination_config)
            .map_err(|e| SyncError::from_config(name, Phase::Configure, e))?;
        info!(mapping = %name, list = %mapping.list, "starting sync");

        let raw = self
            .source
            .fetch(&mapping.query, source_config)
            .map_err(|e| SyncError::from_source(name, Phase::FetchSource, e))?;
        let rows = RowNormalizer::new(mapping.null_sentinel.clone()).normalize_set(raw);
        let fields = FieldSet::project(
            &rows.columns,
            &mapping.primary_key,
            &destination_config.identity_field,
        )
        .map_err(|e| SyncError::from_config(name, Phase::Project, e))?;
        self.advance(SyncState::SourceFetched)?;

        let records = self
            .destination
            .fetch_all(&mapping.list, &fields, destination_config.page_size)
            .map_err(|e| SyncError::from_destination(name, Phase::FetchDestination, e))?;
        self.advance(SyncState::DestinationFetched)?;

        let index = KeyIndex::build(&records, &mapping.primary_key, &mapping.null_sentinel);
        if mapping.duplicate_keys == DuplicateKeyPolicy::Fail {
            index
                .ensure_unique()
                .map_err(|e| SyncError::from_config(name, Phase::BuildIndex, e))?;
        }
        self.advance(SyncState::IndexBuilt)?;

        let engine = DiffEngine::new(&fields, &mapping.null_sentinel);
        if mapping.duplicate_keys == DuplicateKeyPolicy::Fail {
            engine
                .ensure_unique_source_keys(&rows.rows)
                .map_err(|e| SyncError::from_config(name, Phase::Diff, e))?;
        }
        let diff = engine.diff(&rows.rows, &records, &index);
        debug!(
            mapping = %name,
            insert = diff.to_insert.len(),
            update = diff.to_update.len(),
            delete = diff.to_delete.len(),
            unchanged = diff.unchanged,
            "diff computed"
        );
        self.advance(SyncState::Diffed)?;

        let report = BatchApplier::new(self.destination.as_ref(), &mapping.list)
            .with_max_batch_size(destination_config.max_batch_size)
            .with_observer(self.observer.as_ref(), name)
            .apply(&diff)
            .map_err(|e| SyncError::from_apply(name, e))?;
        self.advance(SyncState::Applied)?;

        let summary = SyncSummary {
            mapping: mapping.name.clone(),
            source_row_count: rows.len(),
            destination_row_count_before: records.len(),
            added: report.added,
            updated: report.updated,
            deleted: report.deleted,
            unchanged: diff.unchanged,
            shadowed: diff.shadowed.len(),
            failures: report.failures,
            round_trips: report.round_trips,
            duration: start.elapsed(),
        };
        self.advance(SyncState::Reported)?;

        Ok(summary)
    }

    /// Moves to `to`, which must directly follow the current state.
    fn advance(&self, to: SyncState) -> SyncResult<()> {
        let mut state = self.state.write();
        if state.next() != to {
            return Err(SyncError::InvalidStateTransition {
                from: state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(from = %*state, to = %to, "state transition");
        *state = to;
        Ok(())
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }
}
