//! Run command implementation.

use crate::error::{CliError, CliResult};
use crate::job::Job;
use crate::stores::{JsonFileDestination, JsonFileSource};
use rowsync_engine::{
    ProgressEvent, Reconciler, SyncError, SyncObserver, SyncSummary, TracingObserver,
    WriterObserver,
};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// Forwards every event to each inner observer.
struct Fanout(Vec<Arc<dyn SyncObserver>>);

impl SyncObserver for Fanout {
    fn on_progress(&self, event: &ProgressEvent) {
        for observer in &self.0 {
            observer.on_progress(event);
        }
    }
}

/// Outcome of a run across all selected mappings.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Summaries of mappings that completed.
    pub summaries: Vec<SyncSummary>,
    /// Fatal errors of mappings that aborted.
    pub errors: Vec<SyncError>,
}

impl RunReport {
    /// Total rejected operations across completed mappings.
    pub fn rejected(&self) -> usize {
        self.summaries.iter().map(|s| s.failures.len()).sum()
    }

    fn into_result(self) -> CliResult<Self> {
        let rejected = self.rejected();
        if self.errors.is_empty() && rejected == 0 {
            Ok(self)
        } else {
            Err(CliError::Incomplete {
                failed: self.errors.len(),
                rejected,
            })
        }
    }
}

/// Runs the run command.
///
/// Mappings run one after another. A mapping that fails is logged and
/// skipped; the command fails at the end if anything did not apply.
pub fn run(job_path: &Path, only: &[String], transcript: Option<&Path>) -> CliResult<RunReport> {
    let report = execute(job_path, only, transcript)?;
    println!();
    for summary in &report.summaries {
        println!("✓ {summary}");
        for failure in &summary.failures {
            println!("    ✗ {failure}");
        }
    }
    for err in &report.errors {
        println!("✗ {err}");
        if let Some(applied) = err.applied() {
            println!(
                "    applied before failure: added={} updated={} deleted={} failed={}",
                applied.added,
                applied.updated,
                applied.deleted,
                applied.failures.len()
            );
        }
    }
    report.into_result()
}

/// Runs the selected mappings and collects their outcomes.
pub fn execute(job_path: &Path, only: &[String], transcript: Option<&Path>) -> CliResult<RunReport> {
    let job = Job::load(job_path)?;
    let mappings = job.select(only)?;

    let mut observers: Vec<Arc<dyn SyncObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = transcript {
        let file = File::create(path).map_err(|e| CliError::io(path, e))?;
        observers.push(Arc::new(WriterObserver::new(file)));
    }

    let reconciler = Reconciler::new(JsonFileSource, JsonFileDestination::new(&job.destination))
        .with_observer(Arc::new(Fanout(observers)));

    let mut report = RunReport::default();
    for mapping in mappings {
        match reconciler.sync(&job.source, &job.destination, mapping) {
            Ok(summary) => report.summaries.push(summary),
            Err(e) => {
                error!(mapping = %mapping.name, phase = ?e.phase(), "skipping mapping: {e}");
                report.errors.push(e);
            }
        }
    }

    Ok(report)
}
