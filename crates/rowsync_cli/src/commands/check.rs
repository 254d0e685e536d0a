//! Check command implementation.

use crate::error::{CliError, CliResult};
use crate::job::Job;
use std::path::Path;

/// Runs the check command: validates every mapping without touching
/// the source or the destination.
pub fn run(job_path: &Path) -> CliResult<()> {
    let job = Job::load(job_path)?;
    println!("Checking {} mapping(s) in {}", job.mappings.len(), job_path.display());

    let invalid = validate(&job);
    for (name, problem) in &invalid {
        println!("  ✗ {name}: {problem}");
    }
    for mapping in &job.mappings {
        if !invalid.iter().any(|(name, _)| name == &mapping.name) {
            println!("  ✓ {} -> {} (key: {})", mapping.name, mapping.list, mapping.primary_key);
        }
    }

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(CliError::Validation(invalid.len()))
    }
}

/// Mapping names paired with their validation error.
fn validate(job: &Job) -> Vec<(String, String)> {
    job.mappings
        .iter()
        .filter_map(|m| {
            m.validate(&job.destination)
                .err()
                .map(|e| (m.name.clone(), e.to_string()))
        })
        .collect()
}
