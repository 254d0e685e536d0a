//! Job file loading.

use crate::error::{CliError, CliResult};
use rowsync_engine::{DestinationConfig, MappingConfig, SourceConfig};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A job: one source, one destination, and the mappings between them.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Source connection.
    pub source: SourceConfig,
    /// Destination store.
    #[serde(default)]
    pub destination: DestinationConfig,
    /// Mappings, run in order.
    pub mappings: Vec<MappingConfig>,
}

impl Job {
    /// Reads and parses a job file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        let job: Job = serde_json::from_str(&text).map_err(|e| CliError::json(path, e))?;

        if job.mappings.is_empty() {
            return Err(CliError::InvalidJob("no mappings defined".into()));
        }
        let mut seen = HashSet::new();
        for mapping in &job.mappings {
            if !seen.insert(mapping.name.as_str()) {
                return Err(CliError::InvalidJob(format!(
                    "mapping '{}' is defined more than once",
                    mapping.name
                )));
            }
        }
        Ok(job)
    }

    /// Mappings to run: all of them, or those named in `only`, in job order.
    pub fn select(&self, only: &[String]) -> CliResult<Vec<&MappingConfig>> {
        if let Some(unknown) = only
            .iter()
            .find(|name| !self.mappings.iter().any(|m| &m.name == *name))
        {
            return Err(CliError::UnknownMapping(unknown.clone()));
        }
        Ok(self
            .mappings
            .iter()
            .filter(|m| only.is_empty() || only.contains(&m.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const JOB: &str = r#"{
        "source": { "connection": "/data/source" },
        "destination": { "endpoint": "/data/lists", "page_size": 100 },
        "mappings": [
            { "name": "people", "query": "people.json", "list": "People", "primary_key": "id" },
            { "name": "teams", "query": "teams.json", "list": "Teams", "primary_key": "code",
              "null_sentinel": "" }
        ]
    }"#;

    fn write(text: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(&path, text).unwrap();
        (dir, path)
    }

    #[test]
    fn load_job() {
        let (_dir, path) = write(JOB);
        let job = Job::load(&path).unwrap();

        assert_eq!(job.source.connection, "/data/source");
        assert_eq!(job.destination.page_size, 100);
        assert_eq!(job.destination.identity_field, "ID");
        assert_eq!(job.mappings.len(), 2);
        assert_eq!(job.mappings[1].null_sentinel, rowsync_protocol::Value::from(""));
    }

    #[test]
    fn select_mappings() {
        let (_dir, path) = write(JOB);
        let job = Job::load(&path).unwrap();

        assert_eq!(job.select(&[]).unwrap().len(), 2);
        let only = job.select(&["teams".to_string()]).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "teams");
        assert!(matches!(
            job.select(&["orders".to_string()]),
            Err(CliError::UnknownMapping(name)) if name == "orders"
        ));
    }

    #[test]
    fn rejects_bad_jobs() {
        let (_dir, path) = write(r#"{"source":{"connection":"x"},"mappings":[]}"#);
        assert!(matches!(Job::load(&path), Err(CliError::InvalidJob(_))));

        let (_dir, path) = write(
            r#"{"source":{"connection":"x"},"mappings":[
                {"name":"a","query":"q","list":"L","primary_key":"id"},
                {"name":"a","query":"q","list":"M","primary_key":"id"}]}"#,
        );
        assert!(matches!(Job::load(&path), Err(CliError::InvalidJob(_))));

        let (_dir, path) = write("not json");
        assert!(matches!(Job::load(&path), Err(CliError::Json { .. })));

        assert!(matches!(
            Job::load(Path::new("/nonexistent/job.json")),
            Err(CliError::Io { .. })
        ));
    }
}
