//! JSON-file source and destination.
//!
//! The source reads one JSON file per query from the connection directory:
//!
//! ```json
//! { "columns": ["id", "name"], "rows": [{ "id": 1, "name": "A" }] }
//! ```
//!
//! The destination keeps one `<list>.json` file per list in the endpoint
//! directory, holding an array of flat objects. Each object carries its
//! identity under the configured identity field. New identities are
//! integers above the highest one this store has seen for the list, so an
//! identity freed by a delete is not handed out again.

use parking_lot::Mutex;
use rowsync_engine::{
    collect_pages, DestinationConfig, DestinationError, DestinationStore, FieldSet, Page,
    SourceConfig, SourceError, SourceProvider,
};
use rowsync_protocol::{
    BatchOperation, DestinationRecord, FieldMap, OperationOutcome, RecordId, SourceRowSet, Value,
};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves source queries from JSON files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileSource;

impl SourceProvider for JsonFileSource {
    fn fetch(&self, query: &str, config: &SourceConfig) -> Result<SourceRowSet, SourceError> {
        let root = Path::new(&config.connection);
        if !root.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let path = root.join(query);
        let failed = |message: String| SourceError::QueryFailed {
            query: query.to_string(),
            message,
        };
        let text = fs::read_to_string(&path).map_err(|e| failed(e.to_string()))?;
        let rows: SourceRowSet = serde_json::from_str(&text).map_err(|e| failed(e.to_string()))?;

        debug!(path = %path.display(), rows = rows.len(), "read source file");
        Ok(rows)
    }
}

/// Record lists stored as JSON arrays on disk.
#[derive(Debug)]
pub struct JsonFileDestination {
    root: PathBuf,
    identity_field: String,
    /// Highest identity seen or issued per list. Held for the whole batch.
    issued: Mutex<HashMap<String, i64>>,
}

impl JsonFileDestination {
    /// Opens the store described by `config`.
    pub fn new(config: &DestinationConfig) -> Self {
        Self {
            root: PathBuf::from(&config.endpoint),
            identity_field: config.identity_field.clone(),
            issued: Mutex::new(HashMap::new()),
        }
    }

    fn list_path(&self, list: &str) -> PathBuf {
        self.root.join(format!("{list}.json"))
    }

    fn load(&self, list: &str) -> Result<Vec<FieldMap>, DestinationError> {
        let path = self.list_path(list);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DestinationError::ListNotFound(list.to_string()),
            _ => DestinationError::Transport(format!("{}: {e}", path.display())),
        })?;
        serde_json::from_str(&text)
            .map_err(|e| DestinationError::Transport(format!("{}: {e}", path.display())))
    }

    fn store(&self, list: &str, objects: &[FieldMap]) -> Result<(), DestinationError> {
        let path = self.list_path(list);
        let transport = |e: &dyn std::fmt::Display| {
            DestinationError::Transport(format!("{}: {e}", path.display()))
        };

        let text = serde_json::to_string_pretty(objects).map_err(|e| transport(&e))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, text).map_err(|e| transport(&e))?;
        fs::rename(&staging, &path).map_err(|e| transport(&e))
    }

    fn identity_of(&self, object: &FieldMap) -> Option<RecordId> {
        match object.get(&self.identity_field)? {
            Value::Text(s) => Some(RecordId::new(s.clone())),
            Value::Null => None,
            other => Some(RecordId::new(other.to_string())),
        }
    }

    fn max_identity(&self, objects: &[FieldMap]) -> i64 {
        objects
            .iter()
            .filter_map(|o| o.get(&self.identity_field).and_then(Value::as_integer))
            .max()
            .unwrap_or(0)
    }

    fn to_record(
        &self,
        object: &FieldMap,
        fields: &FieldSet,
    ) -> Result<DestinationRecord, DestinationError> {
        let id = self.identity_of(object).ok_or_else(|| {
            DestinationError::Transport(format!("record without '{}'", self.identity_field))
        })?;
        Ok(DestinationRecord {
            id,
            fields: fields
                .projected()
                .iter()
                .filter_map(|name| object.get(name).map(|v| (name.clone(), v.clone())))
                .collect(),
        })
    }

    fn position(&self, objects: &[FieldMap], id: &RecordId) -> Option<usize> {
        objects
            .iter()
            .position(|o| self.identity_of(o).as_ref() == Some(id))
    }

    fn apply_one(
        &self,
        objects: &mut Vec<FieldMap>,
        high_water: &mut i64,
        operation: &BatchOperation,
    ) -> Result<OperationOutcome, DestinationError> {
        Ok(match operation {
            BatchOperation::Insert { fields } => {
                let id = high_water.checked_add(1).ok_or_else(|| {
                    DestinationError::Transport(format!(
                        "no identity left above {}",
                        *high_water
                    ))
                })?;
                *high_water = id;
                let mut object = fields.clone();
                object.insert(self.identity_field.clone(), Value::Integer(id));
                objects.push(object);
                OperationOutcome::applied(RecordId::new(id.to_string()))
            }
            BatchOperation::Update { id, fields } => match self.position(objects, id) {
                Some(i) => {
                    let object = &mut objects[i];
                    for (name, value) in fields {
                        if *name != self.identity_field {
                            object.insert(name.clone(), value.clone());
                        }
                    }
                    OperationOutcome::applied(id.clone())
                }
                None => OperationOutcome::rejected(format!("record {id} not found")),
            },
            BatchOperation::Delete { id } => match self.position(objects, id) {
                Some(i) => {
                    objects.remove(i);
                    OperationOutcome::applied(id.clone())
                }
                None => OperationOutcome::rejected(format!("record {id} not found")),
            },
        })
    }
}

impl DestinationStore for JsonFileDestination {
    fn fetch_all(
        &self,
        list: &str,
        fields: &FieldSet,
        page_size: u32,
    ) -> Result<Vec<DestinationRecord>, DestinationError> {
        let objects = self.load(list)?;
        let page_size = page_size.max(1) as usize;

        collect_pages(|token| -> Result<Page<DestinationRecord>, DestinationError> {
            let offset = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
            let end = objects.len().min(offset + page_size);
            let items = objects[offset.min(end)..end]
                .iter()
                .map(|o| self.to_record(o, fields))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if end < objects.len() {
                Page::with_next(items, end.to_string())
            } else {
                Page::last(items)
            })
        })
    }

    fn submit_batch(
        &self,
        list: &str,
        operations: &[BatchOperation],
    ) -> Result<Vec<OperationOutcome>, DestinationError> {
        let mut issued = self.issued.lock();
        let mut objects = self.load(list)?;

        let stored = self.max_identity(&objects);
        let high_water = issued.entry(list.to_string()).or_insert(0);
        *high_water = (*high_water).max(stored);

        let outcomes = operations
            .iter()
            .map(|op| self.apply_one(&mut objects, high_water, op))
            .collect::<Result<Vec<_>, _>>()?;
        self.store(list, &objects)?;
        debug!(list = %list, operations = operations.len(), "wrote destination list");
        Ok(outcomes)
    }
}
