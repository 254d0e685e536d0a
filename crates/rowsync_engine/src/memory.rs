//! In-memory collaborators for testing.

use crate::config::SourceConfig;
use crate::error::{DestinationError, SourceError};
use crate::schema::FieldSet;
use crate::transport::{collect_pages, DestinationStore, Page, SourceProvider};
use parking_lot::RwLock;
use rowsync_protocol::{
    BatchOperation, Canonical, DestinationRecord, FieldMap, OperationOutcome, RecordId,
    SourceRowSet, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Decrements a failure budget, returning true if a failure should fire.
fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A source that serves preconfigured row sets.
#[derive(Debug, Default)]
pub struct MemorySource {
    default_rows: RwLock<Option<SourceRowSet>>,
    by_query: RwLock<HashMap<String, SourceRowSet>>,
    error: RwLock<Option<SourceError>>,
    queries: RwLock<Vec<String>>,
}

impl MemorySource {
    /// Creates a source that answers every query with `rows`.
    pub fn new(rows: SourceRowSet) -> Self {
        let source = Self::default();
        source.set_rows(rows);
        source
    }

    /// Replaces the answer for queries without a specific result.
    pub fn set_rows(&self, rows: SourceRowSet) {
        *self.default_rows.write() = Some(rows);
    }

    /// Sets the answer for one query.
    pub fn set_query(&self, query: impl Into<String>, rows: SourceRowSet) {
        self.by_query.write().insert(query.into(), rows);
    }

    /// Makes every fetch fail with `error` until cleared.
    pub fn fail_with(&self, error: SourceError) {
        *self.error.write() = Some(error);
    }

    /// Stops failing.
    pub fn clear_error(&self) {
        *self.error.write() = None;
    }

    /// Queries received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.read().clone()
    }
}

impl SourceProvider for MemorySource {
    fn fetch(&self, query: &str, _config: &SourceConfig) -> Result<SourceRowSet, SourceError> {
        self.queries.write().push(query.to_string());

        if let Some(error) = self.error.read().clone() {
            return Err(error);
        }
        if let Some(rows) = self.by_query.read().get(query) {
            return Ok(rows.clone());
        }
        self.default_rows
            .read()
            .clone()
            .ok_or_else(|| SourceError::QueryFailed {
                query: query.to_string(),
                message: "no result configured".into(),
            })
    }
}

/// A paginated, batch-capable record store held in memory.
///
/// Identities are assigned sequentially starting at 1. Failures can be
/// injected per item ([`reject_where`](Self::reject_where)) or per call
/// ([`fail_next_submits`](Self::fail_next_submits),
/// [`fail_next_fetches`](Self::fail_next_fetches)).
#[derive(Debug)]
pub struct MemoryDestination {
    lists: RwLock<HashMap<String, Vec<DestinationRecord>>>,
    next_id: AtomicU64,
    rejections: RwLock<Vec<(String, Canonical, String)>>,
    submit_grace: AtomicUsize,
    failing_submits: AtomicUsize,
    failing_fetches: AtomicUsize,
    submit_calls: AtomicUsize,
    page_calls: AtomicUsize,
}

impl MemoryDestination {
    /// Creates an empty store with no lists.
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            rejections: RwLock::new(Vec::new()),
            submit_grace: AtomicUsize::new(0),
            failing_submits: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        }
    }

    /// Creates an empty list if it does not exist.
    pub fn create_list(&self, list: &str) {
        self.lists.write().entry(list.to_string()).or_default();
    }

    /// Adds a record with a freshly assigned identity.
    pub fn insert(&self, list: &str, fields: FieldMap) -> RecordId {
        let id = self.allocate_id();
        self.insert_record(
            list,
            DestinationRecord {
                id: id.clone(),
                fields,
            },
        );
        id
    }

    /// Adds a record with an explicit identity.
    ///
    /// Numeric identities move the allocator past them.
    pub fn insert_record(&self, list: &str, record: DestinationRecord) {
        if let Ok(n) = record.id.as_str().parse::<u64>() {
            self.next_id.fetch_max(n.saturating_add(1), Ordering::SeqCst);
        }
        self.lists
            .write()
            .entry(list.to_string())
            .or_default()
            .push(record);
    }

    /// Returns all records of a list in storage order.
    pub fn records(&self, list: &str) -> Vec<DestinationRecord> {
        self.lists.read().get(list).cloned().unwrap_or_default()
    }

    /// Rejects any operation touching a record whose `field` equals `value`.
    pub fn reject_where(&self, field: &str, value: impl Into<Value>, reason: impl Into<String>) {
        self.rejections
            .write()
            .push((field.to_string(), value.into().canonical(), reason.into()));
    }

    /// Drops every rejection rule.
    pub fn clear_rejections(&self) {
        self.rejections.write().clear();
    }

    /// Fails the next `n` batch submissions with a transport error.
    pub fn fail_next_submits(&self, n: usize) {
        self.fail_submits_after(0, n);
    }

    /// Lets `succeed` submissions through, then fails the following `fail`.
    pub fn fail_submits_after(&self, succeed: usize, fail: usize) {
        self.submit_grace.store(succeed, Ordering::SeqCst);
        self.failing_submits.store(fail, Ordering::SeqCst);
    }

    /// Fails the next `n` reads with a transport error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    /// Number of `submit_batch` round trips attempted.
    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of pages served.
    pub fn page_count(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    fn allocate_id(&self) -> RecordId {
        RecordId::from(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn rejection_for(&self, fields: &FieldMap) -> Option<String> {
        self.rejections
            .read()
            .iter()
            .find(|(field, value, _)| fields.get(field).map(Value::canonical).as_ref() == Some(value))
            .map(|(_, _, reason)| reason.clone())
    }

    fn fetch_page(
        &self,
        list: &str,
        fields: &FieldSet,
        token: Option<&str>,
        page_size: u32,
    ) -> Result<Page<DestinationRecord>, DestinationError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        let offset = match token {
            None => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| DestinationError::Transport(format!("invalid page token '{raw}'")))?,
        };

        let lists = self.lists.read();
        let records = lists
            .get(list)
            .ok_or_else(|| DestinationError::ListNotFound(list.to_string()))?;

        let end = records.len().min(offset + page_size as usize);
        let items = records[offset.min(end)..end]
            .iter()
            .map(|record| DestinationRecord {
                id: record.id.clone(),
                fields: record
                    .fields
                    .iter()
                    .filter(|(name, _)| fields.all().contains(*name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            })
            .collect();

        if end < records.len() {
            Ok(Page::with_next(items, end.to_string()))
        } else {
            Ok(Page::last(items))
        }
    }

    fn apply_one(
        &self,
        records: &mut Vec<DestinationRecord>,
        operation: &BatchOperation,
    ) -> OperationOutcome {
        match operation {
            BatchOperation::Insert { fields } => {
                if let Some(reason) = self.rejection_for(fields) {
                    return OperationOutcome::rejected(reason);
                }
                let id = self.allocate_id();
                records.push(DestinationRecord {
                    id: id.clone(),
                    fields: fields.clone(),
                });
                OperationOutcome::applied(id)
            }
            BatchOperation::Update { id, fields } => {
                let Some(record) = records.iter_mut().find(|r| &r.id == id) else {
                    return OperationOutcome::rejected(format!("record {id} not found"));
                };
                if let Some(reason) = self
                    .rejection_for(&record.fields)
                    .or_else(|| self.rejection_for(fields))
                {
                    return OperationOutcome::rejected(reason);
                }
                record.fields.extend(fields.clone());
                OperationOutcome::applied(id.clone())
            }
            BatchOperation::Delete { id } => {
                let Some(position) = records.iter().position(|r| &r.id == id) else {
                    return OperationOutcome::rejected(format!("record {id} not found"));
                };
                if let Some(reason) = self.rejection_for(&records[position].fields) {
                    return OperationOutcome::rejected(reason);
                }
                records.remove(position);
                OperationOutcome::applied(id.clone())
            }
        }
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationStore for MemoryDestination {
    fn fetch_all(
        &self,
        list: &str,
        fields: &FieldSet,
        page_size: u32,
    ) -> Result<Vec<DestinationRecord>, DestinationError> {
        if take_failure(&self.failing_fetches) {
            return Err(DestinationError::Transport("injected fetch failure".into()));
        }
        collect_pages(|token| self.fetch_page(list, fields, token, page_size.max(1)))
    }

    fn submit_batch(
        &self,
        list: &str,
        operations: &[BatchOperation],
    ) -> Result<Vec<OperationOutcome>, DestinationError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !take_failure(&self.submit_grace) && take_failure(&self.failing_submits) {
            return Err(DestinationError::Transport("injected submit failure".into()));
        }

        let mut lists = self.lists.write();
        let records = lists
            .get_mut(list)
            .ok_or_else(|| DestinationError::ListNotFound(list.to_string()))?;

        Ok(operations
            .iter()
            .map(|operation| self.apply_one(records, operation))
            .collect())
    }
}
