//! Collaborator interfaces for the source and the destination.

use crate::config::SourceConfig;
use crate::error::{DestinationError, SourceError};
use crate::schema::FieldSet;
use rowsync_protocol::{BatchOperation, DestinationRecord, OperationOutcome, SourceRowSet};

/// Runs source queries.
///
/// This trait abstracts the source system (a SQL database, a file, a mock
/// for testing). The call is blocking and returns the complete result.
pub trait SourceProvider: Send + Sync {
    /// Executes `query` and returns every row along with the column names.
    ///
    /// Column names must be reported even when there are no rows.
    fn fetch(&self, query: &str, config: &SourceConfig) -> Result<SourceRowSet, SourceError>;
}

/// Reads and mutates the destination record store.
pub trait DestinationStore: Send + Sync {
    /// Reads every record of `list`, restricted to `fields`.
    ///
    /// Pagination is the store's concern; `page_size` is a hint for how
    /// many records to request per round trip.
    fn fetch_all(
        &self,
        list: &str,
        fields: &FieldSet,
        page_size: u32,
    ) -> Result<Vec<DestinationRecord>, DestinationError>;

    /// Submits one batch in a single round trip.
    ///
    /// Returns one outcome per operation, in order. A rejected item is an
    /// outcome, not an error; `Err` means the whole batch failed in transit.
    fn submit_batch(
        &self,
        list: &str,
        operations: &[BatchOperation],
    ) -> Result<Vec<OperationOutcome>, DestinationError>;
}

/// One page of a paginated read.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Token for the next page, if there is one.
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// Creates the final page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Creates a page followed by another.
    pub fn with_next(items: Vec<T>, next: impl Into<String>) -> Self {
        Self {
            items,
            next: Some(next.into()),
        }
    }
}

/// Drains a token-paginated read into a single vector.
///
/// `fetch_page` is called with `None` first, then with each returned token
/// until a page has no successor.
pub fn collect_pages<T, E, F>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = fetch_page(token.as_deref())?;
        items.extend(page.items);

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(items)
}
