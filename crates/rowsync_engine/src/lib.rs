//! # rowsync engine
//!
//! One-way reconciliation of a destination record list with a source query.
//!
//! This crate provides:
//! - Row normalization and schema projection
//! - A primary-key hash index over destination records
//! - A two-pass diff producing insert, update and delete sets
//! - A batch applier with per-item failure collection
//! - A sequential orchestrator with a state machine and per-mapping summary
//! - In-memory source and destination for testing
//!
//! ## Architecture
//!
//! A sync pass for one mapping runs these steps in order:
//! 1. Fetch and normalize every source row
//! 2. Fetch every destination record, restricted to the projected fields
//! 3. Index destination records by canonical primary key
//! 4. Diff
//! 5. Submit deletes, then inserts and updates
//! 6. Report
//!
//! ## Key Invariants
//!
//! - The source is authoritative; the destination is never read back into it
//! - Values are compared in canonical form, never by display text
//! - The identity field is never compared and never written
//! - A sync with no source changes since the last one writes nothing

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod config;
mod diff;
mod error;
mod index;
mod memory;
mod normalize;
mod observer;
mod schema;
mod state;
mod transport;

pub use apply::{ApplyFailure, ApplyReport, BatchApplier};
pub use config::{
    DestinationConfig, DuplicateKeyPolicy, MappingConfig, SourceConfig, DEFAULT_IDENTITY_FIELD,
    DEFAULT_PAGE_SIZE,
};
pub use diff::{DiffEngine, DiffResult, PendingDelete, PendingInsert, PendingUpdate};
pub use error::{
    ConfigError, DestinationError, ItemApplyError, Phase, SourceError, SyncError, SyncResult,
};
pub use index::KeyIndex;
pub use memory::{MemoryDestination, MemorySource};
pub use normalize::RowNormalizer;
pub use observer::{
    NoopObserver, ProgressAction, ProgressEvent, RecordingObserver, SyncObserver, TracingObserver,
    WriterObserver,
};
pub use schema::FieldSet;
pub use state::{Reconciler, ReconcilerStats, SyncState, SyncSummary};
pub use transport::{collect_pages, DestinationStore, Page, SourceProvider};
