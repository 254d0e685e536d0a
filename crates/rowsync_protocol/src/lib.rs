//! # rowsync Protocol
//!
//! Record and mutation types shared by the reconciliation engine and the
//! collaborators it talks to.
//!
//! This crate provides:
//! - `SourceRow` / `SourceRowSet` for rows read from the source
//! - `DestinationRecord` and its opaque `RecordId`
//! - `BatchOperation` and `OperationOutcome` for batch submission
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod operation;
mod record;

pub use operation::{BatchOperation, OperationKind, OperationOutcome};
pub use record::{DestinationRecord, FieldMap, RecordId, SourceRow, SourceRowSet};
pub use rowsync_value::{Canonical, Value};
