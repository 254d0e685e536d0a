//! Batch mutation operations.

use crate::record::{FieldMap, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A new record is created.
    Insert,
    /// An existing record is rewritten.
    Update,
    /// An existing record is removed.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        })
    }
}

/// A single mutation submitted to the destination as part of a batch.
///
/// Inserts and updates always carry the full projected field set; there is
/// no partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BatchOperation {
    /// Create a record with these fields.
    Insert {
        /// Projected fields.
        fields: FieldMap,
    },
    /// Overwrite these fields on an existing record. Fields it does not
    /// carry keep their stored values.
    Update {
        /// Target identity.
        id: RecordId,
        /// Projected fields.
        fields: FieldMap,
    },
    /// Remove a record.
    Delete {
        /// Target identity.
        id: RecordId,
    },
}

impl BatchOperation {
    /// Creates an insert operation.
    pub fn insert(fields: FieldMap) -> Self {
        BatchOperation::Insert { fields }
    }

    /// Creates an update operation.
    pub fn update(id: RecordId, fields: FieldMap) -> Self {
        BatchOperation::Update { id, fields }
    }

    /// Creates a delete operation.
    pub fn delete(id: RecordId) -> Self {
        BatchOperation::Delete { id }
    }

    /// Returns the operation kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            BatchOperation::Insert { .. } => OperationKind::Insert,
            BatchOperation::Update { .. } => OperationKind::Update,
            BatchOperation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Returns the target identity, if the record already exists.
    pub fn id(&self) -> Option<&RecordId> {
        match self {
            BatchOperation::Insert { .. } => None,
            BatchOperation::Update { id, .. } | BatchOperation::Delete { id } => Some(id),
        }
    }

    /// Returns the payload, if the operation carries one.
    pub fn fields(&self) -> Option<&FieldMap> {
        match self {
            BatchOperation::Insert { fields } | BatchOperation::Update { fields, .. } => {
                Some(fields)
            }
            BatchOperation::Delete { .. } => None,
        }
    }
}

/// Per-operation result reported by the destination.
///
/// Outcomes are positionally aligned with the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OperationOutcome {
    /// The operation took effect.
    Applied {
        /// Identity of the affected (or newly created) record.
        id: RecordId,
    },
    /// The destination refused this operation.
    Rejected {
        /// Reason given by the destination.
        reason: String,
    },
}

impl OperationOutcome {
    /// Creates an applied outcome.
    pub fn applied(id: impl Into<RecordId>) -> Self {
        OperationOutcome::Applied { id: id.into() }
    }

    /// Creates a rejected outcome.
    pub fn rejected(reason: impl Into<String>) -> Self {
        OperationOutcome::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns true if the operation took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, OperationOutcome::Applied { .. })
    }
}
