//! Diff engine: classifies source rows and destination records.
//!
//! A diff is computed in two passes over data that is already in memory:
//!
//! 1. **Delete pass**: every destination record whose key is absent from the
//!    source key set is scheduled for deletion.
//! 2. **Insert/update pass**: every source row is looked up in the
//!    [`KeyIndex`]. Unmatched rows are inserted; matched rows are compared
//!    field by field over the projected surface and rewritten in full if any
//!    field differs.
//!
//! Both passes are O(n). Nothing here touches the destination; the result
//! is plain data handed to the batch applier.

use crate::error::ConfigError;
use crate::index::{read_destination, KeyIndex};
use crate::schema::FieldSet;
use rowsync_protocol::{Canonical, DestinationRecord, FieldMap, RecordId, SourceRow, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A source row with no destination counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInsert {
    /// Primary-key value.
    pub key: Value,
    /// Projected fields to write.
    pub fields: FieldMap,
}

/// A source row whose matched record differs.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    /// Identity of the matched record.
    pub id: RecordId,
    /// Primary-key value.
    pub key: Value,
    /// Full projected fields to write.
    pub fields: FieldMap,
    /// Names of the fields that differed.
    pub changed: Vec<String>,
}

/// A destination record with no source counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelete {
    /// Identity of the record.
    pub id: RecordId,
    /// Primary-key value as stored in the destination.
    pub key: Value,
}

/// The three disjoint operation sets plus bookkeeping.
///
/// Every source row is counted exactly once across `to_insert`,
/// `to_update` and `unchanged`. Every destination record is counted exactly
/// once across `to_delete` and `matched`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Records to delete.
    pub to_delete: Vec<PendingDelete>,
    /// Rows to insert.
    pub to_insert: Vec<PendingInsert>,
    /// Rows to rewrite.
    pub to_update: Vec<PendingUpdate>,
    /// Source rows already equal to their matched record.
    pub unchanged: usize,
    /// Destination records whose key exists in the source.
    pub matched: usize,
    /// Matched records that lost to an earlier duplicate and were skipped.
    pub shadowed: Vec<RecordId>,
}

impl DiffResult {
    /// Returns true if nothing needs to be written.
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_insert.is_empty() && self.to_update.is_empty()
    }

    /// Total number of write operations.
    pub fn operation_count(&self) -> usize {
        self.to_delete.len() + self.to_insert.len() + self.to_update.len()
    }
}

/// Computes a [`DiffResult`] over a projected field set.
///
/// Values are compared in canonical form. Destination nulls and absent
/// fields read as the null sentinel, so a record written from a normalized
/// row compares equal to that row on the next pass.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine<'f> {
    fields: &'f FieldSet,
    null_as: &'f Value,
}

impl<'f> DiffEngine<'f> {
    /// Creates a diff engine.
    pub fn new(fields: &'f FieldSet, null_as: &'f Value) -> Self {
        Self { fields, null_as }
    }

    /// Fails on the first primary key shared by more than one source row.
    pub fn ensure_unique_source_keys(&self, rows: &[SourceRow]) -> Result<(), ConfigError> {
        let primary_key = self.fields.primary_key();
        let mut counts: HashMap<Canonical, usize> = HashMap::with_capacity(rows.len());
        let mut first_duplicate = None;
        for row in rows {
            let key = row.value(primary_key).canonical();
            let count = counts.entry(key.clone()).or_insert(0);
            *count += 1;
            if *count == 2 && first_duplicate.is_none() {
                first_duplicate = Some(key);
            }
        }

        match first_duplicate {
            None => Ok(()),
            Some(key) => Err(ConfigError::DuplicateSourceKey {
                count: counts[&key],
                key: key.to_string(),
            }),
        }
    }

    /// Classifies normalized source rows against destination records.
    ///
    /// `index` must have been built from `records` with the same primary key
    /// and sentinel.
    pub fn diff(
        &self,
        rows: &[SourceRow],
        records: &[DestinationRecord],
        index: &KeyIndex<'_>,
    ) -> DiffResult {
        let primary_key = self.fields.primary_key();
        let mut result = DiffResult::default();

        let mut source_keys: HashSet<Canonical> = HashSet::with_capacity(rows.len());
        for row in rows {
            let key = row.value(primary_key).canonical();
            if source_keys.contains(&key) {
                warn!(key = %key, "duplicate primary key in source");
            } else {
                source_keys.insert(key);
            }
        }

        for record in records {
            if source_keys.contains(&index.key_of(record)) {
                result.matched += 1;
                if !index.is_indexed(record) {
                    result.shadowed.push(record.id.clone());
                }
            } else {
                result.to_delete.push(PendingDelete {
                    id: record.id.clone(),
                    key: read_destination(record, primary_key, self.null_as).clone(),
                });
            }
        }

        for row in rows {
            let key = row.value(primary_key);
            match index.lookup(key) {
                None => result.to_insert.push(PendingInsert {
                    key: key.clone(),
                    fields: self.fields.project_row(row),
                }),
                Some(record) => {
                    let changed = self.changed_fields(row, record);
                    if changed.is_empty() {
                        result.unchanged += 1;
                    } else {
                        debug!(key = %key, changed = ?changed, "row differs from destination");
                        result.to_update.push(PendingUpdate {
                            id: record.id.clone(),
                            key: key.clone(),
                            fields: self.fields.project_row(row),
                            changed,
                        });
                    }
                }
            }
        }

        result
    }

    /// Names of projected fields whose canonical values differ.
    pub fn changed_fields(&self, row: &SourceRow, record: &DestinationRecord) -> Vec<String> {
        self.fields
            .projected()
            .iter()
            .filter(|name| {
                let theirs = read_destination(record, name, self.null_as);
                row.value(name).canonical() != theirs.canonical()
            })
            .cloned()
            .collect()
    }
}
