//! Primary-key index over destination records.

use crate::error::ConfigError;
use rowsync_protocol::{Canonical, DestinationRecord, Value};
use std::collections::HashMap;
use tracing::warn;

/// Reads a destination field, substituting `null_as` for null or absent values.
pub(crate) fn read_destination<'v>(
    record: &'v DestinationRecord,
    field: &str,
    null_as: &'v Value,
) -> &'v Value {
    let value = record.value(field);
    if value.is_null() {
        null_as
    } else {
        value
    }
}

/// Hash index from canonical primary-key value to destination record.
///
/// Built once per sync pass in a single O(n) scan; lookups are O(1).
///
/// When the destination holds several records with the same key, only the
/// first one encountered is indexed. The rest are kept in
/// [`duplicates`](Self::duplicates) and are never matched, so a sync pass
/// neither updates nor (while the key still exists in the source) deletes
/// them.
#[derive(Debug)]
pub struct KeyIndex<'a> {
    entries: HashMap<Canonical, &'a DestinationRecord>,
    duplicates: Vec<&'a DestinationRecord>,
    primary_key: String,
    null_as: Value,
}

impl<'a> KeyIndex<'a> {
    /// Indexes `records` by `primary_key`.
    ///
    /// Null or absent keys are read as `null_as`, mirroring how source nulls
    /// are normalized.
    pub fn build(records: &'a [DestinationRecord], primary_key: &str, null_as: &Value) -> Self {
        let mut entries: HashMap<Canonical, &'a DestinationRecord> =
            HashMap::with_capacity(records.len());
        let mut duplicates = Vec::new();

        for record in records {
            let key = read_destination(record, primary_key, null_as).canonical();
            if let Some(first) = entries.get(&key) {
                warn!(
                    key = %key,
                    kept = %first.id,
                    ignored = %record.id,
                    "duplicate primary key in destination, keeping first record"
                );
                duplicates.push(record);
            } else {
                entries.insert(key, record);
            }
        }

        Self {
            entries,
            duplicates,
            primary_key: primary_key.to_string(),
            null_as: null_as.clone(),
        }
    }

    /// Looks up the record matched to a key value.
    pub fn lookup(&self, key: &Value) -> Option<&'a DestinationRecord> {
        self.get(&key.canonical())
    }

    /// Looks up the record matched to a canonical key.
    pub fn get(&self, key: &Canonical) -> Option<&'a DestinationRecord> {
        self.entries.get(key).copied()
    }

    /// Canonical key of a destination record under this index's rules.
    pub fn key_of(&self, record: &DestinationRecord) -> Canonical {
        read_destination(record, &self.primary_key, &self.null_as).canonical()
    }

    /// Returns true if `record` is the one matched for its key.
    pub fn is_indexed(&self, record: &DestinationRecord) -> bool {
        self.get(&self.key_of(record))
            .is_some_and(|winner| winner.id == record.id)
    }

    /// Records that lost to an earlier record with the same key.
    pub fn duplicates(&self) -> &[&'a DestinationRecord] {
        &self.duplicates
    }

    /// Fails on the first duplicated key.
    pub fn ensure_unique(&self) -> Result<(), ConfigError> {
        let Some(first) = self.duplicates.first() else {
            return Ok(());
        };
        let key = self.key_of(first);
        let count = 1 + self
            .duplicates
            .iter()
            .filter(|record| self.key_of(record) == key)
            .count();
        Err(ConfigError::DuplicateDestinationKey {
            key: key.to_string(),
            count,
        })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no keys are indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsync_protocol::RecordId;

    fn record(id: u64, key: impl Into<Value>) -> DestinationRecord {
        DestinationRecord::new(id).with_field("code", key)
    }

    #[test]
    fn lookup_coerces_key_types() {
        let records = vec![record(1, "10"), record(2, 20)];
        let index = KeyIndex::build(&records, "code", &Value::Null);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(&Value::Integer(10)).unwrap().id, RecordId::from(1u64));
        assert_eq!(index.lookup(&Value::Text("20".into())).unwrap().id, RecordId::from(2u64));
        assert!(index.lookup(&Value::Integer(30)).is_none());
    }

    #[test]
    fn first_duplicate_wins() {
        let records = vec![record(1, 5), record(2, 5), record(3, 6)];
        let index = KeyIndex::build(&records, "code", &Value::Null);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(&Value::Integer(5)).unwrap().id, RecordId::from(1u64));
        assert_eq!(index.duplicates().len(), 1);
        assert_eq!(index.duplicates()[0].id, RecordId::from(2u64));
        assert!(index.is_indexed(&records[0]));
        assert!(!index.is_indexed(&records[1]));
    }

    #[test]
    fn ensure_unique_reports_key_and_count() {
        let records = vec![record(1, 5), record(2, 5), record(3, 5)];
        let index = KeyIndex::build(&records, "code", &Value::Null);
        assert_eq!(
            index.ensure_unique(),
            Err(ConfigError::DuplicateDestinationKey {
                key: "5".into(),
                count: 3,
            })
        );

        let records = vec![record(1, 5)];
        assert!(KeyIndex::build(&records, "code", &Value::Null)
            .ensure_unique()
            .is_ok());
    }

    #[test]
    fn absent_key_reads_as_sentinel() {
        let records = vec![DestinationRecord::new(1u64)];
        let sentinel = Value::Text(String::new());
        let index = KeyIndex::build(&records, "code", &sentinel);

        assert!(index.lookup(&sentinel).is_some());
        assert!(index.lookup(&Value::Null).is_none());
    }

    #[test]
    fn empty_index() {
        let index = KeyIndex::build(&[], "code", &Value::Null);
        assert!(index.is_empty());
        assert!(index.ensure_unique().is_ok());
    }
}
