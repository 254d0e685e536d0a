//! Source row normalization.

use rowsync_protocol::{FieldMap, SourceRow, SourceRowSet, Value};

/// Replaces database nulls with a configured sentinel.
///
/// Every column of the result schema is present in a normalized row; a
/// column the source left out is filled with the sentinel too.
#[derive(Debug, Clone, Default)]
pub struct RowNormalizer {
    sentinel: Value,
}

impl RowNormalizer {
    /// Creates a normalizer with the given sentinel.
    pub fn new(sentinel: Value) -> Self {
        Self { sentinel }
    }

    /// The value substituted for nulls.
    pub fn sentinel(&self) -> &Value {
        &self.sentinel
    }

    /// Normalizes a single row against the result schema.
    pub fn normalize(&self, row: SourceRow, columns: &[String]) -> SourceRow {
        let mut fields: FieldMap = row.into_fields();
        for value in fields.values_mut() {
            if value.is_null() {
                *value = self.sentinel.clone();
            }
        }
        for column in columns {
            if !fields.contains_key(column) {
                fields.insert(column.clone(), self.sentinel.clone());
            }
        }
        SourceRow::from(fields)
    }

    /// Normalizes every row of a result set.
    pub fn normalize_set(&self, set: SourceRowSet) -> SourceRowSet {
        let SourceRowSet { columns, rows } = set;
        let rows = rows
            .into_iter()
            .map(|row| self.normalize(row, &columns))
            .collect();
        SourceRowSet { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["id".into(), "name".into(), "note".into()]
    }

    #[test]
    fn nulls_become_sentinel() {
        let normalizer = RowNormalizer::new(Value::Text(String::new()));
        let row = SourceRow::from_pairs([("id", Value::Integer(1)), ("name", Value::Null)]);

        let row = normalizer.normalize(row, &columns());
        assert_eq!(row.value("id"), &Value::Integer(1));
        assert_eq!(row.value("name"), &Value::Text(String::new()));
        assert_eq!(row.get("note"), Some(&Value::Text(String::new())));
    }

    #[test]
    fn default_sentinel_is_null() {
        let normalizer = RowNormalizer::default();
        assert!(normalizer.sentinel().is_null());

        let row = normalizer.normalize(SourceRow::from_pairs([("id", 1)]), &columns());
        assert_eq!(row.len(), 3);
        assert!(row.value("name").is_null());
    }

    #[test]
    fn non_null_values_untouched() {
        let normalizer = RowNormalizer::new(Value::Text("n/a".into()));
        let row = SourceRow::from_pairs([
            ("id", Value::Integer(1)),
            ("name", Value::Text("A".into())),
            ("note", Value::Bool(false)),
        ]);

        let normalized = normalizer.normalize(row.clone(), &columns());
        assert_eq!(normalized, row);
    }

    #[test]
    fn set_keeps_schema() {
        let normalizer = RowNormalizer::new(Value::Integer(0));
        let set = SourceRowSet::new(columns()).with_row(SourceRow::from_pairs([("id", 1)]));

        let set = normalizer.normalize_set(set);
        assert_eq!(set.columns, columns());
        assert_eq!(set.rows[0].value("note"), &Value::Integer(0));
    }
}
