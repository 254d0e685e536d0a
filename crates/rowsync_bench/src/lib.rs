//! Benchmark utilities.

use rand::Rng;
use rowsync_engine::FieldSet;
use rowsync_protocol::{DestinationRecord, SourceRow, SourceRowSet, Value};

/// Columns of every generated row.
pub const COLUMNS: [&str; 4] = ["id", "name", "email", "score"];

/// Generate a random lowercase word.
pub fn random_word(rng: &mut impl Rng, len: usize) -> String {
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Generate a source row set with keys `0..count`.
pub fn generate_rows(count: usize) -> SourceRowSet {
    let mut rng = rand::thread_rng();
    (0..count as i64).fold(SourceRowSet::new(COLUMNS), |set, id| {
        let name = random_word(&mut rng, 8);
        set.with_row(
            SourceRow::new()
                .with("id", id)
                .with("email", format!("{name}@example.com"))
                .with("name", name)
                .with("score", rng.gen_range(0..1000i64)),
        )
    })
}

/// Mirror `rows` as destination records, rewriting `changed` of them
/// (spread evenly) and storing keys as text.
pub fn mirror(rows: &SourceRowSet, changed: usize) -> Vec<DestinationRecord> {
    let stride = (changed > 0).then(|| (rows.len() / changed).max(1));
    rows.rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut record = DestinationRecord::new(i as u64 + 1);
            for column in COLUMNS {
                record = record.with_field(column, row.value(column).clone());
            }
            record = record.with_field("id", row.value("id").to_string());
            if stride.is_some_and(|n| i % n == 0) {
                record = record.with_field("score", Value::Integer(-1));
            }
            record
        })
        .collect()
}

/// The field set for generated rows.
pub fn field_set() -> FieldSet {
    let columns: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    FieldSet::project(&columns, "id", "ID").expect("generated columns include the key")
}
