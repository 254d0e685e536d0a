//! End-to-end sync passes against the in-memory collaborators.

use rowsync_engine::{
    ConfigError, DestinationConfig, DestinationError, DuplicateKeyPolicy, MappingConfig,
    MemoryDestination, MemorySource, Phase, RecordingObserver, Reconciler, SourceConfig,
    SyncError, SyncState, SyncSummary,
};
use rowsync_protocol::{FieldMap, OperationKind, SourceRow, SourceRowSet, Value};
use std::sync::Arc;

const LIST: &str = "People";

fn person(id: impl Into<Value>, name: impl Into<Value>) -> SourceRow {
    SourceRow::from_pairs([("id", id.into()), ("name", name.into())])
}

fn people(rows: Vec<SourceRow>) -> SourceRowSet {
    rows.into_iter()
        .fold(SourceRowSet::new(["id", "name"]), SourceRowSet::with_row)
}

fn record(id: impl Into<Value>, name: impl Into<Value>) -> FieldMap {
    person(id, name).into_fields()
}

fn mapping() -> MappingConfig {
    MappingConfig::new("people", "select id, name from people", LIST, "id")
}

/// A reconciler over an empty destination list.
fn setup(source: Vec<SourceRow>) -> Reconciler<MemorySource, MemoryDestination> {
    let destination = MemoryDestination::new();
    destination.create_list(LIST);
    Reconciler::new(MemorySource::new(people(source)), destination)
}

fn sync(reconciler: &Reconciler<MemorySource, MemoryDestination>) -> SyncSummary {
    sync_with(reconciler, &DestinationConfig::default(), &mapping())
}

fn sync_with(
    reconciler: &Reconciler<MemorySource, MemoryDestination>,
    destination: &DestinationConfig,
    mapping: &MappingConfig,
) -> SyncSummary {
    reconciler
        .sync(&SourceConfig::new("memory"), destination, mapping)
        .expect("sync should succeed")
}

fn counts(summary: &SyncSummary) -> (usize, usize, usize) {
    (summary.added, summary.updated, summary.deleted)
}

fn names(reconciler: &Reconciler<MemorySource, MemoryDestination>) -> Vec<(Value, Value)> {
    let mut names: Vec<(Value, Value)> = reconciler
        .destination()
        .records(LIST)
        .into_iter()
        .map(|r| (r.value("id").clone(), r.value("name").clone()))
        .collect();
    names.sort_by_key(|(id, _)| id.canonical());
    names
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn empty_destination_gets_every_row() {
    let reconciler = setup(vec![person(1, "A"), person(2, "B")]);

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (2, 0, 0));
    assert_eq!(summary.source_row_count, 2);
    assert_eq!(summary.destination_row_count_before, 0);
    assert_eq!(
        names(&reconciler),
        vec![
            (Value::Integer(1), Value::from("A")),
            (Value::Integer(2), Value::from("B")),
        ]
    );
}

#[test]
fn row_missing_from_source_is_deleted() {
    let reconciler = setup(vec![person(1, "A")]);
    reconciler.destination().insert(LIST, record(1, "A"));
    reconciler.destination().insert(LIST, record(2, "B"));

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 0, 1));
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.destination_row_count_before, 2);
    assert_eq!(names(&reconciler), vec![(Value::Integer(1), Value::from("A"))]);
}

#[test]
fn changed_row_is_updated() {
    let reconciler = setup(vec![person(1, "Z")]);
    let id = reconciler.destination().insert(LIST, record(1, "A"));

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 1, 0));

    let records = reconciler.destination().records(LIST);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].value("name"), &Value::from("Z"));
}

#[test]
fn empty_source_clears_destination() {
    let reconciler = setup(Vec::new());
    reconciler.destination().insert(LIST, record(1, "A"));
    reconciler.destination().insert(LIST, record(2, "B"));

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 0, 2));
    assert!(reconciler.destination().records(LIST).is_empty());
}

#[test]
fn mixed_pass_uses_two_round_trips() {
    let reconciler = setup(vec![person(1, "A"), person(2, "changed"), person(4, "D")]);
    reconciler.destination().insert(LIST, record(1, "A"));
    reconciler.destination().insert(LIST, record(2, "B"));
    reconciler.destination().insert(LIST, record(3, "C"));

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (1, 1, 1));
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.round_trips, 2);
    assert_eq!(reconciler.destination().submit_count(), 2);
}

// ============================================================================
// Idempotence and normalization
// ============================================================================

#[test]
fn second_pass_writes_nothing() {
    let reconciler = setup(vec![person(1, "A"), person(2, "B"), person(3, Value::Null)]);
    reconciler.destination().insert(LIST, record(2, "old"));
    reconciler.destination().insert(LIST, record(9, "gone"));

    let first = sync(&reconciler);
    assert_eq!(counts(&first), (2, 1, 1));

    let submits = reconciler.destination().submit_count();
    let second = sync(&reconciler);
    assert_eq!(counts(&second), (0, 0, 0));
    assert_eq!(second.unchanged, 3);
    assert_eq!(reconciler.destination().submit_count(), submits);
}

#[test]
fn nulls_use_the_sentinel() {
    let reconciler = setup(vec![person(1, Value::Null)]);
    let mapping = mapping().with_null_sentinel("");

    let first = sync_with(&reconciler, &DestinationConfig::default(), &mapping);
    assert_eq!(first.added, 1);
    assert_eq!(
        reconciler.destination().records(LIST)[0].value("name"),
        &Value::from("")
    );

    let second = sync_with(&reconciler, &DestinationConfig::default(), &mapping);
    assert_eq!(counts(&second), (0, 0, 0));
}

#[test]
fn destination_null_matches_sentinel() {
    let reconciler = setup(vec![person(1, Value::Null)]);
    let mut fields = FieldMap::new();
    fields.insert("id".into(), Value::Integer(1));
    reconciler.destination().insert(LIST, fields);

    let mapping = mapping().with_null_sentinel("");
    let summary = sync_with(&reconciler, &DestinationConfig::default(), &mapping);
    assert_eq!(counts(&summary), (0, 0, 0));
}

#[test]
fn keys_and_fields_compare_after_coercion() {
    let reconciler = setup(vec![person("1", "A"), person(2.0, 10), person(3, "x")]);
    reconciler.destination().insert(LIST, record(1, "A"));
    reconciler.destination().insert(LIST, record("2", "10"));
    reconciler.destination().insert(LIST, record("3.0", "x"));

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 0, 0));
    assert_eq!(summary.unchanged, 3);
}

#[test]
fn new_source_column_updates_existing_records() {
    let source = SourceRowSet::new(["id", "name", "email"])
        .with_row(person(1, "A").with("email", "a@example.com"));
    let destination = MemoryDestination::new();
    destination.insert(LIST, record(1, "A"));
    let reconciler = Reconciler::new(MemorySource::new(source), destination);

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 1, 0));
    assert_eq!(
        reconciler.destination().records(LIST)[0].value("email"),
        &Value::from("a@example.com")
    );
}

#[test]
fn update_leaves_unmapped_columns_alone() {
    let reconciler = setup(vec![person(1, "Z")]);
    let mut owned = record(1, "A");
    owned.insert("owner".into(), Value::from("alice"));
    reconciler.destination().insert(LIST, owned);

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 1, 0));

    let records = reconciler.destination().records(LIST);
    assert_eq!(records[0].value("name"), &Value::from("Z"));
    assert_eq!(records[0].value("owner"), &Value::from("alice"));
    assert_eq!(counts(&sync(&reconciler)), (0, 0, 0));
}

#[test]
fn identity_column_in_source_is_not_written() {
    let source = SourceRowSet::new(["ID", "id", "name"])
        .with_row(person(1, "A").with("ID", "bogus"));
    let destination = MemoryDestination::new();
    destination.create_list(LIST);
    let reconciler = Reconciler::new(MemorySource::new(source), destination);

    sync(&reconciler);
    let records = reconciler.destination().records(LIST);
    assert!(records[0].fields.get("ID").is_none());
}

// ============================================================================
// Duplicate destination keys
// ============================================================================

fn with_duplicates() -> Reconciler<MemorySource, MemoryDestination> {
    let reconciler = setup(vec![person(5, "new"), person(6, "F")]);
    reconciler.destination().insert(LIST, record(5, "first"));
    reconciler.destination().insert(LIST, record(5, "second"));
    reconciler.destination().insert(LIST, record(6, "F"));
    reconciler
}

#[test]
fn only_first_duplicate_is_matched() {
    let reconciler = with_duplicates();

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 1, 0));
    assert_eq!(summary.shadowed, 1);

    let records = reconciler.destination().records(LIST);
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].value("name"), &Value::from("new"));
    assert_eq!(records[1].value("name"), &Value::from("second"));

    let again = sync(&reconciler);
    assert_eq!(counts(&again), (0, 0, 0));
    assert_eq!(again.shadowed, 1);
}

#[test]
fn duplicates_of_removed_key_are_all_deleted() {
    let reconciler = with_duplicates();
    reconciler
        .source()
        .set_rows(people(vec![person(6, "F")]));

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (0, 0, 2));
    assert_eq!(names(&reconciler), vec![(Value::Integer(6), Value::from("F"))]);
}

#[test]
fn fail_policy_aborts_on_duplicates() {
    let reconciler = with_duplicates();
    let mapping = mapping().with_duplicate_keys(DuplicateKeyPolicy::Fail);

    let err = reconciler
        .sync(&SourceConfig::default(), &DestinationConfig::default(), &mapping)
        .unwrap_err();
    match err {
        SyncError::Config {
            mapping,
            phase,
            source: ConfigError::DuplicateDestinationKey { key, count },
        } => {
            assert_eq!(mapping, "people");
            assert_eq!(phase, Phase::BuildIndex);
            assert_eq!(key, "5");
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(reconciler.destination().submit_count(), 0);
}

// ============================================================================
// Duplicate source keys
// ============================================================================

#[test]
fn duplicate_source_keys_do_not_converge() {
    let reconciler = setup(vec![person(1, "A"), person(1, "B")]);

    let first = sync(&reconciler);
    assert_eq!(counts(&first), (2, 0, 0));

    let second = sync(&reconciler);
    assert_eq!(counts(&second), (0, 1, 0));
    assert_eq!(second.shadowed, 1);
}

#[test]
fn fail_policy_aborts_on_duplicate_source_keys() {
    let reconciler = setup(vec![person(1, "A"), person(2, "B"), person(1, "C")]);
    let mapping = mapping().with_duplicate_keys(DuplicateKeyPolicy::Fail);

    let err = reconciler
        .sync(&SourceConfig::default(), &DestinationConfig::default(), &mapping)
        .unwrap_err();
    match err {
        SyncError::Config {
            phase,
            source: ConfigError::DuplicateSourceKey { key, count },
            ..
        } => {
            assert_eq!(phase, Phase::Diff);
            assert_eq!(key, "1");
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(reconciler.destination().submit_count(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn rejected_items_do_not_abort_the_mapping() {
    let reconciler = setup(vec![person(1, "A"), person(2, "B"), person(3, "C")]);
    reconciler.destination().reject_where("id", 2, "item is locked");

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (2, 0, 0));
    assert!(summary.has_failures());
    assert_eq!(summary.failures.len(), 1);

    let failure = &summary.failures[0];
    assert_eq!(failure.kind, OperationKind::Insert);
    assert_eq!(failure.key, Value::Integer(2));
    assert_eq!(failure.reason, "item is locked");
    assert_eq!(reconciler.stats().item_failures, 1);
}

#[test]
fn rejected_insert_is_retried_on_next_pass() {
    let reconciler = setup(vec![person(1, "A"), person(2, "B")]);
    reconciler.destination().reject_where("id", 2, "item is locked");
    let first = sync(&reconciler);
    assert_eq!(first.added, 1);

    reconciler.destination().clear_rejections();
    let second = sync(&reconciler);
    assert_eq!(counts(&second), (1, 0, 0));
    assert_eq!(second.unchanged, 1);
}

#[test]
fn source_failure_aborts_before_destination() {
    let reconciler = setup(vec![person(1, "A")]);
    reconciler
        .source()
        .fail_with(rowsync_engine::SourceError::Unavailable("timeout".into()));

    let err = reconciler
        .sync(&SourceConfig::default(), &DestinationConfig::default(), &mapping())
        .unwrap_err();
    assert_eq!(err.mapping(), Some("people"));
    assert_eq!(err.phase(), Some(Phase::FetchSource));
    assert_eq!(reconciler.destination().page_count(), 0);
}

#[test]
fn unknown_list_fails_fetch() {
    let reconciler = setup(vec![person(1, "A")]);
    let mapping = MappingConfig::new("orders", "q", "Orders", "id");

    let err = reconciler
        .sync(&SourceConfig::default(), &DestinationConfig::default(), &mapping)
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Destination {
            phase: Phase::FetchDestination,
            source: DestinationError::ListNotFound(_),
            ..
        }
    ));
}

#[test]
fn transport_failure_during_apply_names_the_phase() {
    let reconciler = setup(vec![person(1, "A")]);
    reconciler.destination().insert(LIST, record(2, "B"));
    reconciler.destination().fail_next_submits(1);

    let err = reconciler
        .sync(&SourceConfig::default(), &DestinationConfig::default(), &mapping())
        .unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Apply));
    assert_eq!(
        err.to_string(),
        "mapping 'people' failed during apply: transport error: injected submit failure"
    );
    assert_eq!(reconciler.state(), SyncState::Idle);

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (1, 0, 1));
}

#[test]
fn partial_apply_is_visible_after_transport_failure() {
    let reconciler = setup(vec![person(1, "A")]);
    reconciler.destination().insert(LIST, record(2, "B"));
    reconciler.destination().fail_submits_after(1, 1);

    let err = reconciler
        .sync(&SourceConfig::default(), &DestinationConfig::default(), &mapping())
        .unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Apply));

    // Deletes landed before the insert batch failed.
    assert!(reconciler.destination().records(LIST).is_empty());
    let applied = err.applied().expect("apply failure carries what landed");
    assert_eq!((applied.added, applied.updated, applied.deleted), (0, 0, 1));
    assert_eq!(applied.round_trips, 1);

    let stats = reconciler.stats();
    assert_eq!(stats.passes_failed, 1);
    assert_eq!(stats.rows_deleted, 1);

    let summary = sync(&reconciler);
    assert_eq!(counts(&summary), (1, 0, 0));
}

// ============================================================================
// Paging, batching, progress
// ============================================================================

#[test]
fn destination_is_read_page_by_page() {
    let reconciler = setup((0..5).map(|i| person(i, "x")).collect());
    for i in 0..5 {
        reconciler.destination().insert(LIST, record(i, "x"));
    }

    let config = DestinationConfig::default().with_page_size(2);
    let summary = sync_with(&reconciler, &config, &mapping());
    assert_eq!(summary.destination_row_count_before, 5);
    assert_eq!(summary.unchanged, 5);
    assert_eq!(reconciler.destination().page_count(), 3);
}

#[test]
fn max_batch_size_splits_each_phase() {
    let reconciler = setup((0..5).map(|i| person(i, "x")).collect());
    for i in 10..13 {
        reconciler.destination().insert(LIST, record(i, "old"));
    }

    let config = DestinationConfig::default().with_max_batch_size(2);
    let summary = sync_with(&reconciler, &config, &mapping());
    assert_eq!(counts(&summary), (5, 0, 3));
    // 3 deletes in 2 batches, 5 inserts in 3 batches.
    assert_eq!(summary.round_trips, 5);
    assert_eq!(reconciler.destination().submit_count(), 5);
}

#[test]
fn progress_lines_follow_apply_order() {
    let observer = Arc::new(RecordingObserver::new());
    let reconciler = setup(vec![person(1, "Z"), person(3, "C")]).with_observer(observer.clone());
    reconciler.destination().insert(LIST, record(1, "A"));
    reconciler.destination().insert(LIST, record(2, "B"));

    sync(&reconciler);
    assert_eq!(
        observer.lines(),
        vec![
            "Deleted: 2".to_string(),
            "Added: 3".to_string(),
            "Updated: 1".to_string(),
        ]
    );
    assert!(observer.events().iter().all(|e| e.mapping == "people"));
}

#[test]
fn mappings_run_independently() {
    let reconciler = setup(Vec::new());
    reconciler.destination().create_list("Teams");
    reconciler
        .source()
        .set_query("people", people(vec![person(1, "A")]));
    reconciler.source().set_query(
        "teams",
        SourceRowSet::new(["code", "title"])
            .with_row(SourceRow::from_pairs([("code", "red"), ("title", "Red")])),
    );

    let people_mapping = MappingConfig::new("people", "people", LIST, "id");
    let teams_mapping = MappingConfig::new("teams", "teams", "Teams", "code");

    let first = sync_with(&reconciler, &DestinationConfig::default(), &people_mapping);
    let second = sync_with(&reconciler, &DestinationConfig::default(), &teams_mapping);
    assert_eq!(first.added, 1);
    assert_eq!(second.added, 1);
    assert_eq!(reconciler.destination().records("Teams").len(), 1);

    let stats = reconciler.stats();
    assert_eq!(stats.passes_completed, 2);
    assert_eq!(stats.rows_added, 2);
}
