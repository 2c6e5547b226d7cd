use schemasync_core::{
    CollectingEventSink, FieldSpec, FieldType, NoopEventSink, ReconcileConfig, SchemaTransaction,
    Severity, Value,
};

#[path = "support/fake_backend.rs"]
mod fake_backend;

use fake_backend::{BackendCall, FakeBackend, row};

fn status_enum(values: &[&str]) -> FieldType {
    FieldType::Enum {
        values: values.iter().map(|value| (*value).to_string()).collect(),
    }
}

fn live_items() -> FakeBackend {
    FakeBackend::default().with_table(
        "items",
        vec![
            FieldSpec::new(
                "ID",
                FieldType::Identity {
                    auto_increment: true,
                },
            ),
            FieldSpec::new("status", status_enum(&["A", "B", "C"])).not_null(),
        ],
        Vec::new(),
    )
}

#[test]
fn rows_holding_removed_values_move_before_the_alter_is_queued() {
    let mut backend = live_items();
    backend.set_affected_rows(2);
    let sink = CollectingEventSink::new();

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &sink, ReconcileConfig::default())
            .expect("begin");
        tx.require_field(
            "items",
            "status",
            &"enum('A','B','D') not null default 'A'".into(),
        )
        .expect("narrow status");

        let change = tx.pending().table("items").expect("items altered");
        assert_eq!(
            change.altered_fields["status"].rendered(),
            "enum('A','B','D') not null default 'A'"
        );
        tx.commit().expect("commit");
    }

    assert_eq!(
        backend.statements(),
        &[r#"UPDATE "items" SET "status" = 'A' WHERE "status" IN ('C')"#.to_string()]
    );
    assert_eq!(
        backend.calls(),
        &[BackendCall::AlterTable {
            table: "items".to_string(),
            new_fields: Vec::new(),
            new_indexes: Vec::new(),
            altered_fields: vec!["status".to_string()],
            altered_indexes: Vec::new(),
        }]
    );
    assert_eq!(
        sink.messages_with(Severity::Info),
        vec!["2 rows of items.status moved from removed values [C] to 'A'".to_string()]
    );
}

#[test]
fn nullable_enum_without_default_moves_rows_to_null() {
    let mut backend = live_items();

    {
        let mut tx = SchemaTransaction::begin(
            &mut backend,
            &NoopEventSink,
            ReconcileConfig::default(),
        )
        .expect("begin");
        tx.require_field(
            "items",
            "status",
            &FieldSpec::of(status_enum(&["A"])).into(),
        )
        .expect("narrow status");
        tx.commit().expect("commit");
    }

    assert_eq!(
        backend.statements(),
        &[r#"UPDATE "items" SET "status" = NULL WHERE "status" IN ('B', 'C')"#.to_string()]
    );
}

#[test]
fn not_null_enum_without_default_moves_rows_to_first_value() {
    let mut backend = live_items();

    {
        let mut tx = SchemaTransaction::begin(
            &mut backend,
            &NoopEventSink,
            ReconcileConfig::default(),
        )
        .expect("begin");
        tx.require_field(
            "items",
            "status",
            &FieldSpec::of(status_enum(&["B", "A"])).not_null().into(),
        )
        .expect("narrow status");
        let _ = tx.discard();
    }

    assert_eq!(
        backend.statements(),
        &[r#"UPDATE "items" SET "status" = 'B' WHERE "status" IN ('C')"#.to_string()]
    );
}

#[test]
fn widening_an_enum_touches_no_rows() {
    let mut backend = live_items();

    {
        let mut tx = SchemaTransaction::begin(
            &mut backend,
            &NoopEventSink,
            ReconcileConfig::default(),
        )
        .expect("begin");
        tx.require_field("items", "status", &"enum('A','B','C','D') not null".into())
            .expect("widen status");
        tx.commit().expect("commit");
    }

    assert!(backend.statements().is_empty());
    assert_eq!(backend.calls().len(), 1);
}

#[test]
fn dry_run_counts_affected_rows_instead_of_updating() {
    let mut backend = live_items();
    backend.queue_query_result(vec![row(&[("COUNT(*)", Value::Integer(3))])]);
    let sink = CollectingEventSink::new();

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &sink, ReconcileConfig::dry_run())
            .expect("begin");
        tx.require_field("items", "status", &"enum('A','B') not null".into())
            .expect("narrow status");
        tx.commit().expect("commit");
    }

    assert!(backend.statements().is_empty());
    assert!(backend.calls().is_empty());
    assert_eq!(
        backend.queries(),
        &[r#"SELECT COUNT(*) FROM "items" WHERE "status" IN ('C')"#.to_string()]
    );
    assert_eq!(
        sink.messages_with(Severity::Info),
        vec!["3 rows of items.status hold removed values [C] and would move to 'A'".to_string()]
    );
}
