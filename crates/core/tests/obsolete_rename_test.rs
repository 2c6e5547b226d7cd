use schemasync_core::{
    CollectingEventSink, FieldSpec, FieldType, NoopEventSink, ObsoletePolicy, ObsoleteRename,
    ReconcileConfig, SchemaTransaction, Severity, TableSpec,
};

#[path = "support/fake_backend.rs"]
mod fake_backend;

use fake_backend::{BackendCall, FakeBackend};

fn identity() -> FieldSpec {
    FieldSpec::new(
        "ID",
        FieldType::Identity {
            auto_increment: true,
        },
    )
}

#[test]
fn table_is_renamed_to_the_first_free_obsolete_name() {
    let mut backend = FakeBackend::default()
        .with_table("legacy", vec![identity()], Vec::new())
        .with_table("_obsolete_legacy", vec![identity()], Vec::new())
        .with_table("_obsolete_legacy_1", vec![identity()], Vec::new());
    let sink = CollectingEventSink::new();

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &sink, ReconcileConfig::default())
            .expect("begin");
        tx.dont_require_table("legacy").expect("retire legacy");
        assert!(!tx.has_table("legacy"));
        assert_eq!(
            tx.pending().renames(),
            &[ObsoleteRename::Table {
                from: "legacy".to_string(),
                to: "_obsolete_legacy_2".to_string(),
            }]
        );
        tx.commit().expect("commit");
    }

    assert_eq!(
        backend.calls(),
        &[BackendCall::RenameTable {
            from: "legacy".to_string(),
            to: "_obsolete_legacy_2".to_string(),
        }]
    );
    assert_eq!(
        sink.messages_with(Severity::Obsolete),
        vec!["table legacy renamed to _obsolete_legacy_2".to_string()]
    );
}

#[test]
fn absent_table_is_a_no_op() {
    let mut backend = FakeBackend::default();
    let sink = CollectingEventSink::new();

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &sink, ReconcileConfig::default())
            .expect("begin");
        tx.dont_require_table("never_existed").expect("retire ghost");
        tx.commit().expect("commit");
    }

    assert!(backend.calls().is_empty());
    assert!(sink.events().is_empty());
}

#[test]
fn field_rename_probes_live_and_reserved_names() {
    let mut backend = FakeBackend::default().with_table(
        "users",
        vec![
            identity(),
            FieldSpec::new("nick", FieldType::Text),
            FieldSpec::new("_obsolete_nick", FieldType::Text),
        ],
        Vec::new(),
    );
    let sink = CollectingEventSink::new();

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &sink, ReconcileConfig::default())
            .expect("begin");
        tx.dont_require_field("users", "NICK").expect("retire nick");
        assert!(!tx.has_field("users", "nick").expect("has_field"));
        tx.dont_require_field("users", "nick")
            .expect("retiring twice is a no-op");
        tx.dont_require_field("users", "ID")
            .expect("identity is never retired");
        tx.commit().expect("commit");
    }

    assert_eq!(
        backend.calls(),
        &[BackendCall::RenameField {
            table: "users".to_string(),
            from: "nick".to_string(),
            to: "_obsolete_nick_1".to_string(),
        }]
    );
    assert_eq!(
        sink.messages_with(Severity::Obsolete),
        vec!["field users.nick renamed to _obsolete_nick_1".to_string()]
    );
}

#[test]
fn retire_undeclared_sweeps_tables_and_fields_the_declaration_omits() {
    let mut backend = FakeBackend::default()
        .with_table(
            "users",
            vec![
                identity(),
                FieldSpec::new("name", FieldType::Text),
                FieldSpec::new("fax", FieldType::Text),
                FieldSpec::new("_obsolete_pager", FieldType::Text),
            ],
            Vec::new(),
        )
        .with_table("sessions", vec![identity()], Vec::new())
        .with_table("_obsolete_audit", vec![identity()], Vec::new());

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &NoopEventSink, ReconcileConfig::default())
            .expect("begin");
        tx.require_schema(
            &[
                TableSpec::new("users").field("name", "text"),
                TableSpec::new("posts").field("title", "varchar(200)"),
            ],
            ObsoletePolicy::RetireUndeclared,
        )
        .expect("require schema");
        tx.commit().expect("commit");
    }

    assert_eq!(
        backend.calls(),
        &[
            BackendCall::RenameTable {
                from: "sessions".to_string(),
                to: "_obsolete_sessions".to_string(),
            },
            BackendCall::RenameField {
                table: "users".to_string(),
                from: "fax".to_string(),
                to: "_obsolete_fax".to_string(),
            },
            BackendCall::CreateTable {
                table: "posts".to_string(),
                fields: vec!["ID".to_string(), "title".to_string()],
                indexes: Vec::new(),
            },
        ]
    );
    assert_eq!(
        backend.table_names(),
        vec![
            "users".to_string(),
            "_obsolete_audit".to_string(),
            "_obsolete_sessions".to_string(),
            "posts".to_string(),
        ]
    );
}

#[test]
fn keep_undeclared_leaves_extra_tables_alone() {
    let mut backend = FakeBackend::default()
        .with_table("users", vec![identity()], Vec::new())
        .with_table("sessions", vec![identity()], Vec::new());

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &NoopEventSink, ReconcileConfig::default())
            .expect("begin");
        tx.require_schema(&[TableSpec::new("users")], ObsoletePolicy::KeepUndeclared)
            .expect("require schema");
        tx.commit().expect("commit");
    }

    assert!(backend.calls().is_empty());
}

#[test]
fn custom_prefix_is_honored() {
    let mut backend = FakeBackend::default().with_table("old", vec![identity()], Vec::new());
    let config = ReconcileConfig {
        obsolete_prefix: "zz_".to_string(),
        ..ReconcileConfig::default()
    };

    {
        let mut tx = SchemaTransaction::begin(&mut backend, &NoopEventSink, config).expect("begin");
        tx.dont_require_table("old").expect("retire old");
        tx.commit().expect("commit");
    }

    assert_eq!(backend.table_names(), vec!["zz_old".to_string()]);
}
