use schemasync_core::{
    Backend, CommitSummary, EventSink, ObsoletePolicy, ReconcileConfig, SchemaTransaction,
    TableSpec, Value,
};
use schemasync_driver_sqlite::SqliteBackend;

pub fn memory_backend() -> SqliteBackend {
    SqliteBackend::open_in_memory().expect("open in-memory sqlite")
}

#[allow(dead_code)]
pub fn reconcile(
    backend: &mut SqliteBackend,
    sink: &dyn EventSink,
    tables: &[TableSpec],
    policy: ObsoletePolicy,
) -> CommitSummary {
    let mut tx = SchemaTransaction::begin(backend, sink, ReconcileConfig::default())
        .expect("begin schema pass");
    tx.require_schema(tables, policy).expect("require schema");
    tx.commit().expect("commit schema pass")
}

/// `(name, rendered definition)` for every live field, in column order.
#[allow(dead_code)]
pub fn live_fields(backend: &SqliteBackend, table: &str) -> Vec<(String, String)> {
    backend
        .list_fields(table)
        .expect("list fields")
        .values()
        .map(|field| (field.name().to_string(), field.rendered().to_string()))
        .collect()
}

#[allow(dead_code)]
pub fn column_values(backend: &mut SqliteBackend, sql: &str) -> Vec<Value> {
    backend
        .execute_query(sql)
        .expect("run query")
        .first_column_values()
        .expect("read first column")
}

#[allow(dead_code)]
pub fn execute(backend: &mut SqliteBackend, sql: &str) {
    backend.execute_statement(sql).expect("execute statement");
}
