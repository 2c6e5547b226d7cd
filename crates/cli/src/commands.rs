use std::{fs, path::Path};

use schemasync_core::{
    Backend, CollectingEventSink, CommitSummary, ConnectionConfig, EventSink, ObsoletePolicy,
    ReconcileConfig, SchemaManifest, SchemaTransaction, TableSpec, TracingEventSink,
};
use schemasync_driver_sqlite::SqliteBackend;
use tracing::debug;

use crate::error_presentation::{CliError, CliResult};

const NO_CHANGES_TEXT: &str = "no changes";

#[derive(Debug, Clone)]
pub(crate) struct SchemaRequest<'a> {
    pub(crate) database: &'a str,
    pub(crate) manifest: &'a Path,
    pub(crate) policy: ObsoletePolicy,
    pub(crate) obsolete_prefix: &'a str,
    pub(crate) quiet: bool,
}

impl SchemaRequest<'_> {
    fn config(&self, dry_run: bool) -> ReconcileConfig {
        ReconcileConfig {
            mute_events: self.quiet,
            obsolete_prefix: self.obsolete_prefix.to_string(),
            dry_run,
        }
    }
}

/// Dry-run pass: events, then the pending change set, then a summary line.
pub(crate) fn plan(request: &SchemaRequest<'_>) -> CliResult<String> {
    let tables = load_manifest(request.manifest)?;
    let mut backend = connect(request.database)?;

    let sink = CollectingEventSink::new();
    let mut tx = SchemaTransaction::begin(&mut backend, &sink, request.config(true))?;
    tx.require_schema(&tables, request.policy)?;
    let pending = tx.pending().clone();
    let summary = tx.commit()?;

    let mut output = sink
        .events()
        .iter()
        .map(|event| format!("{event}\n"))
        .collect::<String>();
    if pending.is_empty() {
        output.push_str(NO_CHANGES_TEXT);
        output.push('\n');
    } else {
        output.push_str(&pending.to_string());
    }
    output.push_str(&summary_line("plan", &summary));
    output.push('\n');
    Ok(output)
}

/// Committing pass. Events are reported through `tracing`.
pub(crate) fn apply(request: &SchemaRequest<'_>) -> CliResult<String> {
    let tables = load_manifest(request.manifest)?;
    let mut backend = connect(request.database)?;

    let sink: &dyn EventSink = &TracingEventSink;
    let mut tx = SchemaTransaction::begin(&mut backend, sink, request.config(false))?;
    tx.require_schema(&tables, request.policy)?;
    let summary = tx.commit()?;

    Ok(format!("{}\n", summary_line("applied", &summary)))
}

pub(crate) fn query(database: &str, sql: &str) -> CliResult<String> {
    let mut backend = connect(database).map_err(CliError::Query)?;
    let rendering = backend
        .execute_query(sql)
        .and_then(|mut cursor| cursor.render_as_table())
        .map_err(CliError::Query)?;

    let mut output = rendering.to_string();
    if !output.ends_with('\n') {
        output.push('\n');
    }
    Ok(output)
}

fn connect(database: &str) -> schemasync_core::Result<SqliteBackend> {
    debug!(%database, "connecting");
    SqliteBackend::connect(&ConnectionConfig::new(database))
}

fn load_manifest(path: &Path) -> CliResult<Vec<TableSpec>> {
    let text = fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: SchemaManifest =
        serde_yaml::from_str(&text).map_err(|source| CliError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(manifest.table_specs()?)
}

fn summary_line(label: &str, summary: &CommitSummary) -> String {
    format!(
        "{label}: {} created, {} altered, {} renamed",
        summary.tables_created, summary.tables_altered, summary.renames
    )
}
