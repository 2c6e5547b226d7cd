use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use schemasync_core::{
    Backend, CollectingEventSink, CommitSummary, ObsoletePolicy, ReconcileConfig, SchemaManifest,
    SchemaTransaction, TableSpec,
};
use serde::Deserialize;

const SCENARIO_FILE_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// One reconciliation scenario: seed the database, run a pass against
/// `desired`, then check what the pass reported and left behind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Statements executed one by one before the pass.
    pub setup: Vec<String>,
    pub desired: SchemaManifest,
    pub retire_undeclared: bool,
    /// Expected events as `[severity] message`, in order.
    pub events: Option<Vec<String>>,
    /// Expected live tables, compared as a sorted lower-case list.
    pub tables: Option<Vec<String>>,
    /// Expected live fields per table as `name: rendered definition`, in
    /// column order.
    pub fields: BTreeMap<String, IndexMap<String, String>>,
    /// Expected error text of the pass.
    pub error: Option<String>,
    /// `None` resolves to `true`: a second pass must report nothing.
    pub idempotent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioResult {
    Passed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFile {
    pub path: PathBuf,
    pub file_name: String,
    pub scenarios: BTreeMap<String, Scenario>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioLoadError {
    #[error("failed to read scenarios from `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse scenarios in `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug)]
enum RunnerError {
    Engine(schemasync_core::Error),
    Assertion(String),
}

impl From<schemasync_core::Error> for RunnerError {
    fn from(value: schemasync_core::Error) -> Self {
        Self::Engine(value)
    }
}

impl From<schemasync_core::RenderError> for RunnerError {
    fn from(value: schemasync_core::RenderError) -> Self {
        Self::Engine(value.into())
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(error) => write!(f, "{error}"),
            Self::Assertion(message) => f.write_str(message),
        }
    }
}

type RunnerResult<T> = std::result::Result<T, RunnerError>;

pub fn load_scenarios_from_str(yaml: &str) -> Result<BTreeMap<String, Scenario>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Loads every `.yml`/`.yaml` file directly under `dir`, sorted by file name.
pub fn load_scenarios_from_dir(
    dir: impl AsRef<Path>,
) -> Result<Vec<ScenarioFile>, ScenarioLoadError> {
    let dir = dir.as_ref();
    let read_error = |source: io::Error| ScenarioLoadError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let is_scenario_file = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| SCENARIO_FILE_EXTENSIONS.contains(&extension));
        if path.is_file() && is_scenario_file {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let yaml = fs::read_to_string(&path).map_err(|source| ScenarioLoadError::Read {
                path: path.clone(),
                source,
            })?;
            let scenarios =
                load_scenarios_from_str(&yaml).map_err(|source| ScenarioLoadError::Parse {
                    path: path.clone(),
                    source,
                })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ScenarioFile {
                path,
                file_name,
                scenarios,
            })
        })
        .collect()
}

pub fn run_scenario(backend: &mut dyn Backend, scenario: &Scenario) -> ScenarioResult {
    match evaluate_expected_error(scenario, run_scenario_flow(backend, scenario)) {
        Ok(()) => ScenarioResult::Passed,
        Err(error) => ScenarioResult::Failed(error.to_string()),
    }
}

fn run_scenario_flow(backend: &mut dyn Backend, scenario: &Scenario) -> RunnerResult<()> {
    for sql in &scenario.setup {
        backend.execute_statement(sql)?;
    }

    let tables = scenario.desired.table_specs()?;
    let policy = if scenario.retire_undeclared {
        ObsoletePolicy::RetireUndeclared
    } else {
        ObsoletePolicy::KeepUndeclared
    };

    let sink = CollectingEventSink::new();
    reconcile(backend, &sink, &tables, policy)?;
    let events = rendered_events(&sink);

    if let Some(expected) = &scenario.events
        && *expected != events
    {
        return Err(assertion(format!(
            "event mismatch; expected:\n{}\nactual:\n{}",
            expected.join("\n"),
            events.join("\n")
        )));
    }

    if let Some(expected) = &scenario.tables {
        assert_live_tables(&*backend, expected)?;
    }
    for (table, expected) in &scenario.fields {
        assert_live_fields(&*backend, table, expected)?;
    }

    if scenario.idempotent.unwrap_or(true) {
        assert_idempotency(backend, &tables, policy)?;
    }

    Ok(())
}

fn reconcile(
    backend: &mut dyn Backend,
    sink: &CollectingEventSink,
    tables: &[TableSpec],
    policy: ObsoletePolicy,
) -> RunnerResult<CommitSummary> {
    let mut tx = SchemaTransaction::begin(backend, sink, ReconcileConfig::default())?;
    tx.require_schema(tables, policy)?;
    Ok(tx.commit()?)
}

fn assert_live_tables(backend: &dyn Backend, expected: &[String]) -> RunnerResult<()> {
    let actual = backend.list_tables()?.into_iter().collect::<Vec<_>>();
    let mut expected = expected
        .iter()
        .map(|table| table.to_ascii_lowercase())
        .collect::<Vec<_>>();
    expected.sort();

    if actual == expected {
        return Ok(());
    }
    Err(assertion(format!(
        "table mismatch; expected [{}], actual [{}]",
        expected.join(", "),
        actual.join(", ")
    )))
}

fn assert_live_fields(
    backend: &dyn Backend,
    table: &str,
    expected: &IndexMap<String, String>,
) -> RunnerResult<()> {
    let actual = backend
        .list_fields(table)?
        .values()
        .map(|field| format!("{}: {}", field.name(), field.rendered()))
        .collect::<Vec<_>>();
    let expected = expected
        .iter()
        .map(|(name, rendered)| format!("{name}: {rendered}"))
        .collect::<Vec<_>>();

    if actual == expected {
        return Ok(());
    }
    Err(assertion(format!(
        "fields of {table} mismatch; expected:\n{}\nactual:\n{}",
        expected.join("\n"),
        actual.join("\n")
    )))
}

fn assert_idempotency(
    backend: &mut dyn Backend,
    tables: &[TableSpec],
    policy: ObsoletePolicy,
) -> RunnerResult<()> {
    let sink = CollectingEventSink::new();
    let summary = reconcile(backend, &sink, tables, policy)?;
    let events = rendered_events(&sink);
    if events.is_empty() && summary.tables_created + summary.tables_altered + summary.renames == 0 {
        return Ok(());
    }

    Err(assertion(format!(
        "second pass is not idempotent; expected no changes but got:\n{}",
        events.join("\n")
    )))
}

fn evaluate_expected_error(
    scenario: &Scenario,
    execution_result: RunnerResult<()>,
) -> RunnerResult<()> {
    let Some(expected_error) = scenario.error.as_deref() else {
        return execution_result;
    };

    match execution_result {
        Ok(()) => Err(assertion(format!(
            "expected error: {expected_error}, but got no error"
        ))),
        Err(RunnerError::Engine(actual_error)) => {
            let actual_error = actual_error.to_string();
            if actual_error == expected_error {
                Ok(())
            } else {
                Err(assertion(format!(
                    "expected error: {expected_error}, but got: {actual_error}"
                )))
            }
        }
        Err(assertion_error @ RunnerError::Assertion(_)) => Err(assertion_error),
    }
}

fn rendered_events(sink: &CollectingEventSink) -> Vec<String> {
    sink.events().iter().map(ToString::to_string).collect()
}

fn assertion(message: impl Into<String>) -> RunnerError {
    RunnerError::Assertion(message.into())
}
