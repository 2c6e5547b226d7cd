use std::{io, path::PathBuf};

use miette::Report;

const RECONCILE_CONTEXT: &str = "while reconciling schema";
const QUERY_CONTEXT: &str = "while running query";
const FILE_READ_CONTEXT: &str = "while reading schema manifest";
const MANIFEST_PARSE_CONTEXT: &str = "while parsing schema manifest";

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    ReadFile {
        path: PathBuf,
        source: io::Error,
    },
    Manifest {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    Reconcile(schemasync_core::Error),
    Query(schemasync_core::Error),
}

impl From<schemasync_core::Error> for CliError {
    fn from(value: schemasync_core::Error) -> Self {
        Self::Reconcile(value)
    }
}

impl From<schemasync_core::RenderError> for CliError {
    fn from(value: schemasync_core::RenderError) -> Self {
        Self::Reconcile(value.into())
    }
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::ReadFile { path, source } => {
            let context = format!("{FILE_READ_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[io] {report}")
        }
        CliError::Manifest { path, source } => {
            let context = format!("{MANIFEST_PARSE_CONTEXT} `{}`", path.display());
            let report = report_with_context(source, context);
            format!("[manifest] {report}")
        }
        CliError::Reconcile(source) => {
            let category = core_category(&source);
            let report = report_with_context(source, RECONCILE_CONTEXT);
            format!("[{category}] {report}")
        }
        CliError::Query(source) => {
            let category = core_category(&source);
            let report = report_with_context(source, QUERY_CONTEXT);
            format!("[{category}] {report}")
        }
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: std::error::Error + Send + Sync + 'static,
    C: Into<String>,
{
    let context = context.into();
    let anyhow_error = anyhow::Error::new(source).context(context);
    miette::miette!("{anyhow_error:#}")
}

const fn core_category(error: &schemasync_core::Error) -> &'static str {
    match error {
        schemasync_core::Error::Backend(_) => "backend",
        schemasync_core::Error::Render(_) => "render",
        schemasync_core::Error::Command(_) => "command",
        schemasync_core::Error::Cursor(_) => "cursor",
    }
}
