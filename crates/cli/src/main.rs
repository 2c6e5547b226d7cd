mod commands;
mod error_presentation;

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use schemasync_core::{DEFAULT_OBSOLETE_PREFIX, ObsoletePolicy};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::{
    commands::SchemaRequest,
    error_presentation::{CliResult, render_runtime_error},
};

const RUNTIME_FAILURE_EXIT_CODE: u8 = 1;

/// Reconciles a SQLite database with a declarative YAML schema.
#[derive(Debug, Parser)]
#[command(name = "schemasync", version, about, long_about = None)]
struct Cli {
    /// Log engine internals at DEBUG level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Do not report schema events.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the changes a pass would make without applying them.
    Plan(SchemaArgs),
    /// Reconcile the database with the declared schema.
    Apply(SchemaArgs),
    /// Run a query and print its rows as a table.
    Query {
        /// SQLite database path.
        database: String,
        /// SQL text to run.
        sql: String,
    },
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// SQLite database path.
    database: String,

    /// YAML schema manifest.
    #[arg(short, long, value_name = "PATH")]
    file: PathBuf,

    /// Rename live tables and fields the manifest omits to obsolete names.
    #[arg(long)]
    retire_undeclared: bool,

    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_OBSOLETE_PREFIX)]
    obsolete_prefix: String,
}

impl SchemaArgs {
    fn request(&self, quiet: bool) -> SchemaRequest<'_> {
        SchemaRequest {
            database: &self.database,
            manifest: &self.file,
            policy: if self.retire_undeclared {
                ObsoletePolicy::RetireUndeclared
            } else {
                ObsoletePolicy::KeepUndeclared
            },
            obsolete_prefix: &self.obsolete_prefix,
            quiet,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", render_runtime_error(error));
            ExitCode::from(RUNTIME_FAILURE_EXIT_CODE)
        }
    }
}

fn run(cli: &Cli) -> CliResult<String> {
    match &cli.command {
        Command::Plan(args) => commands::plan(&args.request(cli.quiet)),
        Command::Apply(args) => commands::apply(&args.request(cli.quiet)),
        Command::Query { database, sql } => commands::query(database, sql),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {error}");
    }
}
