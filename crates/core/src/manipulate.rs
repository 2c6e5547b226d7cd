use std::str::FromStr;

use indexmap::IndexMap;
use tracing::debug;

use crate::{Backend, CommandError, IDENTITY_FIELD, Query, QueryRenderer, Result};

const NULL_LITERAL: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCommand {
    Insert,
    Update,
}

impl FromStr for WriteCommand {
    type Err = CommandError;

    fn from_str(command: &str) -> std::result::Result<Self, Self::Err> {
        match command.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            _ => Err(CommandError::Unsupported {
                context: "manipulate",
                command: command.to_string(),
            }),
        }
    }
}

/// Field values are literal SQL expressions (`'text'`, `42`, `NULL`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWriteSet {
    pub command: WriteCommand,
    pub values: IndexMap<String, String>,
    pub identity: Option<String>,
    pub filter: Option<String>,
}

impl RowWriteSet {
    #[must_use]
    pub fn insert() -> Self {
        Self {
            command: WriteCommand::Insert,
            values: IndexMap::new(),
            identity: None,
            filter: None,
        }
    }

    pub fn update(filter: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Update,
            values: IndexMap::new(),
            identity: None,
            filter: Some(filter.into()),
        }
    }

    #[must_use]
    pub fn value(mut self, field: impl Into<String>, expression: impl Into<String>) -> Self {
        self.values.insert(field.into(), expression.into());
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted { table: String, affected: u64 },
    Updated { table: String, affected: u64 },
}

/// Applies row write sets keyed by table name.
///
/// An `update` whose filter matches no row falls through to an insert of the
/// same values. The probe and the write are separate statements, so two
/// writers racing on the same filter can both insert.
pub struct ManipulationExecutor<'a> {
    backend: &'a mut dyn Backend,
}

impl<'a> ManipulationExecutor<'a> {
    #[must_use]
    pub fn new(backend: &'a mut dyn Backend) -> Self {
        Self { backend }
    }

    pub fn manipulate(
        &mut self,
        writes: &IndexMap<String, RowWriteSet>,
    ) -> Result<Vec<WriteOutcome>> {
        let mut outcomes = Vec::with_capacity(writes.len());
        for (table, write) in writes {
            let outcome = match write.command {
                WriteCommand::Insert => self.insert(table, write)?,
                WriteCommand::Update => self.update_or_insert(table, write)?,
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn update_or_insert(&mut self, table: &str, write: &RowWriteSet) -> Result<WriteOutcome> {
        let (probe_sql, update_sql) = {
            let renderer = QueryRenderer::new(self.backend.query_builder());
            let probe_sql = renderer.render(&Query::Count {
                table: table.to_string(),
                filter: write.filter.clone(),
            })?;
            let update_sql = renderer.render(&Query::Update {
                table: table.to_string(),
                assignments: normalized_values(&write.values),
                filter: write.filter.clone(),
            })?;
            (probe_sql, update_sql)
        };

        let matching = self
            .backend
            .execute_query(&probe_sql)?
            .first_value_of_first_row()?
            .and_then(|value| value.as_integer())
            .unwrap_or(0);
        if matching == 0 {
            debug!(%table, "update matched no rows, inserting instead");
            return self.insert(table, write);
        }

        let affected = self.backend.execute_statement(&update_sql)?;
        Ok(WriteOutcome::Updated {
            table: table.to_string(),
            affected,
        })
    }

    fn insert(&mut self, table: &str, write: &RowWriteSet) -> Result<WriteOutcome> {
        let mut values = normalized_values(&write.values);
        if let Some(identity) = &write.identity
            && !values
                .iter()
                .any(|(field, _)| field.eq_ignore_ascii_case(IDENTITY_FIELD))
        {
            values.insert(0, (IDENTITY_FIELD.to_string(), identity.clone()));
        }

        let sql = QueryRenderer::new(self.backend.query_builder()).render(&Query::Insert {
            table: table.to_string(),
            values,
        })?;
        let affected = self.backend.execute_statement(&sql)?;
        Ok(WriteOutcome::Inserted {
            table: table.to_string(),
            affected,
        })
    }
}

fn normalized_values(values: &IndexMap<String, String>) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(field, expression)| (field.clone(), normalize_literal(expression)))
        .collect()
}

fn normalize_literal(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed == "''" {
        NULL_LITERAL.to_string()
    } else {
        expression.to_string()
    }
}
