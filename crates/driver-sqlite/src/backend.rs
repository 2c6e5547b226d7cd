use std::{collections::BTreeSet, io};

use rusqlite::{Connection, types::ValueRef};
use schemasync_core::{
    AnsiQueryBuilder, Backend, BackendError, ConnectionConfig, FieldMap, FieldSpec, IndexSpec,
    IndexSpecMap, QueryBuilder, Result, ResultCursor, Row, TableChange, TableCommand, Value,
};
use tracing::debug;

use crate::{ddl, introspect};

pub const SQLITE_BACKEND: &str = "sqlite";

const IN_MEMORY_DATABASE: &str = ":memory:";
const MINIMUM_SQLITE_MAJOR_VERSION: u16 = 3;
// RENAME COLUMN and pragma table-valued functions.
const MINIMUM_SQLITE_MINOR_VERSION: u16 = 35;
const SERVER_VERSION_OVERRIDE_KEY: &str = "sqlite.server_version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SqliteVersion {
    major: u16,
    minor: u16,
}

/// [`Backend`] over a single `rusqlite` connection.
///
/// Each `create_table` and `alter_table` call runs in its own SQLite
/// transaction. Alterations SQLite cannot express with `ADD COLUMN` rebuild
/// the table through a shadow copy.
pub struct SqliteBackend {
    connection: Connection,
    server_version: String,
    builder: AnsiQueryBuilder,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let connection = Connection::open(config.database.as_str()).map_err(|source| {
            BackendError::unavailable(
                SQLITE_BACKEND,
                format!("opening `{}`", config.database),
                source,
            )
        })?;

        let server_version = match config.extra.get(SERVER_VERSION_OVERRIDE_KEY) {
            Some(raw_version) => raw_version.clone(),
            None => introspect::server_version(&connection)?,
        };
        let version = parse_server_version(&server_version)
            .ok_or_else(|| invalid_server_version_error(&server_version))?;
        ensure_minimum_version(version, &server_version)?;

        debug!(database = %config.database, version = %server_version, "sqlite connected");
        Ok(Self {
            connection,
            server_version,
            builder: AnsiQueryBuilder,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::connect(&ConnectionConfig::new(IN_MEMORY_DATABASE))
    }

    #[must_use]
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    fn run_in_transaction(&mut self, statements: &[String]) -> Result<()> {
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| statement_error("BEGIN", source))?;
        for sql in statements {
            debug!(%sql, "executing ddl");
            transaction
                .execute_batch(sql)
                .map_err(|source| statement_error(sql, source))?;
        }
        transaction
            .commit()
            .map_err(|source| statement_error("COMMIT", source))
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        SQLITE_BACKEND
    }

    fn execute_query(&mut self, sql: &str) -> Result<ResultCursor> {
        let mut statement = self
            .connection
            .prepare(sql)
            .map_err(|source| statement_error(sql, source))?;
        let columns = statement
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = statement
            .query([])
            .map_err(|source| statement_error(sql, source))?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next().map_err(|source| statement_error(sql, source))? {
            let mut record = Row::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                let value = row
                    .get_ref(index)
                    .map_err(|source| statement_error(sql, source))?;
                record.insert(column.clone(), value_from_ref(value));
            }
            collected.push(record);
        }

        Ok(ResultCursor::from_rows(collected))
    }

    fn execute_statement(&mut self, sql: &str) -> Result<u64> {
        debug!(%sql, "executing statement");
        let affected = self
            .connection
            .execute(sql, [])
            .map_err(|source| statement_error(sql, source))?;
        Ok(u64::try_from(affected).unwrap_or(u64::MAX))
    }

    fn create_table(
        &mut self,
        table: &str,
        fields: &FieldMap,
        indexes: &IndexSpecMap,
    ) -> Result<()> {
        let mut statements = vec![ddl::create_table_sql(table, fields)];
        for index in indexes.values() {
            statements.push(ddl::create_index_sql(table, index)?);
        }
        self.run_in_transaction(&statements)
    }

    fn alter_table(&mut self, table: &str, change: &TableChange) -> Result<()> {
        let statements = if ddl::needs_rebuild(change) {
            let live_fields = self.list_fields(table)?;
            let live_indexes = self.list_indexes(table)?;
            debug!(%table, "rebuilding table");
            ddl::rebuild_statements(table, &live_fields, &live_indexes, change)?
        } else {
            ddl::alter_statements(table, change)?
        };
        self.run_in_transaction(&statements)
    }

    fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
        self.run_in_transaction(&[ddl::rename_table_sql(from, to)])
    }

    fn create_field(&mut self, table: &str, field: &FieldSpec) -> Result<()> {
        let mut change = TableChange::new(table, TableCommand::Alter);
        change
            .new_fields
            .insert(field.name().to_ascii_lowercase(), field.clone());
        self.alter_table(table, &change)
    }

    fn rename_field(&mut self, table: &str, from: &str, to: &str) -> Result<()> {
        self.run_in_transaction(&[ddl::rename_column_sql(table, from, to)])
    }

    fn list_tables(&self) -> Result<BTreeSet<String>> {
        introspect::table_names(&self.connection)
    }

    fn list_fields(&self, table: &str) -> Result<FieldMap> {
        introspect::table_fields(&self.connection, table)
    }

    fn list_indexes(&self, table: &str) -> Result<IndexSpecMap> {
        introspect::table_indexes(&self.connection, table)
    }

    fn supports_collations(&self) -> bool {
        false
    }

    fn identity_column_definition(&self, _for_alter: bool, auto_increment: bool) -> String {
        ddl::identity_definition(auto_increment).to_string()
    }

    fn render_index_definition(&self, index: &IndexSpec) -> Result<String> {
        Ok(ddl::index_body(index)?)
    }

    fn query_builder(&self) -> &dyn QueryBuilder {
        &self.builder
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Float(value),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn parse_server_version(raw: &str) -> Option<SqliteVersion> {
    let mut parts = raw.split_whitespace().next()?.split('.');
    let major = parse_version_component(parts.next()?)?;
    let minor = parts.next().and_then(parse_version_component).unwrap_or(0);

    Some(SqliteVersion { major, minor })
}

fn parse_version_component(raw: &str) -> Option<u16> {
    let digits = raw
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect::<String>();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u16>().ok()
}

fn ensure_minimum_version(version: SqliteVersion, raw_version: &str) -> Result<()> {
    if version.major > MINIMUM_SQLITE_MAJOR_VERSION
        || (version.major == MINIMUM_SQLITE_MAJOR_VERSION
            && version.minor >= MINIMUM_SQLITE_MINOR_VERSION)
    {
        return Ok(());
    }

    Err(BackendError::unavailable(
        SQLITE_BACKEND,
        "checking server version",
        io::Error::other(format!(
            "sqlite server version `{raw_version}` is not supported; requires {MINIMUM_SQLITE_MAJOR_VERSION}.{MINIMUM_SQLITE_MINOR_VERSION}+"
        )),
    )
    .into())
}

fn invalid_server_version_error(raw_version: &str) -> schemasync_core::Error {
    BackendError::unavailable(
        SQLITE_BACKEND,
        "checking server version",
        io::Error::other(format!(
            "failed to parse sqlite server version string: `{raw_version}`"
        )),
    )
    .into()
}

fn statement_error(sql: &str, source: rusqlite::Error) -> schemasync_core::Error {
    BackendError::statement_failed(SQLITE_BACKEND, sql, source).into()
}
