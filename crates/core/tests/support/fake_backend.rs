use std::{
    cell::Cell,
    collections::{BTreeSet, VecDeque},
    io,
};

use indexmap::IndexMap;
use schemasync_core::{
    AnsiQueryBuilder, Backend, BackendError, FieldMap, FieldSpec, IndexSpec, IndexSpecMap,
    QueryBuilder, Result, ResultCursor, Row, TableChange, Value,
};

pub const FAKE_BACKEND: &str = "fake";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreateTable {
        table: String,
        fields: Vec<String>,
        indexes: Vec<String>,
    },
    AlterTable {
        table: String,
        new_fields: Vec<String>,
        new_indexes: Vec<String>,
        altered_fields: Vec<String>,
        altered_indexes: Vec<String>,
    },
    RenameTable {
        from: String,
        to: String,
    },
    CreateField {
        table: String,
        field: String,
    },
    RenameField {
        table: String,
        from: String,
        to: String,
    },
}

#[derive(Debug, Clone)]
struct FakeTable {
    name: String,
    fields: FieldMap,
    indexes: IndexSpecMap,
}

#[derive(Debug)]
pub struct FakeBackend {
    tables: IndexMap<String, FakeTable>,
    calls: Vec<BackendCall>,
    statements: Vec<String>,
    queries: Vec<String>,
    query_results: VecDeque<Vec<Row>>,
    affected_rows: u64,
    collations: bool,
    unavailable: bool,
    list_fields_calls: Cell<usize>,
    builder: AnsiQueryBuilder,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            tables: IndexMap::new(),
            calls: Vec::new(),
            statements: Vec::new(),
            queries: Vec::new(),
            query_results: VecDeque::new(),
            affected_rows: 0,
            collations: false,
            unavailable: false,
            list_fields_calls: Cell::new(0),
            builder: AnsiQueryBuilder,
        }
    }
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn with_table(mut self, name: &str, fields: Vec<FieldSpec>, indexes: Vec<IndexSpec>) -> Self {
        self.tables.insert(
            name.to_ascii_lowercase(),
            FakeTable {
                name: name.to_string(),
                fields: fields
                    .into_iter()
                    .map(|field| (field.name().to_string(), field))
                    .collect(),
                indexes: indexes
                    .into_iter()
                    .map(|index| (index.name().to_string(), index))
                    .collect(),
            },
        );
        self
    }

    pub fn with_collations(mut self) -> Self {
        self.collations = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn set_affected_rows(&mut self, affected: u64) {
        self.affected_rows = affected;
    }

    pub fn queue_query_result(&mut self, rows: Vec<Row>) {
        self.query_results.push_back(rows);
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn list_fields_calls(&self) -> usize {
        self.list_fields_calls.get()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.values().map(|table| table.name.clone()).collect()
    }

    pub fn field(&self, table: &str, field: &str) -> Option<&FieldSpec> {
        self.tables
            .get(&table.to_ascii_lowercase())?
            .fields
            .values()
            .find(|spec| spec.name().eq_ignore_ascii_case(field))
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut FakeTable> {
        self.tables
            .get_mut(&table.to_ascii_lowercase())
            .ok_or_else(|| missing_table(table))
    }
}

impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        FAKE_BACKEND
    }

    fn execute_query(&mut self, sql: &str) -> Result<ResultCursor> {
        self.queries.push(sql.to_string());
        Ok(ResultCursor::from_rows(
            self.query_results.pop_front().unwrap_or_default(),
        ))
    }

    fn execute_statement(&mut self, sql: &str) -> Result<u64> {
        self.statements.push(sql.to_string());
        Ok(self.affected_rows)
    }

    fn create_table(
        &mut self,
        table: &str,
        fields: &FieldMap,
        indexes: &IndexSpecMap,
    ) -> Result<()> {
        self.calls.push(BackendCall::CreateTable {
            table: table.to_string(),
            fields: fields.values().map(|field| field.name().to_string()).collect(),
            indexes: indexes.values().map(|index| index.name().to_string()).collect(),
        });
        self.tables.insert(
            table.to_ascii_lowercase(),
            FakeTable {
                name: table.to_string(),
                fields: fields
                    .values()
                    .map(|field| (field.name().to_string(), field.clone()))
                    .collect(),
                indexes: indexes
                    .values()
                    .map(|index| (index.name().to_string(), index.clone()))
                    .collect(),
            },
        );
        Ok(())
    }

    fn alter_table(&mut self, table: &str, change: &TableChange) -> Result<()> {
        self.calls.push(BackendCall::AlterTable {
            table: table.to_string(),
            new_fields: names(change.new_fields.values().map(FieldSpec::name)),
            new_indexes: names(change.new_indexes.values().map(IndexSpec::name)),
            altered_fields: names(change.altered_fields.values().map(FieldSpec::name)),
            altered_indexes: names(change.altered_indexes.values().map(IndexSpec::name)),
        });

        let stored = self.table_mut(table)?;
        for field in change.new_fields.values().chain(change.altered_fields.values()) {
            stored
                .fields
                .retain(|name, _| !name.eq_ignore_ascii_case(field.name()));
            stored.fields.insert(field.name().to_string(), field.clone());
        }
        for index in change.new_indexes.values().chain(change.altered_indexes.values()) {
            stored
                .indexes
                .retain(|name, _| !name.eq_ignore_ascii_case(index.name()));
            stored.indexes.insert(index.name().to_string(), index.clone());
        }
        Ok(())
    }

    fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
        self.calls.push(BackendCall::RenameTable {
            from: from.to_string(),
            to: to.to_string(),
        });
        let mut stored = self
            .tables
            .shift_remove(&from.to_ascii_lowercase())
            .ok_or_else(|| missing_table(from))?;
        stored.name = to.to_string();
        self.tables.insert(to.to_ascii_lowercase(), stored);
        Ok(())
    }

    fn create_field(&mut self, table: &str, field: &FieldSpec) -> Result<()> {
        self.calls.push(BackendCall::CreateField {
            table: table.to_string(),
            field: field.name().to_string(),
        });
        self.table_mut(table)?
            .fields
            .insert(field.name().to_string(), field.clone());
        Ok(())
    }

    fn rename_field(&mut self, table: &str, from: &str, to: &str) -> Result<()> {
        self.calls.push(BackendCall::RenameField {
            table: table.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
        let stored = self.table_mut(table)?;
        let key = stored
            .fields
            .keys()
            .find(|name| name.eq_ignore_ascii_case(from))
            .cloned()
            .ok_or_else(|| missing_table(&format!("{table}.{from}")))?;
        if let Some(field) = stored.fields.shift_remove(&key) {
            stored.fields.insert(to.to_string(), field.named(to));
        }
        Ok(())
    }

    fn list_tables(&self) -> Result<BTreeSet<String>> {
        if self.unavailable {
            return Err(BackendError::unavailable(
                FAKE_BACKEND,
                "listing tables",
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            )
            .into());
        }
        Ok(self.tables.keys().cloned().collect())
    }

    fn list_fields(&self, table: &str) -> Result<FieldMap> {
        self.list_fields_calls.set(self.list_fields_calls.get() + 1);
        Ok(self
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|stored| stored.fields.clone())
            .unwrap_or_default())
    }

    fn list_indexes(&self, table: &str) -> Result<IndexSpecMap> {
        Ok(self
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|stored| stored.indexes.clone())
            .unwrap_or_default())
    }

    fn supports_collations(&self) -> bool {
        self.collations
    }

    fn identity_column_definition(&self, for_alter: bool, auto_increment: bool) -> String {
        match (for_alter, auto_increment) {
            (false, true) => "integer primary key autoincrement".to_string(),
            (false, false) => "integer primary key".to_string(),
            (true, true) => "integer not null autoincrement".to_string(),
            (true, false) => "integer not null".to_string(),
        }
    }

    fn render_index_definition(&self, index: &IndexSpec) -> Result<String> {
        Ok(index.rendered().to_string())
    }

    fn query_builder(&self) -> &dyn QueryBuilder {
        &self.builder
    }
}

#[allow(dead_code)]
pub fn row(cells: &[(&str, Value)]) -> Row {
    cells
        .iter()
        .map(|(column, value)| ((*column).to_string(), value.clone()))
        .collect()
}

fn names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names.map(str::to_string).collect()
}

fn missing_table(table: &str) -> schemasync_core::Error {
    BackendError::statement_failed(
        FAKE_BACKEND,
        format!("<touch {table}>"),
        io::Error::new(io::ErrorKind::NotFound, format!("no such table `{table}`")),
    )
    .into()
}
