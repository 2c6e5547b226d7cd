use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension};
use schemasync_core::{
    BackendError, FieldMap, FieldSpec, FieldType, IndexKind, IndexSpec, IndexSpecMap, Result,
    normalize_definition, parse_literal_list,
};

use crate::{SQLITE_BACKEND, catalog_queries, ddl};

const AUTOINCREMENT_KEYWORD: &str = "autoincrement";
const INTEGER_TYPE: &str = "integer";

struct ColumnRow {
    name: String,
    declared_type: String,
    not_null: bool,
    default: Option<String>,
    primary_key: bool,
}

pub(crate) fn server_version(connection: &Connection) -> Result<String> {
    connection
        .query_row(catalog_queries::SHOW_SERVER_VERSION_QUERY, [], |row| {
            row.get(0)
        })
        .map_err(|source| introspection_error("reading server version", source))
}

pub(crate) fn table_names(connection: &Connection) -> Result<BTreeSet<String>> {
    let mut statement = connection
        .prepare(catalog_queries::TABLE_NAMES_QUERY)
        .map_err(|source| introspection_error("listing tables", source))?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|source| introspection_error("listing tables", source))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|source| introspection_error("listing tables", source))?;

    Ok(names
        .into_iter()
        .map(|name| name.to_ascii_lowercase())
        .collect())
}

pub(crate) fn table_fields(connection: &Connection, table: &str) -> Result<FieldMap> {
    let operation = format!("listing fields of `{table}`");
    let table_sql = table_sql(connection, table)?.unwrap_or_default();

    let mut statement = connection
        .prepare(catalog_queries::TABLE_COLUMNS_QUERY)
        .map_err(|source| introspection_error(&operation, source))?;
    let columns = statement
        .query_map([table], |row| {
            Ok(ColumnRow {
                name: row.get(0)?,
                declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                not_null: row.get(2)?,
                default: row.get(3)?,
                primary_key: row.get::<_, i64>(4)? > 0,
            })
        })
        .map_err(|source| introspection_error(&operation, source))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|source| introspection_error(&operation, source))?;

    Ok(columns
        .into_iter()
        .map(|column| {
            let field = field_from_column(&column, &table_sql);
            (column.name, field)
        })
        .collect())
}

pub(crate) fn table_indexes(connection: &Connection, table: &str) -> Result<IndexSpecMap> {
    let operation = format!("listing indexes of `{table}`");

    let mut statement = connection
        .prepare(catalog_queries::TABLE_INDEXES_QUERY)
        .map_err(|source| introspection_error(&operation, source))?;
    let entries = statement
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })
        .map_err(|source| introspection_error(&operation, source))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|source| introspection_error(&operation, source))?;

    let mut indexes = IndexSpecMap::new();
    for (physical_name, unique) in entries {
        let mut statement = connection
            .prepare(catalog_queries::INDEX_COLUMNS_QUERY)
            .map_err(|source| introspection_error(&operation, source))?;
        let fields = statement
            .query_map([physical_name.as_str()], |row| row.get::<_, String>(0))
            .map_err(|source| introspection_error(&operation, source))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|source| introspection_error(&operation, source))?;

        let name = ddl::logical_index_name(table, &physical_name);
        let kind = if unique {
            IndexKind::Unique
        } else {
            IndexKind::Single
        };
        indexes.insert(name.clone(), IndexSpec::new(name, kind, fields));
    }

    Ok(indexes)
}

fn table_sql(connection: &Connection, table: &str) -> Result<Option<String>> {
    connection
        .query_row(catalog_queries::TABLE_DDL_QUERY, [table], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()
        .map(Option::flatten)
        .map_err(|source| introspection_error(&format!("reading definition of `{table}`"), source))
}

fn field_from_column(column: &ColumnRow, table_sql: &str) -> FieldSpec {
    let declared = column.declared_type.trim();

    let column_sql = column_sql(table_sql, &column.name).unwrap_or_default();

    if column.primary_key && declared.eq_ignore_ascii_case(INTEGER_TYPE) {
        let auto_increment = words_outside_quotes(column_sql)
            .iter()
            .any(|word| word.eq_ignore_ascii_case(AUTOINCREMENT_KEYWORD));
        return FieldSpec::new(column.name.as_str(), FieldType::Identity { auto_increment });
    }

    let field_type = match enum_values_from_check(column_sql, &column.name) {
        Some(values) => FieldType::Enum { values },
        None => declared_field_type(declared),
    };

    let mut spec = FieldSpec::new(column.name.as_str(), field_type).nullable(!column.not_null);
    if let Some(default) = &column.default {
        spec = spec.with_default(default.clone());
    }
    spec
}

fn declared_field_type(declared: &str) -> FieldType {
    let (name, args) = match declared.split_once('(') {
        Some((name, rest)) => (name.trim(), rest.strip_suffix(')')),
        None => (declared, None),
    };

    FieldType::from_name(name, args)
        .unwrap_or_else(|| FieldType::Custom(normalize_definition(declared)))
}

// Enumerated fields are stored as TEXT guarded by `CHECK ("field" IN (...))`.
fn enum_values_from_check(column_sql: &str, field: &str) -> Option<Vec<String>> {
    let marker = format!(
        "check ({} in (",
        ddl::quote_identifier(field).to_ascii_lowercase()
    );
    let start = column_sql.to_ascii_lowercase().find(&marker)? + marker.len();
    let rest = &column_sql[start..];

    let mut in_quote = false;
    let end = rest.char_indices().find_map(|(offset, ch)| match ch {
        '\'' => {
            in_quote = !in_quote;
            None
        }
        ')' if !in_quote => Some(offset),
        _ => None,
    })?;

    parse_literal_list(&rest[..end])
}

/// The definition of `column` inside a `CREATE TABLE` statement, from its
/// name up to the next top-level comma.
fn column_sql<'a>(table_sql: &'a str, column: &str) -> Option<&'a str> {
    column_definitions(table_sql)
        .into_iter()
        .find(|definition| leading_identifier(definition).eq_ignore_ascii_case(column))
}

fn column_definitions(table_sql: &str) -> Vec<&str> {
    let mut definitions = Vec::new();
    let mut closing_quote = None;
    let mut depth = 0_usize;
    let mut start = 0;

    for (offset, ch) in table_sql.char_indices() {
        if let Some(quote) = closing_quote {
            if ch == quote {
                closing_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => closing_quote = Some(ch),
            '[' => closing_quote = Some(']'),
            '(' => {
                depth += 1;
                if depth == 1 {
                    start = offset + 1;
                }
            }
            ',' if depth == 1 => {
                definitions.push(table_sql[start..offset].trim());
                start = offset + 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    definitions.push(table_sql[start..offset].trim());
                    break;
                }
            }
            _ => {}
        }
    }

    definitions
}

fn leading_identifier(definition: &str) -> &str {
    let definition = definition.trim_start();
    let closing = match definition.chars().next() {
        Some(quote @ ('"' | '`')) => quote,
        Some('[') => ']',
        _ => {
            let end = definition
                .find(char::is_whitespace)
                .unwrap_or(definition.len());
            return &definition[..end];
        }
    };
    definition[1..]
        .find(closing)
        .map_or(definition, |end| &definition[1..=end])
}

// Bare words of a definition, skipping quoted literals and identifiers.
fn words_outside_quotes(sql: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut closing_quote = None;
    let mut word_start = None;

    for (offset, ch) in sql.char_indices() {
        if let Some(quote) = closing_quote {
            if ch == quote {
                closing_quote = None;
            }
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            word_start.get_or_insert(offset);
            continue;
        }
        if let Some(start) = word_start.take() {
            words.push(&sql[start..offset]);
        }
        match ch {
            '\'' | '"' | '`' => closing_quote = Some(ch),
            '[' => closing_quote = Some(']'),
            _ => {}
        }
    }
    if let Some(start) = word_start {
        words.push(&sql[start..]);
    }

    words
}

fn introspection_error(operation: &str, source: rusqlite::Error) -> schemasync_core::Error {
    BackendError::unavailable(SQLITE_BACKEND, operation, source).into()
}
