use schemasync_core::{
    FieldMap, FieldSpec, FieldType, IndexKind, IndexSpec, IndexSpecMap, RenderError, TableChange,
    quote_literal,
};

use crate::SQLITE_BACKEND;

const SHADOW_TABLE_PREFIX: &str = "__schemasync_rebuild_";
const INDEX_NAME_SEPARATOR: &str = "__";
const IDENTITY_SQL: &str = "INTEGER PRIMARY KEY";
const AUTO_IDENTITY_SQL: &str = "INTEGER PRIMARY KEY AUTOINCREMENT";
const INDEX_KEYWORD: &str = "INDEX";
const UNIQUE_KEYWORD: &str = "UNIQUE";

pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub(crate) const fn identity_definition(auto_increment: bool) -> &'static str {
    if auto_increment {
        AUTO_IDENTITY_SQL
    } else {
        IDENTITY_SQL
    }
}

/// SQLite index names share one namespace per database, so declared names are
/// stored prefixed by their table.
pub(crate) fn physical_index_name(table: &str, index: &str) -> String {
    format!("{table}{INDEX_NAME_SEPARATOR}{index}")
}

pub(crate) fn logical_index_name(table: &str, physical: &str) -> String {
    let prefix = format!("{table}{INDEX_NAME_SEPARATOR}").to_ascii_lowercase();
    if physical.to_ascii_lowercase().starts_with(&prefix) {
        physical[prefix.len()..].to_string()
    } else {
        physical.to_string()
    }
}

pub(crate) fn column_definition(field: &FieldSpec) -> String {
    let name = quote_identifier(field.name());
    if let FieldType::Identity { auto_increment } = field.field_type() {
        return format!("{name} {}", identity_definition(*auto_increment));
    }

    let mut sql = name.clone();
    let column_type = column_type(field.field_type());
    if !column_type.is_empty() {
        sql.push(' ');
        sql.push_str(&column_type);
    }
    if !field.is_nullable() {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = field.default_expression() {
        if is_constant_default(default) {
            sql.push_str(&format!(" DEFAULT {default}"));
        } else {
            sql.push_str(&format!(" DEFAULT ({default})"));
        }
    }
    if let Some(values) = field.enum_values() {
        let literals = values
            .iter()
            .map(|value| quote_literal(value))
            .collect::<Vec<_>>();
        sql.push_str(&format!(" CHECK ({name} IN ({}))", literals.join(", ")));
    }
    sql
}

pub(crate) fn create_table_sql(table: &str, fields: &FieldMap) -> String {
    let columns = fields.values().map(column_definition).collect::<Vec<_>>();
    format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table),
        columns.join(", ")
    )
}

pub(crate) fn add_column_sql(table: &str, field: &FieldSpec) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_identifier(table),
        column_definition(field)
    )
}

/// `UNIQUE ("a", "b")` style body, as reported in change events.
pub(crate) fn index_body(index: &IndexSpec) -> Result<String, RenderError> {
    Ok(format!("{} ({})", index_keyword(index)?, quoted_fields(index)))
}

pub(crate) fn create_index_sql(table: &str, index: &IndexSpec) -> Result<String, RenderError> {
    let unique = if index_keyword(index)? == UNIQUE_KEYWORD {
        "UNIQUE "
    } else {
        ""
    };
    Ok(format!(
        "CREATE {unique}INDEX {} ON {} ({})",
        quote_identifier(&physical_index_name(table, index.name())),
        quote_identifier(table),
        quoted_fields(index)
    ))
}

pub(crate) fn drop_index_sql(table: &str, index: &str) -> String {
    format!(
        "DROP INDEX IF EXISTS {}",
        quote_identifier(&physical_index_name(table, index))
    )
}

pub(crate) fn rename_table_sql(from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_identifier(from),
        quote_identifier(to)
    )
}

pub(crate) fn rename_column_sql(table: &str, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_identifier(table),
        quote_identifier(from),
        quote_identifier(to)
    )
}

/// `ALTER TABLE ... ADD COLUMN` cannot change existing columns, add a key, or
/// add a NOT NULL column without a constant default.
pub(crate) fn needs_rebuild(change: &TableChange) -> bool {
    !change.altered_fields.is_empty()
        || change.new_fields.values().any(|field| {
            field.field_type().is_identity()
                || (!field.is_nullable() && field.default_expression().is_none())
                || field
                    .default_expression()
                    .is_some_and(|default| !is_constant_default(default))
        })
}

/// In-place alteration: new columns, then dropped-and-recreated indexes.
pub(crate) fn alter_statements(
    table: &str,
    change: &TableChange,
) -> Result<Vec<String>, RenderError> {
    let mut statements = change
        .new_fields
        .values()
        .map(|field| add_column_sql(table, field))
        .collect::<Vec<_>>();

    for index in change.altered_indexes.values() {
        statements.push(drop_index_sql(table, index.name()));
        statements.push(create_index_sql(table, index)?);
    }
    for index in change.new_indexes.values() {
        statements.push(create_index_sql(table, index)?);
    }
    Ok(statements)
}

/// Shadow-table rebuild: create the new layout, copy rows, swap the tables,
/// then recreate every index of the table.
pub(crate) fn rebuild_statements(
    table: &str,
    live_fields: &FieldMap,
    live_indexes: &IndexSpecMap,
    change: &TableChange,
) -> Result<Vec<String>, RenderError> {
    let mut columns = Vec::new();

    for field in change.new_fields.values() {
        if field.field_type().is_identity() {
            columns.push((field.clone(), None));
        }
    }
    for live in live_fields.values() {
        let key = live.name().to_ascii_lowercase();
        let column = match change.altered_fields.get(&key) {
            Some(altered) => {
                let source = quote_identifier(live.name());
                let projection = if altered.is_nullable() {
                    source
                } else {
                    let fallback = altered
                        .default_expression()
                        .map_or_else(|| implicit_fill(altered), str::to_string);
                    format!("COALESCE({source}, {fallback})")
                };
                (altered.clone(), Some(projection))
            }
            None => (live.clone(), Some(quote_identifier(live.name()))),
        };
        columns.push(column);
    }
    for field in change.new_fields.values() {
        if field.field_type().is_identity() {
            continue;
        }
        let projection = (!field.is_nullable() && field.default_expression().is_none())
            .then(|| implicit_fill(field));
        columns.push((field.clone(), projection));
    }

    let shadow = format!("{SHADOW_TABLE_PREFIX}{table}");
    let definitions = columns
        .iter()
        .map(|(field, _)| column_definition(field))
        .collect::<Vec<_>>();
    let mut statements = vec![format!(
        "CREATE TABLE {} ({})",
        quote_identifier(&shadow),
        definitions.join(", ")
    )];

    let copied = columns
        .iter()
        .filter_map(|(field, projection)| {
            projection
                .as_ref()
                .map(|projection| (quote_identifier(field.name()), projection.clone()))
        })
        .collect::<Vec<_>>();
    if !copied.is_empty() {
        let targets = copied
            .iter()
            .map(|(target, _)| target.as_str())
            .collect::<Vec<_>>();
        let projections = copied
            .iter()
            .map(|(_, projection)| projection.as_str())
            .collect::<Vec<_>>();
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_identifier(&shadow),
            targets.join(", "),
            projections.join(", "),
            quote_identifier(table)
        ));
    }

    statements.push(format!("DROP TABLE {}", quote_identifier(table)));
    statements.push(rename_table_sql(&shadow, table));

    let mut indexes = live_indexes
        .iter()
        .map(|(name, index)| (name.to_ascii_lowercase(), index.clone()))
        .collect::<IndexSpecMap>();
    for (name, index) in change
        .altered_indexes
        .iter()
        .chain(change.new_indexes.iter())
    {
        indexes.insert(name.clone(), index.clone());
    }
    for index in indexes.values() {
        statements.push(create_index_sql(table, index)?);
    }

    Ok(statements)
}

fn index_keyword(index: &IndexSpec) -> Result<&'static str, RenderError> {
    match index.kind() {
        IndexKind::Single | IndexKind::Composite => Ok(INDEX_KEYWORD),
        IndexKind::Unique => Ok(UNIQUE_KEYWORD),
        IndexKind::Fulltext => Err(RenderError::UnsupportedIndexKind {
            index: index.name().to_string(),
            kind: index.kind().to_string(),
            backend: SQLITE_BACKEND.to_string(),
        }),
    }
}

fn quoted_fields(index: &IndexSpec) -> String {
    index
        .fields()
        .iter()
        .map(|field| quote_identifier(field))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_type(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Identity { .. } => "INTEGER".to_string(),
        FieldType::Enum { .. } => "TEXT".to_string(),
        FieldType::Custom(text) => text.clone(),
        other => other.render().to_ascii_uppercase(),
    }
}

// Value copied into a NOT NULL column that has no default, matching what
// a lenient server would fill in implicitly.
fn implicit_fill(field: &FieldSpec) -> String {
    match field.field_type() {
        FieldType::Integer
        | FieldType::BigInt
        | FieldType::SmallInt
        | FieldType::Boolean
        | FieldType::Float
        | FieldType::Double
        | FieldType::Decimal { .. } => "0".to_string(),
        FieldType::Enum { values } => values
            .first()
            .map_or_else(|| "''".to_string(), |value| quote_literal(value)),
        _ => "''".to_string(),
    }
}

// SQLite accepts these bare after DEFAULT; anything else needs parentheses.
fn is_constant_default(default: &str) -> bool {
    let default = default.trim();
    is_string_literal(default)
        || default.parse::<f64>().is_ok()
        || ["null", "true", "false"]
            .iter()
            .any(|keyword| default.eq_ignore_ascii_case(keyword))
}

fn is_string_literal(text: &str) -> bool {
    let Some(inner) = text
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
    else {
        return false;
    };
    inner.replace("''", "").find('\'').is_none()
}
