use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::{
    FieldSpec, IndexSignature, IndexSpec, QueryBuilder, Result, ResultCursor, TableChange,
};

pub type FieldMap = IndexMap<String, FieldSpec>;
pub type IndexSpecMap = IndexMap<String, IndexSpec>;

/// The driver a reconciliation pass and row manipulation run against.
///
/// `list_*` methods are read-only introspection. Structural methods are only
/// called from `SchemaTransaction::commit`, one `create_table` or
/// `alter_table` per touched table.
pub trait Backend {
    fn name(&self) -> &'static str;

    fn execute_query(&mut self, sql: &str) -> Result<ResultCursor>;
    /// Returns the number of affected rows.
    fn execute_statement(&mut self, sql: &str) -> Result<u64>;

    fn create_table(&mut self, table: &str, fields: &FieldMap, indexes: &IndexSpecMap)
    -> Result<()>;
    fn alter_table(&mut self, table: &str, change: &TableChange) -> Result<()>;
    fn rename_table(&mut self, from: &str, to: &str) -> Result<()>;
    fn create_field(&mut self, table: &str, field: &FieldSpec) -> Result<()>;
    fn rename_field(&mut self, table: &str, from: &str, to: &str) -> Result<()>;

    /// Lower-cased table names.
    fn list_tables(&self) -> Result<BTreeSet<String>>;
    fn list_fields(&self, table: &str) -> Result<FieldMap>;
    fn list_indexes(&self, table: &str) -> Result<IndexSpecMap>;

    fn supports_collations(&self) -> bool;
    fn identity_column_definition(&self, for_alter: bool, auto_increment: bool) -> String;
    fn render_index_definition(&self, index: &IndexSpec) -> Result<String>;

    fn normalize_index_spec(&self, index: &IndexSpec) -> IndexSignature {
        index.signature()
    }

    fn query_builder(&self) -> &dyn QueryBuilder;

    /// Structural self-repair of an existing table beyond field and index
    /// diffing (storage engine, collation drift). Returns a note describing
    /// the repair, if one was made.
    fn repair_table(&mut self, _table: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
