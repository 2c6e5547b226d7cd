use std::collections::{BTreeSet, HashMap, hash_map::Entry};

use crate::{Backend, FieldMap, FieldSpec, IndexSpec, IndexSpecMap, Result};

/// Introspected snapshot of the live schema for a single reconciliation pass.
///
/// Table names are read up front; field and index maps are read the first
/// time a table is inspected. All keys are lower-cased.
#[derive(Debug, Clone, Default)]
pub struct LiveCatalog {
    tables: BTreeSet<String>,
    fields: HashMap<String, FieldMap>,
    indexes: HashMap<String, IndexSpecMap>,
}

impl LiveCatalog {
    pub fn load(backend: &dyn Backend) -> Result<Self> {
        let tables = backend
            .list_tables()?
            .into_iter()
            .map(|table| table.to_ascii_lowercase())
            .collect();
        Ok(Self {
            tables,
            fields: HashMap::new(),
            indexes: HashMap::new(),
        })
    }

    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(&table.to_ascii_lowercase())
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    pub fn fields(&mut self, backend: &dyn Backend, table: &str) -> Result<&FieldMap> {
        let key = table.to_ascii_lowercase();
        let loaded = self.tables.contains(&key);
        match self.fields.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let fields = if loaded {
                    lower_keys(backend.list_fields(table)?)
                } else {
                    FieldMap::new()
                };
                Ok(entry.insert(fields))
            }
        }
    }

    pub fn field(
        &mut self,
        backend: &dyn Backend,
        table: &str,
        field: &str,
    ) -> Result<Option<&FieldSpec>> {
        Ok(self
            .fields(backend, table)?
            .get(&field.to_ascii_lowercase()))
    }

    pub fn indexes(&mut self, backend: &dyn Backend, table: &str) -> Result<&IndexSpecMap> {
        let key = table.to_ascii_lowercase();
        let loaded = self.tables.contains(&key);
        match self.indexes.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let indexes = if loaded {
                    lower_keys(backend.list_indexes(table)?)
                } else {
                    IndexSpecMap::new()
                };
                Ok(entry.insert(indexes))
            }
        }
    }

    pub fn index(
        &mut self,
        backend: &dyn Backend,
        table: &str,
        index: &str,
    ) -> Result<Option<&IndexSpec>> {
        Ok(self
            .indexes(backend, table)?
            .get(&index.to_ascii_lowercase()))
    }

    pub(crate) fn forget_table(&mut self, table: &str) {
        let key = table.to_ascii_lowercase();
        self.tables.remove(&key);
        self.fields.insert(key.clone(), FieldMap::new());
        self.indexes.insert(key, IndexSpecMap::new());
    }

    pub(crate) fn forget_field(&mut self, table: &str, field: &str) {
        if let Some(fields) = self.fields.get_mut(&table.to_ascii_lowercase()) {
            fields.shift_remove(&field.to_ascii_lowercase());
        }
    }
}

fn lower_keys<V>(map: indexmap::IndexMap<String, V>) -> indexmap::IndexMap<String, V> {
    map.into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect()
}
