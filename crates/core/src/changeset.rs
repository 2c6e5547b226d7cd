use std::fmt;

use indexmap::IndexMap;

use crate::{FieldMap, IndexSpecMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCommand {
    Create,
    Alter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub table: String,
    pub command: TableCommand,
    pub new_fields: FieldMap,
    pub new_indexes: IndexSpecMap,
    pub altered_fields: FieldMap,
    pub altered_indexes: IndexSpecMap,
}

impl TableChange {
    #[must_use]
    pub fn new(table: &str, command: TableCommand) -> Self {
        Self {
            table: table.to_string(),
            command,
            new_fields: FieldMap::new(),
            new_indexes: IndexSpecMap::new(),
            altered_fields: FieldMap::new(),
            altered_indexes: IndexSpecMap::new(),
        }
    }

    #[must_use]
    pub fn change_count(&self) -> usize {
        self.new_fields.len()
            + self.new_indexes.len()
            + self.altered_fields.len()
            + self.altered_indexes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsoleteRename {
    Table {
        from: String,
        to: String,
    },
    Field {
        table: String,
        from: String,
        to: String,
    },
}

/// Per-table create/alter bookkeeping for one reconciliation pass, plus the
/// obsolete renames queued in the same pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChangeSet {
    tables: IndexMap<String, TableChange>,
    renames: Vec<ObsoleteRename>,
}

impl PendingChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.renames.is_empty()
    }

    #[must_use]
    pub fn table(&self, table: &str) -> Option<&TableChange> {
        self.tables.get(&table.to_ascii_lowercase())
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableChange> {
        self.tables.values()
    }

    #[must_use]
    pub fn renames(&self) -> &[ObsoleteRename] {
        &self.renames
    }

    #[must_use]
    pub fn is_creating(&self, table: &str) -> bool {
        self.table(table)
            .is_some_and(|change| change.command == TableCommand::Create)
    }

    pub(crate) fn mark_create(&mut self, table: &str) {
        self.tables
            .entry(table.to_ascii_lowercase())
            .or_insert_with(|| TableChange::new(table, TableCommand::Create))
            .command = TableCommand::Create;
    }

    /// The entry new or altered definitions fold into; opens an `alter` entry
    /// unless the table is already being created.
    pub(crate) fn entry(&mut self, table: &str) -> &mut TableChange {
        self.tables
            .entry(table.to_ascii_lowercase())
            .or_insert_with(|| TableChange::new(table, TableCommand::Alter))
    }

    pub(crate) fn push_rename(&mut self, rename: ObsoleteRename) {
        self.renames.push(rename);
    }

    pub(crate) fn reserves_table_name(&self, name: &str) -> bool {
        self.renames.iter().any(|rename| {
            matches!(rename, ObsoleteRename::Table { to, .. } if to.eq_ignore_ascii_case(name))
        })
    }

    pub(crate) fn reserves_field_name(&self, table: &str, name: &str) -> bool {
        self.renames.iter().any(|rename| {
            matches!(
                rename,
                ObsoleteRename::Field { table: owner, to, .. }
                    if owner.eq_ignore_ascii_case(table) && to.eq_ignore_ascii_case(name)
            )
        })
    }
}

impl fmt::Display for PendingChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rename in &self.renames {
            match rename {
                ObsoleteRename::Table { from, to } => writeln!(f, "rename table {from} -> {to}")?,
                ObsoleteRename::Field { table, from, to } => {
                    writeln!(f, "rename field {table}.{from} -> {to}")?;
                }
            }
        }

        for change in self.tables.values() {
            match change.command {
                TableCommand::Create => writeln!(f, "create table {}", change.table)?,
                TableCommand::Alter => writeln!(f, "alter table {}", change.table)?,
            }
            for field in change.new_fields.values() {
                writeln!(f, "  + field {} {field}", field.name())?;
            }
            for field in change.altered_fields.values() {
                writeln!(f, "  ~ field {} {field}", field.name())?;
            }
            for index in change.new_indexes.values() {
                writeln!(f, "  + index {} {index}", index.name())?;
            }
            for index in change.altered_indexes.values() {
                writeln!(f, "  ~ index {} {index}", index.name())?;
            }
        }

        Ok(())
    }
}
