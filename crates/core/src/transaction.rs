use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    Backend, Decision, DiffEngine, EventSink, FieldDefinition, FieldSpec, FieldType,
    IDENTITY_FIELD, IndexDefinition, LiveCatalog, ObsoleteRename, PendingChangeSet, Query,
    QueryRenderer, ReconcileConfig, Result, Severity, TableCommand, TableSpec,
    event::EventEmitter, quote_literal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObsoletePolicy {
    #[default]
    KeepUndeclared,
    /// Rename live tables and fields the declaration omits to obsolete names.
    RetireUndeclared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    pub tables_created: usize,
    pub tables_altered: usize,
    pub renames: usize,
    /// `false` when the pass ran in dry-run mode.
    pub applied: bool,
}

/// One reconciliation pass.
///
/// `require_*` and `dont_require_*` calls only record bookkeeping against the
/// live catalog snapshot taken by [`SchemaTransaction::begin`]; DDL is issued
/// by [`SchemaTransaction::commit`]. Two exceptions run immediately: enum
/// narrowing remaps rows before the alter is queued, and the backend's table
/// repair hook.
///
/// Passes against the same database must not run concurrently.
pub struct SchemaTransaction<'a> {
    backend: &'a mut dyn Backend,
    events: EventEmitter<'a>,
    config: ReconcileConfig,
    diff: DiffEngine,
    catalog: LiveCatalog,
    changes: PendingChangeSet,
}

impl<'a> SchemaTransaction<'a> {
    pub fn begin(
        backend: &'a mut dyn Backend,
        sink: &'a dyn EventSink,
        config: ReconcileConfig,
    ) -> Result<Self> {
        let catalog = LiveCatalog::load(&*backend)?;
        debug!(
            backend = backend.name(),
            tables = catalog.tables().count(),
            "schema pass started"
        );

        Ok(Self {
            backend,
            events: EventEmitter::new(sink, config.mute_events),
            config,
            diff: DiffEngine::new(),
            catalog,
            changes: PendingChangeSet::default(),
        })
    }

    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.catalog.has_table(table)
    }

    pub fn has_field(&mut self, table: &str, field: &str) -> Result<bool> {
        Ok(self.catalog.field(&*self.backend, table, field)?.is_some())
    }

    pub fn has_index(&mut self, table: &str, index: &str) -> Result<bool> {
        Ok(self.catalog.index(&*self.backend, table, index)?.is_some())
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingChangeSet {
        &self.changes
    }

    #[must_use]
    pub const fn catalog(&self) -> &LiveCatalog {
        &self.catalog
    }

    pub fn require_schema(&mut self, tables: &[TableSpec], policy: ObsoletePolicy) -> Result<()> {
        for table in tables {
            self.require_table(table)?;
        }

        if policy == ObsoletePolicy::KeepUndeclared {
            return Ok(());
        }

        let declared = tables
            .iter()
            .map(|table| table.name.to_ascii_lowercase())
            .collect::<HashSet<_>>();
        let live_tables = self
            .catalog
            .tables()
            .map(str::to_string)
            .collect::<Vec<_>>();
        for table in live_tables {
            if !declared.contains(&table) && !self.is_obsolete_name(&table) {
                self.dont_require_table(&table)?;
            }
        }

        for spec in tables {
            if self.changes.is_creating(&spec.name) {
                continue;
            }

            let declared_fields = spec
                .fields
                .keys()
                .map(|field| field.to_ascii_lowercase())
                .chain(std::iter::once(IDENTITY_FIELD.to_ascii_lowercase()))
                .collect::<HashSet<_>>();
            let live_fields = self
                .catalog
                .fields(&*self.backend, &spec.name)?
                .values()
                .map(|field| field.name().to_string())
                .collect::<Vec<_>>();
            for field in live_fields {
                if !declared_fields.contains(&field.to_ascii_lowercase())
                    && !self.is_obsolete_name(&field)
                {
                    self.dont_require_field(&spec.name, &field)?;
                }
            }
        }

        Ok(())
    }

    /// Fields named like the identity field are ignored; the identity field
    /// is always derived from `auto_increment`.
    pub fn require_table(&mut self, spec: &TableSpec) -> Result<()> {
        let table = spec.name.as_str();

        if self.catalog.has_table(table) {
            if let Some(note) = self.backend.repair_table(table)? {
                self.events
                    .emit(Severity::Repaired, format!("table {table} repaired: {note}"));
            }
        } else if !self.changes.is_creating(table) {
            self.changes.mark_create(table);
            self.events
                .emit(Severity::Created, format!("table {table} created"));
        }

        let identity = FieldSpec::new(
            IDENTITY_FIELD,
            FieldType::Identity {
                auto_increment: spec.auto_increment,
            },
        );
        self.require_field_spec(table, identity)?;

        for (name, definition) in &spec.fields {
            if name.eq_ignore_ascii_case(IDENTITY_FIELD) {
                continue;
            }
            self.require_field(table, name, definition)?;
        }

        for (name, definition) in &spec.indexes {
            self.require_index(table, name, definition)?;
        }

        Ok(())
    }

    pub fn require_field(
        &mut self,
        table: &str,
        field: &str,
        definition: &FieldDefinition,
    ) -> Result<()> {
        let desired = self.diff.resolve_field(&*self.backend, field, definition)?;
        self.require_field_spec(table, desired)
    }

    pub fn require_index(
        &mut self,
        table: &str,
        index: &str,
        definition: &IndexDefinition,
    ) -> Result<()> {
        let Some(desired) = definition.resolve(index)? else {
            return Ok(());
        };
        let key = desired.name().to_ascii_lowercase();

        if self.changes.is_creating(table) {
            self.changes.entry(table).new_indexes.insert(key, desired);
            return Ok(());
        }

        let live = self.catalog.index(&*self.backend, table, index)?.cloned();
        match (
            self.diff.compare_index(&*self.backend, live.as_ref(), &desired),
            live,
        ) {
            (Decision::Unchanged, _) => {}
            (Decision::Alter, Some(live)) => {
                let before = self.backend.render_index_definition(&live)?;
                let after = self.backend.render_index_definition(&desired)?;
                self.events.emit(
                    Severity::Changed,
                    format!("index {table}.{index} changed from {before} to {after}"),
                );
                self.changes.entry(table).altered_indexes.insert(key, desired);
            }
            (Decision::Create | Decision::Alter, _) => {
                let rendered = self.backend.render_index_definition(&desired)?;
                self.events.emit(
                    Severity::Created,
                    format!("index {table}.{index} created as {rendered}"),
                );
                self.changes.entry(table).new_indexes.insert(key, desired);
            }
        }

        Ok(())
    }

    /// Queues a rename of `table` to a free obsolete name. Absent tables are
    /// left alone.
    pub fn dont_require_table(&mut self, table: &str) -> Result<()> {
        if !self.catalog.has_table(table) {
            return Ok(());
        }

        let base = format!("{}{table}", self.config.obsolete_prefix);
        let target = first_free_name(&base, |candidate| {
            self.catalog.has_table(candidate) || self.changes.reserves_table_name(candidate)
        });

        self.events.emit(
            Severity::Obsolete,
            format!("table {table} renamed to {target}"),
        );
        self.changes.push_rename(ObsoleteRename::Table {
            from: table.to_string(),
            to: target,
        });
        self.catalog.forget_table(table);
        Ok(())
    }

    /// Queues a rename of `table.field` to a free obsolete name. Absent fields
    /// and the identity field are left alone.
    pub fn dont_require_field(&mut self, table: &str, field: &str) -> Result<()> {
        if field.eq_ignore_ascii_case(IDENTITY_FIELD) {
            return Ok(());
        }

        let fields = self.catalog.fields(&*self.backend, table)?;
        let Some(live_name) = fields
            .get(&field.to_ascii_lowercase())
            .map(|live| live.name().to_string())
        else {
            return Ok(());
        };
        let taken = fields.keys().cloned().collect::<HashSet<_>>();

        let base = format!("{}{live_name}", self.config.obsolete_prefix);
        let target = first_free_name(&base, |candidate| {
            taken.contains(&candidate.to_ascii_lowercase())
                || self.changes.reserves_field_name(table, candidate)
        });

        self.events.emit(
            Severity::Obsolete,
            format!("field {table}.{live_name} renamed to {target}"),
        );
        self.changes.push_rename(ObsoleteRename::Field {
            table: table.to_string(),
            from: live_name,
            to: target,
        });
        self.catalog.forget_field(table, field);
        Ok(())
    }

    /// Applies queued renames, then one `create_table` or `alter_table` call
    /// per touched table. Driver errors propagate unchanged; nothing already
    /// applied is rolled back.
    pub fn commit(self) -> Result<CommitSummary> {
        let Self {
            backend,
            config,
            changes,
            ..
        } = self;
        let mut summary = CommitSummary {
            applied: !config.dry_run,
            ..CommitSummary::default()
        };

        for rename in changes.renames() {
            if !config.dry_run {
                match rename {
                    ObsoleteRename::Table { from, to } => {
                        debug!(%from, %to, "renaming table");
                        backend.rename_table(from, to)?;
                    }
                    ObsoleteRename::Field { table, from, to } => {
                        debug!(%table, %from, %to, "renaming field");
                        backend.rename_field(table, from, to)?;
                    }
                }
            }
            summary.renames += 1;
        }

        for change in changes.tables() {
            match change.command {
                TableCommand::Create => {
                    if !config.dry_run {
                        debug!(
                            table = %change.table,
                            fields = change.new_fields.len(),
                            indexes = change.new_indexes.len(),
                            "creating table"
                        );
                        backend.create_table(
                            &change.table,
                            &change.new_fields,
                            &change.new_indexes,
                        )?;
                    }
                    summary.tables_created += 1;
                }
                TableCommand::Alter => {
                    if change.is_empty() {
                        continue;
                    }
                    if !config.dry_run {
                        debug!(
                            table = %change.table,
                            changes = change.change_count(),
                            "altering table"
                        );
                        backend.alter_table(&change.table, change)?;
                    }
                    summary.tables_altered += 1;
                }
            }
        }

        info!(
            created = summary.tables_created,
            altered = summary.tables_altered,
            renamed = summary.renames,
            dry_run = config.dry_run,
            "schema pass committed"
        );
        Ok(summary)
    }

    /// Ends the pass without issuing DDL.
    #[must_use]
    pub fn discard(self) -> PendingChangeSet {
        self.changes
    }

    fn require_field_spec(&mut self, table: &str, desired: FieldSpec) -> Result<()> {
        let key = desired.name().to_ascii_lowercase();

        if self.changes.is_creating(table) {
            self.changes.entry(table).new_fields.insert(key, desired);
            return Ok(());
        }

        let live = self
            .catalog
            .field(&*self.backend, table, desired.name())?
            .cloned();
        match (
            self.diff.compare_field(&*self.backend, live.as_ref(), &desired),
            live,
        ) {
            (Decision::Unchanged, _) => {}
            (Decision::Alter, Some(live)) => {
                let removed = self.diff.removed_enum_values(&live, &desired);
                if !removed.is_empty() {
                    self.remap_enum_values(table, &desired, &removed)?;
                }
                self.events.emit(
                    Severity::Changed,
                    format!(
                        "field {table}.{} changed from {live} to {desired}",
                        desired.name()
                    ),
                );
                self.changes.entry(table).altered_fields.insert(key, desired);
            }
            (Decision::Create | Decision::Alter, _) => {
                self.events.emit(
                    Severity::Created,
                    format!("field {table}.{} created as {desired}", desired.name()),
                );
                self.changes.entry(table).new_fields.insert(key, desired);
            }
        }

        Ok(())
    }

    // Rows holding a value the narrowed enum drops would be left out of
    // domain, so they move to the replacement value before the alter.
    fn remap_enum_values(
        &mut self,
        table: &str,
        desired: &FieldSpec,
        removed: &[String],
    ) -> Result<()> {
        let field = desired.name();
        let replacement = enum_replacement(desired);
        let removed_list = removed.join(", ");

        let (count_sql, update_sql) = {
            let renderer = QueryRenderer::new(self.backend.query_builder());
            let filter = renderer.in_list_filter(field, removed);
            let count_sql = renderer.render(&Query::Count {
                table: table.to_string(),
                filter: Some(filter.clone()),
            })?;
            let update_sql = renderer.render(&Query::Update {
                table: table.to_string(),
                assignments: vec![(field.to_string(), replacement.clone())],
                filter: Some(filter),
            })?;
            (count_sql, update_sql)
        };

        if self.config.dry_run {
            let affected = self
                .backend
                .execute_query(&count_sql)?
                .first_value_of_first_row()?
                .and_then(|value| value.as_integer())
                .unwrap_or(0);
            self.events.emit(
                Severity::Info,
                format!(
                    "{affected} rows of {table}.{field} hold removed values [{removed_list}] and would move to {replacement}"
                ),
            );
            return Ok(());
        }

        let affected = self.backend.execute_statement(&update_sql)?;
        self.events.emit(
            Severity::Info,
            format!(
                "{affected} rows of {table}.{field} moved from removed values [{removed_list}] to {replacement}"
            ),
        );
        Ok(())
    }

    fn is_obsolete_name(&self, name: &str) -> bool {
        name.to_ascii_lowercase()
            .starts_with(&self.config.obsolete_prefix.to_ascii_lowercase())
    }
}

fn enum_replacement(desired: &FieldSpec) -> String {
    if let Some(default) = desired.default_expression() {
        return default.to_string();
    }
    if desired.is_nullable() {
        return "NULL".to_string();
    }
    desired
        .enum_values()
        .and_then(<[String]>::first)
        .map_or_else(|| "NULL".to_string(), |value| quote_literal(value))
}

fn first_free_name(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }

    let mut suffix = 1_usize;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}
