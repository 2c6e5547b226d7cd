use std::collections::BTreeMap;

pub const DEFAULT_OBSOLETE_PREFIX: &str = "_obsolete_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub mute_events: bool,
    pub obsolete_prefix: String,
    /// Plan only: commit issues no DDL and enum remapping only counts rows.
    pub dry_run: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            mute_events: false,
            obsolete_prefix: DEFAULT_OBSOLETE_PREFIX.to_string(),
            dry_run: false,
        }
    }
}

impl ReconcileConfig {
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub database: String,
    pub extra: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            extra: BTreeMap::new(),
        }
    }
}
