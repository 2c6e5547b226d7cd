mod backend;
mod catalog;
mod changeset;
mod config;
mod cursor;
mod diff;
mod error;
mod event;
mod manifest;
mod manipulate;
mod query;
mod schema;
mod transaction;
mod value;

pub use backend::{Backend, FieldMap, IndexSpecMap};
pub use catalog::LiveCatalog;
pub use changeset::{ObsoleteRename, PendingChangeSet, TableChange, TableCommand};
pub use config::{ConnectionConfig, DEFAULT_OBSOLETE_PREFIX, ReconcileConfig};
pub use cursor::{MaterializedRows, RenderedTable, ResultCursor, RowSource, Rows, TableRendering};
pub use diff::{Decision, DiffEngine, field_comparison_key};
pub use error::{BackendError, BoxError, CommandError, CursorError, Error, RenderError, Result};
pub use event::{
    CollectingEventSink, EventSink, NoopEventSink, SchemaEvent, Severity, TracingEventSink,
};
pub use manifest::{
    FieldManifest, IndexManifest, SchemaManifest, StructuredField, TableManifest,
};
pub use manipulate::{ManipulationExecutor, RowWriteSet, WriteCommand, WriteOutcome};
pub use query::{
    AnsiQueryBuilder, Limit, Query, QueryBuilder, QueryRenderer, SelectQuery, quote_literal,
};
pub use schema::{
    FieldDefinition, FieldSpec, FieldType, IDENTITY_FIELD, IndexClass, IndexDefinition,
    IndexKind, IndexSignature, IndexSpec, TableSpec, canonical_default, normalize_definition,
    parse_literal_list,
};
pub use transaction::{CommitSummary, ObsoletePolicy, SchemaTransaction};
pub use value::{Row, Value};
