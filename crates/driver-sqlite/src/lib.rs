mod backend;
mod catalog_queries;
mod ddl;
mod introspect;

pub use backend::{SQLITE_BACKEND, SqliteBackend};
