use std::error::Error as StdError;

use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl Error {
    #[must_use]
    pub const fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Unavailable { .. }))
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend `{backend}` unavailable while {operation}: {source}")]
    Unavailable {
        backend: String,
        operation: String,
        #[source]
        source: BoxError,
    },
    #[error("backend `{backend}` failed executing `{sql}`: {source}")]
    StatementFailed {
        backend: String,
        sql: String,
        #[source]
        source: BoxError,
    },
}

impl BackendError {
    pub fn unavailable<E>(backend: &str, operation: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Unavailable {
            backend: backend.to_string(),
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn statement_failed<E>(backend: &str, sql: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::StatementFailed {
            backend: backend.to_string(),
            sql: sql.into(),
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("field `{field}` declares unknown type `{type_name}`")]
    UnknownFieldType { field: String, type_name: String },
    #[error("field `{field}` has malformed definition `{definition}`: {reason}")]
    MalformedField {
        field: String,
        definition: String,
        reason: String,
    },
    #[error("index `{index}` has malformed definition `{definition}`: {reason}")]
    MalformedIndex {
        index: String,
        definition: String,
        reason: String,
    },
    #[error("index `{index}` of kind `{kind}` is not supported by backend `{backend}`")]
    UnsupportedIndexKind {
        index: String,
        kind: String,
        backend: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unsupported {context} command `{command}`")]
    Unsupported {
        context: &'static str,
        command: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("cursor cannot rewind to row {requested}; already positioned at row {position}")]
    Rewind { requested: usize, position: usize },
}
