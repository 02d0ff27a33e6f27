//! Error types for the data layer.
//!
//! Store failures are reported via [`DbError`], which wraps the underlying
//! [`sqlx`] errors. The bulk-load path adds [`EncodeError`] for rows that
//! violate their schema and [`LoaderError`], the terminal state of a
//! [`StreamingLoader`](crate::loader::StreamingLoader).

use std::sync::Arc;

use crate::schema::FieldKind;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The writing side went away without closing the load.
    #[error("bulk load into {table} abandoned before close")]
    LoadAbandoned {
        /// Target table of the abandoned load.
        table: &'static str,
    },
}

/// A record did not match the schema it was encoded against.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A value of the wrong kind was supplied for a field.
    #[error("field {field}: expected {expected:?}, found {found}")]
    TypeMismatch {
        /// Field name.
        field: &'static str,
        /// Kind declared by the schema.
        expected: FieldKind,
        /// Kind of the supplied value.
        found: &'static str,
    },

    /// A null was supplied for a field that is not nullable.
    #[error("field {field} is not nullable")]
    UnexpectedNull {
        /// Field name.
        field: &'static str,
    },

    /// The record supplied more or fewer values than the schema declares.
    #[error("schema {schema} declares {expected} fields, record supplied {found}")]
    FieldCount {
        /// Schema name.
        schema: &'static str,
        /// Declared field count.
        expected: usize,
        /// Supplied value count.
        found: usize,
    },

    /// A value or schema is too large for the wire format's length fields.
    #[error("{0} exceeds the wire format's length limit")]
    TooLarge(&'static str),
}

/// Terminal failure of a streaming load.
///
/// Cloneable so every call after the first failure observes the same
/// error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
    /// A record could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The loader task failed.
    #[error("bulk load failed: {0}")]
    Load(Arc<DbError>),

    /// The pipe to the loader task failed without the task reporting an error.
    #[error("loader pipe error: {0}")]
    Pipe(String),

    /// The loader task panicked or was cancelled.
    #[error("loader task failed: {0}")]
    TaskFailed(String),
}
