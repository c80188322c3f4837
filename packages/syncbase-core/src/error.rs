//! Engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Engine operation errors.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Schema validation failed; blocks the whole open
    #[error(transparent)]
    Schema(#[from] syncbase_types::SchemaError),

    /// Column value could not be encoded or decoded
    #[error(transparent)]
    Codec(#[from] syncbase_types::CodecError),

    /// Backing store failed to open or upgrade
    #[error("failed to open store at '{path}': {reason}")]
    StorageOpen { path: PathBuf, reason: String },

    /// A write transaction aborted mid-flight
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Change log corruption detected during replay
    #[error("change log corruption: {0}")]
    Corruption(String),

    /// Table not found in the schema
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Column not found in table
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Row not found where one was required (e.g. `update`)
    #[error("row '{object_id}' not found in table '{table}'")]
    RowNotFound { table: String, object_id: String },

    /// `update` tried to rewrite the primary-key column; a row's identity
    /// is fixed at insert
    #[error("column '{column}' is the primary key of table '{table}' and cannot be updated")]
    ImmutableColumn { table: String, column: String },

    /// Insert omitted a non-nullable column without a default
    #[error("column '{column}' in table '{table}' is not nullable and has no default")]
    NullConstraint { table: String, column: String },

    /// `where` filter referenced a column outside the supported scalar set
    #[error("column '{column}' in table '{table}' does not support equality filtering")]
    UnsupportedFilter { table: String, column: String },

    /// Record serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the backing store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
