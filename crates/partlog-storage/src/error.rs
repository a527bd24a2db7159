//! Error types for partlog-storage
//!
//! This module defines the error types used throughout the storage crate.

use thiserror::Error;

/// Errors that can occur in catalog operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error reported by the underlying database
    #[error("Database error: {0}")]
    Database(String),

    /// The destination database has not been created
    #[error("Database {0} doesn't exist")]
    DatabaseNotFound(String),

    /// The destination table has not been created
    #[error("Table {database}.{table} doesn't exist")]
    TableNotFound { database: String, table: String },

    /// Rows of one layout were written to a table of another
    #[error("Schema mismatch for {database}.{table}: table has version {found}, rows have version {expected}")]
    SchemaMismatch {
        database: String,
        table: String,
        expected: u32,
        found: u32,
    },

    /// Invalid database or table name
    #[error("Invalid name: {0}")]
    InvalidName(#[from] partlog_core::CoreError),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    /// Create a new TableNotFound error
    pub fn table_not_found(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::TableNotFound {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Whether the error only says that something is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DatabaseNotFound(_) | Self::TableNotFound { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

macro_rules! redb_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StorageError {
                fn from(err: $ty) -> Self {
                    StorageError::Database(err.to_string())
                }
            }
        )*
    };
}

redb_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
