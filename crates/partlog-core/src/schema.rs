//! Fixed, versioned schemas of destination system tables

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::PartLogElement;

/// Longest database or table name accepted
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Check a database or table name
///
/// Names are plain identifiers: ASCII letters, digits and `_`, not starting
/// with a digit. The `.` separator of [`TableRef`] can therefore never be
/// part of a name.
pub fn validate_identifier(name: &str) -> Result<(), CoreError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.len() > MAX_IDENTIFIER_LEN {
        Some("too long")
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        Some("must not start with a digit")
    } else if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some("only ASCII letters, digits and '_' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CoreError::InvalidIdentifier {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// A concrete destination: database plus table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Validate both halves
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_identifier(&self.database)?;
        validate_identifier(&self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// One column of a system table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Column layout of a system table
///
/// Two schemas are compatible only if both version and columns match. A
/// destination table created under an older layout is set aside, not
/// migrated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub version: u32,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(version: u32, columns: Vec<ColumnDef>) -> Self {
        Self { version, columns }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A record type that can be flushed into a system table
pub trait LogElement: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Schema of the table holding records of this type
    fn schema() -> TableSchema;
}

/// Bumped whenever the columns below change
pub const PART_LOG_SCHEMA_VERSION: u32 = 1;

impl LogElement for PartLogElement {
    fn schema() -> TableSchema {
        let columns = [
            ("event_type", "Enum8"),
            ("event_date", "Date"),
            ("event_time", "DateTime"),
            ("duration_ms", "UInt64"),
            ("database", "String"),
            ("table", "String"),
            ("part_name", "String"),
            ("partition_id", "String"),
            ("path_on_disk", "String"),
            ("rows", "UInt64"),
            ("bytes_on_disk", "UInt64"),
            ("bytes_uncompressed", "UInt64"),
            ("read_rows", "UInt64"),
            ("read_bytes", "UInt64"),
            ("merged_from", "Array(String)"),
            ("error", "UInt16"),
            ("exception", "String"),
        ]
        .into_iter()
        .map(|(name, ty)| ColumnDef::new(name, ty))
        .collect();

        TableSchema::new(PART_LOG_SCHEMA_VERSION, columns)
    }
}
