//! # PartLog Storage
//!
//! Destination storage for flushed structural-event logs.
//!
//! Flushed records end up in "system tables": named tables grouped into
//! databases, each created with a fixed, versioned schema. This crate keeps
//! them in a single redb file (or in memory) behind [`Catalog`].
//!
//! ## Features
//!
//! - **SystemTableStore trait**: What the flush engine needs from a destination
//! - **Catalog**: redb implementation, also the query side (`list_tables`, `scan`, `count`)
//! - **CreateOutcome**: Tagged result of idempotent table creation
//!
//! ## Example
//!
//! ```rust,ignore
//! use partlog_core::{LogElement, PartLogElement, TableRef};
//! use partlog_storage::{Catalog, CreateOutcome};
//!
//! let catalog = Catalog::open_in_memory()?;
//! let table = TableRef::new("system", "part_log");
//!
//! let outcome = catalog.create_table_if_not_exists(&table, &PartLogElement::schema())?;
//! assert_eq!(outcome, CreateOutcome::Created);
//!
//! catalog.insert_batch(&table, &[PartLogElement::new_part("default", "t", "all_1_1_0")])?;
//! let rows: Vec<PartLogElement> = catalog.scan(&table)?;
//! ```

pub mod catalog;
pub mod error;

// Re-exports
pub use catalog::{Catalog, CatalogConfig, CreateOutcome};
pub use error::StorageError;

use partlog_core::{TableRef, TableSchema};

/// Destination of flushed log batches
///
/// Implementations must make [`create_table_if_not_exists`] safe to call
/// concurrently for the same table: all callers succeed and the table is
/// created once. Rows arrive pre-encoded so the trait stays object-safe.
///
/// [`create_table_if_not_exists`]: SystemTableStore::create_table_if_not_exists
pub trait SystemTableStore: Send + Sync + 'static {
    /// Schema of an existing table, `None` when the table does not exist
    ///
    /// Read-only; used as the exists-check before any creation attempt.
    fn table_schema(&self, table: &TableRef) -> Result<Option<TableSchema>, StorageError>;

    /// Create a table unless it already exists with `schema`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DatabaseNotFound`] if the table's database
    /// has not been created, or a database error on I/O failure.
    fn create_table_if_not_exists(
        &self,
        table: &TableRef,
        schema: &TableSchema,
    ) -> Result<CreateOutcome, StorageError>;

    /// Append a batch of rows atomically
    ///
    /// Either all rows become visible or none do.
    fn insert_encoded(
        &self,
        table: &TableRef,
        schema: &TableSchema,
        rows: &[Vec<u8>],
    ) -> Result<usize, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the SystemTableStore trait is object-safe
    fn _assert_object_safe(_: &dyn SystemTableStore) {}

    #[test]
    fn test_catalog_behind_trait_object() {
        use partlog_core::{LogElement, PartLogElement};
        use std::sync::Arc;

        let store: Arc<dyn SystemTableStore> = Arc::new(Catalog::open_in_memory().unwrap());
        let table = TableRef::new("system", "part_log");
        let schema = PartLogElement::schema();

        assert_eq!(store.table_schema(&table).unwrap(), None);
        assert_eq!(
            store.create_table_if_not_exists(&table, &schema).unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            store
                .insert_encoded(&table, &schema, &[vec![1, 2, 3], vec![4, 5]])
                .unwrap(),
            2
        );
        assert_eq!(store.table_schema(&table).unwrap(), Some(schema));
    }
}
