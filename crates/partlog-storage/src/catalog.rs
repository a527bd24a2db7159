//! redb-backed catalog of databases and system tables
//!
//! Everything lives in a single redb file:
//!
//! ```text
//! databases                  name -> creation time (Unix millis)
//! tables                     "db.table" -> TableMeta (schema + creation time)
//! data.<db>.<table>          row id (u64, insertion order) -> postcard row
//! ```
//!
//! A table "exists" when it has an entry in `tables`. Row ids are allocated
//! inside the inserting write transaction, so rows come back from [`Catalog::scan`]
//! in the order they were inserted.

use std::path::PathBuf;
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::{
    Database, ReadTransaction, ReadableTable, ReadableTableMetadata, TableDefinition, TableError,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use partlog_core::{DEFAULT_DATABASE, LogElement, TableRef, TableSchema, validate_identifier};

use crate::SystemTableStore;
use crate::error::StorageError;

// Key: database name, Value: creation time (Unix millis)
const DATABASES: TableDefinition<&str, i64> = TableDefinition::new("databases");

// Key: "database.table", Value: serialized TableMeta
const TABLES: TableDefinition<&str, &[u8]> = TableDefinition::new("tables");

type RowTable<'a> = TableDefinition<'a, u64, &'static [u8]>;

fn data_table_name(table: &TableRef) -> String {
    format!("data.{}", table)
}

/// Outcome of [`Catalog::create_table_if_not_exists`]
///
/// Every variant means the table is usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call created the table
    Created,
    /// The table was already there with the requested schema
    AlreadyExists,
    /// A table with a different schema was renamed out of the way and a
    /// fresh one created
    Recreated { renamed_to: String },
}

impl CreateOutcome {
    /// Whether a new table came into existence
    pub fn is_new(&self) -> bool {
        !matches!(self, Self::AlreadyExists)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableMeta {
    schema: TableSchema,
    created_at_millis: i64,
}

/// Configuration for the catalog
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
    /// Keep everything in memory and ignore `db_path`
    pub in_memory: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/partlog.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
            in_memory: false,
        }
    }
}

impl CatalogConfig {
    /// A file-backed catalog at `db_path`
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// A catalog that lives and dies with the process
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            cache_size: 16 * 1024 * 1024,
            ..Default::default()
        }
    }
}

/// Databases and system tables holding flushed log records
#[derive(Clone)]
pub struct Catalog {
    db: Arc<Database>,
    config: CatalogConfig,
}

impl Catalog {
    /// Open or create the catalog
    #[instrument(skip(config), fields(path = %config.db_path.display(), in_memory = config.in_memory))]
    pub fn open(config: CatalogConfig) -> Result<Self, StorageError> {
        let mut builder = Database::builder();
        builder.set_cache_size(config.cache_size);

        let db = if config.in_memory {
            builder.create_with_backend(InMemoryBackend::new())?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            builder.create(&config.db_path)?
        };

        let catalog = Self {
            db: Arc::new(db),
            config,
        };
        catalog.init_tables()?;

        info!("Opened catalog");
        Ok(catalog)
    }

    /// Open a throwaway in-memory catalog
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::open(CatalogConfig::in_memory())
    }

    /// Create the bookkeeping tables and the `system` database
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.open_table(TABLES)?;
            let mut databases = write_txn.open_table(DATABASES)?;
            if databases.get(DEFAULT_DATABASE)?.is_none() {
                databases.insert(DEFAULT_DATABASE, chrono::Utc::now().timestamp_millis())?;
            }
        }
        write_txn.commit()?;

        debug!("Initialized catalog tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Create a database; returns false if it already existed
    pub fn create_database(&self, name: &str) -> Result<bool, StorageError> {
        validate_identifier(name)?;

        let write_txn = self.db.begin_write()?;
        let created = {
            let mut databases = write_txn.open_table(DATABASES)?;
            if databases.get(name)?.is_some() {
                false
            } else {
                databases.insert(name, chrono::Utc::now().timestamp_millis())?;
                true
            }
        };
        write_txn.commit()?;

        if created {
            info!(database = name, "Created database");
        }
        Ok(created)
    }

    pub fn database_exists(&self, name: &str) -> Result<bool, StorageError> {
        let read_txn = self.db.begin_read()?;
        let databases = read_txn.open_table(DATABASES)?;
        Ok(databases.get(name)?.is_some())
    }

    /// All database names, sorted
    pub fn list_databases(&self) -> Result<Vec<String>, StorageError> {
        let read_txn = self.db.begin_read()?;
        let databases = read_txn.open_table(DATABASES)?;

        let mut names = Vec::new();
        for entry in databases.iter()? {
            let (name, _) = entry?;
            names.push(name.value().to_string());
        }
        Ok(names)
    }

    /// Table names in `database`, sorted
    pub fn list_tables(&self, database: &str) -> Result<Vec<String>, StorageError> {
        let read_txn = self.db.begin_read()?;
        if read_txn.open_table(DATABASES)?.get(database)?.is_none() {
            return Err(StorageError::DatabaseNotFound(database.to_string()));
        }

        let tables = read_txn.open_table(TABLES)?;
        let prefix = format!("{}.", database);

        let mut names = Vec::new();
        for entry in tables.range(prefix.as_str()..)? {
            let (key, _) = entry?;
            let key = key.value();

            // Stop when we're past the prefix
            let Some(name) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            names.push(name.to_string());
        }
        Ok(names)
    }

    pub fn table_exists(&self, table: &TableRef) -> Result<bool, StorageError> {
        let read_txn = self.db.begin_read()?;
        Ok(Self::read_meta(&read_txn, table)?.is_some())
    }

    /// Schema the table was created with
    pub fn table_schema(&self, table: &TableRef) -> Result<Option<TableSchema>, StorageError> {
        let read_txn = self.db.begin_read()?;
        Ok(Self::read_meta(&read_txn, table)?.map(|meta| meta.schema))
    }

    fn read_meta(
        read_txn: &ReadTransaction,
        table: &TableRef,
    ) -> Result<Option<TableMeta>, StorageError> {
        let tables = read_txn.open_table(TABLES)?;
        let key = table.to_string();
        match tables.get(key.as_str())? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Create `table` with `schema` unless it already exists
    ///
    /// Safe to race: redb runs one write transaction at a time, and the
    /// existence check is repeated inside it, so exactly one caller sees
    /// [`CreateOutcome::Created`] and the rest see
    /// [`CreateOutcome::AlreadyExists`].
    ///
    /// A table that exists with a different schema is renamed to the first
    /// free `<table>_<N>` (rows included) and replaced by an empty one.
    #[instrument(skip(self, schema), fields(table = %table, version = schema.version))]
    pub fn create_table_if_not_exists(
        &self,
        table: &TableRef,
        schema: &TableSchema,
    ) -> Result<CreateOutcome, StorageError> {
        table.validate()?;

        // Read-only fast path, no writer involved
        {
            let read_txn = self.db.begin_read()?;
            if let Some(meta) = Self::read_meta(&read_txn, table)? {
                if meta.schema == *schema {
                    return Ok(CreateOutcome::AlreadyExists);
                }
            }
        }

        let write_txn = self.db.begin_write()?;
        let outcome = {
            if write_txn
                .open_table(DATABASES)?
                .get(table.database.as_str())?
                .is_none()
            {
                return Err(StorageError::DatabaseNotFound(table.database.clone()));
            }

            let mut tables = write_txn.open_table(TABLES)?;
            let key = table.to_string();
            let existing: Option<TableMeta> = match tables.get(key.as_str())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            let fresh = encode(&TableMeta {
                schema: schema.clone(),
                created_at_millis: chrono::Utc::now().timestamp_millis(),
            })?;

            match existing {
                Some(meta) if meta.schema == *schema => CreateOutcome::AlreadyExists,
                Some(meta) => {
                    let renamed = Self::free_name(&tables, table)?;
                    warn!(
                        old_version = meta.schema.version,
                        renamed_to = %renamed,
                        "Existing table has a different structure, renaming it"
                    );

                    let moved = Self::move_rows(&write_txn, table, &renamed)?;
                    tables.insert(renamed.to_string().as_str(), encode(&meta)?.as_slice())?;
                    tables.insert(key.as_str(), fresh.as_slice())?;
                    write_txn.open_table(RowTable::new(&data_table_name(table)))?;

                    debug!(rows = moved, "Moved rows to renamed table");
                    CreateOutcome::Recreated {
                        renamed_to: renamed.table,
                    }
                }
                None => {
                    write_txn.open_table(RowTable::new(&data_table_name(table)))?;
                    tables.insert(key.as_str(), fresh.as_slice())?;
                    CreateOutcome::Created
                }
            }
        };
        write_txn.commit()?;

        if outcome.is_new() {
            info!(outcome = ?outcome, "Created system table");
        }
        Ok(outcome)
    }

    /// First `<table>_<N>` not taken in the table's database
    fn free_name(
        tables: &redb::Table<'_, &'static str, &'static [u8]>,
        table: &TableRef,
    ) -> Result<TableRef, StorageError> {
        let mut n = 0u32;
        loop {
            let candidate = TableRef::new(table.database.clone(), format!("{}_{}", table.table, n));
            if tables.get(candidate.to_string().as_str())?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    fn move_rows(
        write_txn: &WriteTransaction,
        from: &TableRef,
        to: &TableRef,
    ) -> Result<usize, StorageError> {
        let from_name = data_table_name(from);
        let to_name = data_table_name(to);
        let source_def = RowTable::new(&from_name);

        let rows = {
            let source = write_txn.open_table(source_def)?;
            let mut rows = Vec::new();
            for entry in source.iter()? {
                let (id, value) = entry?;
                rows.push((id.value(), value.value().to_vec()));
            }
            rows
        };

        write_txn.delete_table(source_def)?;

        let mut target = write_txn.open_table(RowTable::new(&to_name))?;
        for (id, value) in &rows {
            target.insert(*id, value.as_slice())?;
        }
        Ok(rows.len())
    }

    /// Append pre-encoded rows to an existing table in one transaction
    ///
    /// Fails with [`StorageError::SchemaMismatch`] when the table was created
    /// with a different schema than the rows were encoded for.
    pub fn insert_encoded(
        &self,
        table: &TableRef,
        schema: &TableSchema,
        rows: &[Vec<u8>],
    ) -> Result<usize, StorageError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.begin_write()?;
        {
            let tables = write_txn.open_table(TABLES)?;
            let meta: TableMeta = match tables.get(table.to_string().as_str())? {
                Some(value) => decode(value.value())?,
                None => return Err(StorageError::table_not_found(&table.database, &table.table)),
            };

            if meta.schema != *schema {
                return Err(StorageError::SchemaMismatch {
                    database: table.database.clone(),
                    table: table.table.clone(),
                    expected: schema.version,
                    found: meta.schema.version,
                });
            }

            let name = data_table_name(table);
            let mut data = write_txn.open_table(RowTable::new(&name))?;
            let mut next = data.last()?.map(|(id, _)| id.value() + 1).unwrap_or(0);
            for row in rows {
                data.insert(next, row.as_slice())?;
                next += 1;
            }
        }
        write_txn.commit()?;

        debug!(table = %table, rows = rows.len(), "Inserted batch");
        Ok(rows.len())
    }

    /// Encode and append records of a [`LogElement`] type
    pub fn insert_batch<T: LogElement>(
        &self,
        table: &TableRef,
        rows: &[T],
    ) -> Result<usize, StorageError> {
        let encoded = rows.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        self.insert_encoded(table, &T::schema(), &encoded)
    }

    /// All rows of a table in insertion order
    pub fn scan<T: DeserializeOwned>(&self, table: &TableRef) -> Result<Vec<T>, StorageError> {
        let read_txn = self.db.begin_read()?;
        if Self::read_meta(&read_txn, table)?.is_none() {
            return Err(StorageError::table_not_found(&table.database, &table.table));
        }

        let name = data_table_name(table);
        let data = match read_txn.open_table(RowTable::new(&name)) {
            Ok(data) => data,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rows = Vec::new();
        for entry in data.iter()? {
            let (_, value) = entry?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }

    /// Number of rows in a table
    pub fn count(&self, table: &TableRef) -> Result<u64, StorageError> {
        let read_txn = self.db.begin_read()?;
        if Self::read_meta(&read_txn, table)?.is_none() {
            return Err(StorageError::table_not_found(&table.database, &table.table));
        }

        let name = data_table_name(table);
        match read_txn.open_table(RowTable::new(&name)) {
            Ok(data) => Ok(data.len()?),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a table and its rows; returns false if it did not exist
    pub fn drop_table(&self, table: &TableRef) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut tables = write_txn.open_table(TABLES)?;
            tables.remove(table.to_string().as_str())?.is_some()
        };
        if removed {
            write_txn.delete_table(RowTable::new(&data_table_name(table)))?;
        }
        write_txn.commit()?;

        if removed {
            info!(table = %table, "Dropped table");
        }
        Ok(removed)
    }
}

impl SystemTableStore for Catalog {
    fn table_schema(&self, table: &TableRef) -> Result<Option<TableSchema>, StorageError> {
        Catalog::table_schema(self, table)
    }

    fn create_table_if_not_exists(
        &self,
        table: &TableRef,
        schema: &TableSchema,
    ) -> Result<CreateOutcome, StorageError> {
        Catalog::create_table_if_not_exists(self, table, schema)
    }

    fn insert_encoded(
        &self,
        table: &TableRef,
        schema: &TableSchema,
        rows: &[Vec<u8>],
    ) -> Result<usize, StorageError> {
        Catalog::insert_encoded(self, table, schema, rows)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    postcard::to_allocvec(value).map_err(|e| StorageError::serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    Ok(postcard::from_bytes(bytes)?)
}
