//! Catalog store
//!
//! The `CatalogStore` exposes record operations over the table file. Each
//! call is atomic on its own: it takes the table lock, loads the whole table
//! fresh from disk, applies its change, saves, and releases the lock. There
//! is no cache, so a call never sees state older than the last save by any
//! process that respects the lock.
//!
//! ## Positional ids
//!
//! A record's id is its 1-based position in the table. Deleting a record
//! renumbers every record after it, so an id held across a delete may name a
//! different record afterwards.
//!
//! ## Usage
//!
//! ```ignore
//! let store = CatalogStore::open(&Config::load()?)?;
//!
//! let id = store.add(&NewRecord::new("Ethics"))?;
//! let record = store.get_by_id(id)?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::models::{Changes, Criteria, Field, NewRecord, Record, Value};
use crate::storage::{StorageResult, Table, TableFile, TableLock};

/// Bounds applied to the `find` limit
pub const FIND_LIMIT_RANGE: (usize, usize) = (1, 50);

/// Bounds applied to the `last` count
pub const LAST_RANGE: (usize, usize) = (1, 200);

/// Record store over a single table file
///
/// Holds no table state between calls, so clones are cheap and may be used
/// from several threads at once; the table lock serializes them.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    file: TableFile,
    lock: TableLock,
}

impl CatalogStore {
    /// Open the store described by `config`
    ///
    /// Creates the table if it does not exist yet and validates its header.
    /// A table that cannot be read or lacks required columns is an error
    /// here, before any operation runs.
    pub fn open(config: &Config) -> StorageResult<Self> {
        let store = Self::with_path(config.table_path(), config.lock_timeout());
        let count = store.count()?;
        info!(
            "Opened catalog {:?} (sheet '{}', {} records)",
            store.path(),
            config.sheet,
            count
        );
        Ok(store)
    }

    /// Store over the table at `path`, locking with the given timeout
    pub fn with_path(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let file = TableFile::new(path);
        let lock = TableLock::for_table(file.path(), lock_timeout);
        Self { file, lock }
    }

    /// Path of the table file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Path of the lock file
    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }

    // ==================== Queries ====================

    /// Number of records
    pub fn count(&self) -> StorageResult<usize> {
        self.read(|table| table.len())
    }

    /// Get a record by id
    pub fn get_by_id(&self, id: u32) -> StorageResult<Option<Record>> {
        debug!("get_by_id({})", id);
        self.read(|table| table.position(id).map(|i| table.record(i)))
    }

    /// Records matching every criterion, in table order
    ///
    /// `limit` is clamped to [`FIND_LIMIT_RANGE`]. Empty criteria match
    /// nothing rather than everything.
    pub fn find(&self, criteria: &Criteria, limit: usize) -> StorageResult<Vec<Record>> {
        if criteria.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(FIND_LIMIT_RANGE.0, FIND_LIMIT_RANGE.1);
        debug!("find({:?}, limit {})", criteria, limit);

        self.read(|table| {
            (0..table.len())
                .filter(|&i| criteria.matches(|field| table.cell(i, field).to_string()))
                .take(limit)
                .map(|i| table.record(i))
                .collect()
        })
    }

    /// The final `n` records in table order
    ///
    /// `n` is clamped to [`LAST_RANGE`].
    pub fn last(&self, n: usize) -> StorageResult<Vec<Record>> {
        let n = n.clamp(LAST_RANGE.0, LAST_RANGE.1);
        self.read(|table| {
            let start = table.len().saturating_sub(n);
            (start..table.len()).map(|i| table.record(i)).collect()
        })
    }

    /// Every record, in table order
    pub fn all(&self) -> StorageResult<Vec<Record>> {
        self.read(|table| table.records().collect())
    }

    // ==================== Mutations ====================

    /// Append a record and return its id (previous record count + 1)
    pub fn add(&self, record: &NewRecord) -> StorageResult<u32> {
        let id = self.write(|table| (table.push(record), true))?;
        info!("Added record {} ('{}')", id, record.title);
        Ok(id)
    }

    /// Apply `changes` to the record with `id`
    ///
    /// Returns `false` when no record has that id. An empty change set finds
    /// the record but leaves the file untouched.
    pub fn update_fields(&self, id: u32, changes: &Changes) -> StorageResult<bool> {
        self.apply(id, changes.entries())
    }

    /// Set both shelf placement fields of a record
    pub fn set_position(&self, id: u32, row: u32, column: u32) -> StorageResult<bool> {
        self.apply(
            id,
            &[
                (Field::Row, Value::Integer(row.into())),
                (Field::Column, Value::Integer(column.into())),
            ],
        )
    }

    /// Set the ISBN of a record
    pub fn set_isbn(&self, id: u32, isbn: &str) -> StorageResult<bool> {
        self.apply(id, &[(Field::Isbn, Value::Text(isbn.to_string()))])
    }

    /// Delete the record with `id` and renumber every later record
    ///
    /// Returns `false` when no record has that id.
    pub fn delete_and_compact(&self, id: u32) -> StorageResult<bool> {
        let deleted = self.write(|table| match table.position(id) {
            Some(index) => {
                table.remove(index);
                table.renumber();
                (true, true)
            }
            None => (false, false),
        })?;

        if deleted {
            info!("Deleted record {} and renumbered the catalog", id);
        }
        Ok(deleted)
    }

    fn apply(&self, id: u32, entries: &[(Field, Value)]) -> StorageResult<bool> {
        let found = self.write(|table| {
            let Some(index) = table.position(id) else {
                return (false, false);
            };
            for (field, value) in entries {
                table.set(index, *field, value);
            }
            (true, !entries.is_empty())
        })?;

        if found && !entries.is_empty() {
            info!("Updated record {} ({} field(s))", id, entries.len());
        }
        Ok(found)
    }

    // ==================== Locking ====================

    fn read<T>(&self, f: impl FnOnce(&Table) -> T) -> StorageResult<T> {
        let _guard = self.lock.acquire()?;
        let table = self.file.load()?;
        Ok(f(&table))
    }

    /// Run `f` on a fresh copy of the table and save it if `f` reports a change
    fn write<T>(&self, f: impl FnOnce(&mut Table) -> (T, bool)) -> StorageResult<T> {
        let _guard = self.lock.acquire()?;
        let mut table = self.file.load()?;
        let (result, dirty) = f(&mut table);
        if dirty {
            self.file.save(&table)?;
        }
        Ok(result)
    }
}
