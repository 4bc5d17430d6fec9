//! Catalog table persistence
//!
//! Reads and writes the table as a CSV file, one sheet per file. Every save
//! rewrites the whole file using atomic writes (write to temp file, then
//! rename) so a crash never leaves a half-written table behind.
//!
//! Storage location: `<data_dir>/<sheet>.csv` (configurable via `Config`)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::table::Table;

/// Persistence handler for one catalog sheet
#[derive(Debug, Clone)]
pub struct TableFile {
    path: PathBuf,
}

impl TableFile {
    /// Handler for the table stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Handler for `sheet` inside the workbook directory `dir`
    pub fn for_sheet(dir: &Path, sheet: &str) -> Self {
        Self::new(dir.join(format!("{}.csv", sheet)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the table exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the table, creating it when absent
    ///
    /// A missing or empty file is (re)initialized with the canonical header
    /// and saved. A header lacking any required column is a schema error.
    pub fn load(&self) -> StorageResult<Table> {
        if !self.exists() {
            info!("Creating catalog table at {:?}", self.path);
            let table = Table::new();
            self.save(&table)?;
            return Ok(table);
        }

        let rows = self.read_rows()?;
        let headerless = rows.is_empty();

        let table = Table::from_rows(rows).map_err(|source| StorageError::Schema {
            path: self.path.clone(),
            source,
        })?;

        if headerless {
            info!("Writing canonical header to empty table {:?}", self.path);
            self.save(&table)?;
        }

        debug!("Loaded {} record(s) from {:?}", table.len(), self.path);
        Ok(table)
    }

    /// Save the full table, replacing the file atomically
    pub fn save(&self, table: &Table) -> StorageResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        writer
            .write_record(table.header())
            .map_err(|e| StorageError::from_csv(e, self.path.clone()))?;
        for row in table.rows() {
            writer
                .write_record(row)
                .map_err(|e| StorageError::from_csv(e, self.path.clone()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| StorageError::from_io(e.into_error(), self.path.clone()))?;

        atomic_write(&self.path, &bytes)?;
        debug!("Saved {} record(s) to {:?}", table.len(), self.path);
        Ok(())
    }

    fn read_rows(&self) -> StorageResult<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| StorageError::from_csv(e, self.path.clone()))?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| StorageError::from_csv(e, self.path.clone()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    // Same directory, so the rename stays on one filesystem
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    // Sync to disk before rename
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
