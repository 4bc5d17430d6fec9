//! Storage layer
//!
//! Handles the catalog table on disk.
//!
//! ## Architecture
//!
//! - **TableFile**: CSV file, one per sheet, rewritten whole on every save
//! - **Table**: header-indexed rows held in memory between load and save
//! - **TableLock**: cross-process lock serializing every load/mutate/save

pub mod error;
pub mod file;
pub mod lock;
pub mod schema;
pub mod table;

pub use error::{SchemaError, StorageError, StorageResult};
pub use file::TableFile;
pub use lock::{LockGuard, TableLock};
pub use schema::{canonical_header, normalize_header, resolve, ColumnMap};
pub use table::Table;
