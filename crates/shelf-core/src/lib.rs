//! Shelf Core Library
//!
//! This crate provides the core functionality for shelf, a small library
//! catalog kept in a hand-editable CSV table.
//!
//! # Architecture
//!
//! - **Table file**: the CSV sheet is the source of truth; every operation
//!   reloads it under a cross-process lock and rewrites it whole
//! - **Positional ids**: a record's id is its 1-based row position
//!
//! # Quick Start
//!
//! ```text
//! let store = CatalogStore::open(&Config::load()?)?;
//!
//! // Add a book
//! let id = store.add(&NewRecord::new("Ethics"))?;
//!
//! // Carry out a translator intent
//! let dispatcher = Dispatcher::new(store);
//! let response = dispatcher.respond_json(r#"{"op":"get","id":"1"}"#);
//! ```
//!
//! # Modules
//!
//! - `store`: Record operations over the table (main entry point)
//! - `models`: Records, fields, change sets and search criteria
//! - `resolver`: Typed references to exactly one record
//! - `dispatch`: Intent parsing, normalization and responses
//! - `storage`: Table file, header schema and locking
//! - `config`: Application configuration

pub mod config;
pub mod dispatch;
pub mod models;
pub mod resolver;
pub mod storage;
pub mod store;

pub use config::Config;
pub use dispatch::{DispatchError, Dispatcher, ErrorKind, Intent, Response};
pub use models::{Changes, Criteria, Field, NewRecord, Record, Value};
pub use resolver::{RefKind, Reference, ReferenceResolver, ResolveError};
pub use storage::{SchemaError, StorageError};
pub use store::CatalogStore;
