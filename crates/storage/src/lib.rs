//! Storage abstraction and implementations for traintrack.
//!
//! This crate provides a trait-based storage interface with a JSON-file
//! reference implementation and an optional SQLite backend.

#![warn(missing_docs)]

pub mod trait_;

#[cfg(feature = "json")]
pub mod json_storage;

#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{Result, Storage, StorageError};

#[cfg(feature = "json")]
pub use json_storage::JsonStorage;

#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStorage;
