//! Core types and shared functionality for quire.
//!
//! This crate provides:
//! - The key-value storage port with SQLite and in-memory backends
//! - Document version history (hashing, positional diff, capped logs)
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod storage;
pub mod versions;

pub use config::AppConfig;
pub use error::Error;
pub use storage::{MemoryStorage, SqliteStorage, Storage};
pub use versions::{Version, VersionMetadata, VersionStore};
