//! Persistent key-value storage port.
//!
//! Version logs and cache generations both live in one string-keyed store.
//! The [`Storage`] trait is the seam: production code uses the SQLite-backed
//! [`SqliteStorage`], tests substitute [`MemoryStorage`].
//!
//! Prefix operations exist so a whole cache generation can be enumerated or
//! dropped without the caller tracking individual keys.

pub mod connection;
pub mod memory;

use async_trait::async_trait;

use crate::Error;

pub use connection::SqliteStorage;
pub use memory::MemoryStorage;

/// String-keyed storage with whole-value reads and writes.
///
/// Every method is a single atomic step against the backing store; there is
/// no multi-key transaction.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, Error>;

    /// List every key starting with `prefix`, in ascending order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, Error>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, Error>;
}
