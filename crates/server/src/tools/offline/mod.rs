//! Tools that drive the offline caching layer.

pub mod fetch;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{OfflineFetchParams, fetch_impl};
pub use status::{CacheStatusParams, status_impl};
