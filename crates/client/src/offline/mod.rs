//! Offline-first request interception.
//!
//! [`LifecycleController`] sequences install and activation for one build
//! version, [`FetchRouter`] applies the cache strategies once the controller
//! is active, and [`BucketManager`] owns the versioned generations underneath.

pub mod bucket;
pub mod lifecycle;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use bucket::{BucketManager, CacheRole, Generation, PopulateReport, request_key};
pub use lifecycle::{LifecycleController, NoopSync, Phase, SYNC_SUBMISSIONS_TAG, SyncHook};
pub use router::{FetchRouter, ShellManifest, Strategy, Treatment};

/// Notification sent to pages controlled by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The shell was pre-cached into a new static generation.
    Installed { version_tag: String, cached: usize },
    /// A newer build installed while older generations are still registered.
    UpdateAvailable { version_tag: String },
    /// Stale generations were retired and this build took control.
    Activated { version_tag: String, retired: Vec<String> },
    /// Network reachability changed, as observed by routed fetches.
    Connectivity { online: bool },
    SyncRequested { tag: String },
}
