//! Client side of quire: the HTTP transport and the offline caching layer
//! that sits in front of it.

pub mod fetch;
pub mod offline;

pub use fetch::{FetchClient, FetchConfig, Network, Request, Response};
pub use offline::{BucketManager, FetchRouter, LifecycleController, Phase, ShellManifest, WorkerEvent};
