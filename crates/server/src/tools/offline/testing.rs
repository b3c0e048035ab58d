//! Worker fixture for the offline tool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use quire_client::fetch::parse_origin;
use quire_client::{LifecycleController, Network, Request, Response, ShellManifest};
use quire_core::{Error, MemoryStorage};

/// Echoes the request path as the body; 404 for paths under `/missing`.
#[derive(Default)]
pub(crate) struct EchoNetwork {
    offline: AtomicBool,
}

impl EchoNetwork {
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for EchoNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        let path = request.url.path();
        let status = if path.starts_with("/missing") { 404 } else { 200 };
        Ok(Response::new(status, path.to_string()).with_header("content-type", "text/plain"))
    }
}

pub(crate) fn worker(tag: &str) -> (Arc<EchoNetwork>, LifecycleController) {
    let network = Arc::new(EchoNetwork::default());
    let shell = ShellManifest::new(
        parse_origin("https://app.test").unwrap(),
        vec!["/".into(), "/static/app.js".into(), "/offline".into()],
        "/offline",
        "/static/",
    );
    let controller = LifecycleController::new(Arc::new(MemoryStorage::new()), network.clone(), shell, tag);
    (network, controller)
}
