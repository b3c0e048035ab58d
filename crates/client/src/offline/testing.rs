//! Scripted network and fixtures shared by the offline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use quire_core::Error;
use url::Url;

use super::router::ShellManifest;
use crate::fetch::{Network, Request, Response};

pub(crate) const ORIGIN: &str = "https://app.test/";

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn shell() -> ShellManifest {
    ShellManifest::new(
        Url::parse(ORIGIN).unwrap(),
        vec!["/".into(), "/static/css/main.css".into(), "/admin".into(), "/offline".into()],
        "/offline",
        "/static/",
    )
}

/// Answers from a route table; unknown URLs get a 404.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    oversize: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_route(self, path: &str, response: Response) -> Self {
        self.set_route(path, response);
        self
    }

    pub(crate) fn set_route(&self, path: &str, response: Response) {
        self.routes.lock().unwrap().insert(url(path).to_string(), response);
    }

    /// Make one URL fail at the transport level.
    pub(crate) fn fail_route(&self, path: &str) {
        self.failing.lock().unwrap().insert(url(path).to_string());
    }

    /// Make one URL answer with a body over the size limit.
    pub(crate) fn oversize_route(&self, path: &str) {
        self.oversize.lock().unwrap().insert(url(path).to_string());
    }

    /// Make every request fail at the transport level.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = request.url.to_string();

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&key) {
            return Err(Error::Network(format!("{key}: connection refused")));
        }

        if self.oversize.lock().unwrap().contains(&key) {
            return Err(Error::FetchTooLarge(format!("{key}: body over limit")));
        }

        let routes = self.routes.lock().unwrap();
        Ok(routes.get(&key).cloned().unwrap_or_else(|| Response::new(404, "not found")))
    }
}
