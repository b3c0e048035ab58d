//! Per-request strategy selection.
//!
//! Rules, first match wins:
//!
//! | Request | Bucket | Strategy |
//! |---------|--------|----------|
//! | non-GET, or non-http(s) scheme | none | passthrough |
//! | image destination or image file extension | images | cache-first |
//! | under the assets prefix or in the shell list | static | cache-first |
//! | anything else | dynamic | network-first |
//!
//! Cache-first and network-first always produce a response; only
//! passthrough requests can surface a network error to the page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use quire_core::{AppConfig, Error};
use regex::Regex;
use reqwest::Method;
use tokio::sync::broadcast;
use url::Url;

use super::WorkerEvent;
use super::bucket::{BucketManager, CacheRole};
use crate::fetch::{Destination, Network, Request, Response, parse_origin, resolve};

static IMAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(png|jpe?g|gif|svg|webp|avif|ico|bmp)$").expect("image path pattern is valid")
});

/// Order in which the cache and the network are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
}

/// How one request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Treatment {
    /// Not intercepted; goes straight to the network.
    Passthrough,
    Cached { role: CacheRole, strategy: Strategy },
}

/// The fixed set of resources required to render offline.
#[derive(Debug, Clone)]
pub struct ShellManifest {
    origin: Url,
    resources: Vec<String>,
    offline_page: String,
    assets_prefix: String,
}

impl ShellManifest {
    pub fn new(
        origin: Url, resources: Vec<String>, offline_page: impl Into<String>, assets_prefix: impl Into<String>,
    ) -> Self {
        Self { origin, resources, offline_page: offline_page.into(), assets_prefix: assets_prefix.into() }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(
            origin,
            config.shell_resources.clone(),
            config.offline_page.clone(),
            config.assets_prefix.clone(),
        ))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Whether `url` is one of the shell resources.
    pub fn contains(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin() && self.resources.iter().any(|path| path == url.path())
    }

    /// Whether `url` lives under the assets prefix of the application origin.
    pub fn is_asset(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin() && url.path().starts_with(&self.assets_prefix)
    }

    /// GET requests for every shell resource.
    pub fn requests(&self) -> Result<Vec<Request>, Error> {
        self.resources
            .iter()
            .map(|path| {
                resolve(&self.origin, path)
                    .map(Request::get)
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect()
    }

    /// The request under which the offline page is cached.
    pub fn offline_request(&self) -> Result<Request, Error> {
        resolve(&self.origin, &self.offline_page)
            .map(Request::get)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.offline_page)))
    }
}

/// Dispatches intercepted requests to a cache strategy.
pub struct FetchRouter {
    buckets: BucketManager,
    network: Arc<dyn Network>,
    shell: ShellManifest,
    online: AtomicBool,
    events: broadcast::Sender<WorkerEvent>,
}

impl FetchRouter {
    pub fn new(
        buckets: BucketManager, network: Arc<dyn Network>, shell: ShellManifest,
        events: broadcast::Sender<WorkerEvent>,
    ) -> Self {
        Self { buckets, network, shell, online: AtomicBool::new(true), events }
    }

    /// Build version whose generations this router reads and fills.
    pub fn version_tag(&self) -> &str {
        self.buckets.current_tag()
    }

    /// Connectivity as last observed by a network attempt.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn classify(&self, request: &Request) -> Treatment {
        if request.method != Method::GET || !matches!(request.url.scheme(), "http" | "https") {
            return Treatment::Passthrough;
        }

        if request.destination == Destination::Image || IMAGE_PATH.is_match(request.url.path()) {
            return Treatment::Cached { role: CacheRole::Image, strategy: Strategy::CacheFirst };
        }

        if self.shell.is_asset(&request.url) || self.shell.contains(&request.url) {
            return Treatment::Cached { role: CacheRole::Static, strategy: Strategy::CacheFirst };
        }

        Treatment::Cached { role: CacheRole::Dynamic, strategy: Strategy::NetworkFirst }
    }

    /// Answer one request.
    ///
    /// # Errors
    ///
    /// Only passthrough requests fail; their network error is returned unmodified.
    pub async fn handle(&self, request: &Request) -> Result<Response, Error> {
        match self.classify(request) {
            Treatment::Passthrough => {
                let result = self.network.fetch(request).await;
                self.note_connectivity(!matches!(result, Err(Error::Network(_))));
                result
            }
            Treatment::Cached { role, strategy: Strategy::CacheFirst } => Ok(self.cache_first(request, role).await),
            Treatment::Cached { role, strategy: Strategy::NetworkFirst } => Ok(self.network_first(request, role).await),
        }
    }

    async fn cache_first(&self, request: &Request, role: CacheRole) -> Response {
        if let Some(cached) = self.lookup(request).await {
            return cached;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.note_connectivity(true);
                self.store(role, request, &response).await;
                response
            }
            Err(e @ Error::Network(_)) => {
                tracing::warn!(url = %request.url, error = %e, "cache-first fetch failed, serving offline page");
                self.note_connectivity(false);
                self.offline_fallback().await.unwrap_or_else(Response::network_error)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache-first fetch rejected");
                Response::network_error()
            }
        }
    }

    async fn network_first(&self, request: &Request, role: CacheRole) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.note_connectivity(true);
                self.store(role, request, &response).await;
                response
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network-first fetch failed, trying cache");
                let offline = matches!(e, Error::Network(_));
                if offline {
                    self.note_connectivity(false);
                }

                if let Some(cached) = self.lookup(request).await {
                    return cached;
                }
                if offline
                    && request.is_navigation()
                    && let Some(page) = self.offline_fallback().await
                {
                    return page;
                }
                Response::network_error()
            }
        }
    }

    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.buckets.lookup(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, role: CacheRole, request: &Request, response: &Response) {
        let generation = self.buckets.current(role);
        if let Err(e) = self.buckets.store(&generation, request, response).await {
            tracing::warn!(url = %request.url, error = %e, "failed to cache response");
        }
    }

    async fn offline_fallback(&self) -> Option<Response> {
        let request = match self.shell.offline_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "offline page is not addressable");
                return None;
            }
        };
        self.lookup(&request).await
    }

    fn note_connectivity(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) != online {
            tracing::info!(online, "connectivity changed");
            let _ = self.events.send(WorkerEvent::Connectivity { online });
        }
    }
}
