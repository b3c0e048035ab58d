//! Versioned cache generations over the storage port.
//!
//! A generation is named `<version-tag>-<role>` and lives in storage as a
//! registry record plus one entry per cached request:
//!
//! | Key | Value |
//! |-----|-------|
//! | `cache-bucket:<name>` | role, tag and creation time |
//! | `cache-entry:<name>:<sha256(identity)>` | request identity and response snapshot |
//!
//! | `cache-active` | version tag of the build that last finished activating |
//!
//! Retiring a generation removes its entry prefix and then its registry
//! record. Generations of the running tag are never touched by retirement.

use std::sync::Arc;

use futures_util::future::join_all;
use quire_core::{Error, Storage};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::fetch::{Network, Request, Response};

const REGISTRY_PREFIX: &str = "cache-bucket:";
const ENTRY_PREFIX: &str = "cache-entry:";
const ACTIVE_KEY: &str = "cache-active";

/// Which class of resources a generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheRole {
    Static,
    Dynamic,
    Image,
}

impl CacheRole {
    pub const ALL: [CacheRole; 3] = [CacheRole::Static, CacheRole::Dynamic, CacheRole::Image];

    /// Suffix used in generation names.
    pub fn suffix(self) -> &'static str {
        match self {
            CacheRole::Static => "static",
            CacheRole::Dynamic => "dynamic",
            CacheRole::Image => "images",
        }
    }
}

/// A named, versioned cache bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Generation {
    pub role: CacheRole,
    pub version_tag: String,
}

impl Generation {
    pub fn new(role: CacheRole, version_tag: impl Into<String>) -> Self {
        Self { role, version_tag: version_tag.into() }
    }

    /// `<version-tag>-<role>`, e.g. `quire-v2.0.0-static`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.version_tag, self.role.suffix())
    }

    fn registry_key(&self) -> String {
        format!("{REGISTRY_PREFIX}{}", self.name())
    }

    fn entry_prefix(&self) -> String {
        format!("{ENTRY_PREFIX}{}:", self.name())
    }

    fn entry_key(&self, request: &Request) -> String {
        format!("{}{}", self.entry_prefix(), request_key(request))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GenerationRecord {
    role: CacheRole,
    version_tag: String,
    created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    identity: String,
    stored_at: String,
    response: Response,
}

/// Content-addressed key for a request identity.
pub fn request_key(request: &Request) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(request.url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of pre-caching a resource list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// URLs stored into the generation.
    pub stored: Vec<String>,
    /// URLs that could not be cached, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Creates, fills, queries and retires cache generations.
#[derive(Clone)]
pub struct BucketManager {
    storage: Arc<dyn Storage>,
    current_tag: String,
}

impl BucketManager {
    /// `current_tag` is the running build's version; its generations are
    /// searched first on lookup.
    pub fn new(storage: Arc<dyn Storage>, current_tag: impl Into<String>) -> Self {
        Self { storage, current_tag: current_tag.into() }
    }

    pub fn current_tag(&self) -> &str {
        &self.current_tag
    }

    /// A manager over the same storage that treats `version_tag` as current.
    pub fn for_tag(&self, version_tag: impl Into<String>) -> Self {
        Self::new(self.storage.clone(), version_tag)
    }

    /// Tag of the build that most recently completed activation, if any.
    pub async fn active_tag(&self) -> Result<Option<String>, Error> {
        self.storage.get(ACTIVE_KEY).await
    }

    /// Record the current tag as the active build.
    pub async fn mark_active(&self) -> Result<(), Error> {
        self.storage.set(ACTIVE_KEY, &self.current_tag).await
    }

    /// The running build's generation for `role` (not necessarily created yet).
    pub fn current(&self, role: CacheRole) -> Generation {
        Generation::new(role, self.current_tag.clone())
    }

    /// Create the generation for `role` and `version_tag` unless it already exists.
    pub async fn ensure(&self, role: CacheRole, version_tag: &str) -> Result<Generation, Error> {
        let generation = Generation::new(role, version_tag);
        let key = generation.registry_key();

        if self.storage.get(&key).await?.is_none() {
            let record = GenerationRecord {
                role,
                version_tag: version_tag.to_string(),
                created_at: chrono::Utc::now().to_rfc3339(),
            };
            self.storage.set(&key, &serde_json::to_string(&record)?).await?;
            tracing::info!(generation = %generation.name(), "created cache generation");
        }

        Ok(generation)
    }

    /// Every registered generation, in name order.
    pub async fn generations(&self) -> Result<Vec<Generation>, Error> {
        let mut generations = Vec::new();
        for key in self.storage.keys(REGISTRY_PREFIX).await? {
            // a record can vanish between listing and reading while another task retires it
            if let Some(json) = self.storage.get(&key).await? {
                let record: GenerationRecord = serde_json::from_str(&json)?;
                generations.push(Generation::new(record.role, record.version_tag));
            }
        }
        Ok(generations)
    }

    /// Number of entries stored in `generation`.
    pub async fn entry_count(&self, generation: &Generation) -> Result<usize, Error> {
        Ok(self.storage.keys(&generation.entry_prefix()).await?.len())
    }

    /// Fetch every resource and store the cacheable responses.
    ///
    /// Resources are fetched concurrently and independently: a network
    /// failure or error status on one is recorded in the report and does not
    /// affect the rest. Storage failures abort with an error.
    pub async fn populate(
        &self, generation: &Generation, resources: &[Request], network: &dyn Network,
    ) -> Result<PopulateReport, Error> {
        let results = join_all(resources.iter().map(|request| network.fetch(request))).await;

        let mut report = PopulateReport::default();
        for (request, result) in resources.iter().zip(results) {
            let url = request.url.to_string();
            match result {
                Ok(response) if response.is_ok() => {
                    self.store(generation, request, &response).await?;
                    report.stored.push(url);
                }
                Ok(response) => {
                    tracing::warn!(url = %url, status = response.status, "not pre-caching error response");
                    report.failed.push((url, format!("status {}", response.status)));
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to pre-cache resource");
                    report.failed.push((url, e.to_string()));
                }
            }
        }

        tracing::info!(
            generation = %generation.name(),
            stored = report.stored.len(),
            failed = report.failed.len(),
            "populated cache generation"
        );

        Ok(report)
    }

    /// Delete every generation of `role` whose tag differs from `keep_tag`.
    ///
    /// Returns the names of the deleted generations.
    pub async fn retire_stale(&self, role: CacheRole, keep_tag: &str) -> Result<Vec<String>, Error> {
        let mut retired = Vec::new();
        for generation in self.generations().await? {
            if generation.role != role || generation.version_tag == keep_tag {
                continue;
            }
            let removed = self.storage.delete_prefix(&generation.entry_prefix()).await?;
            self.storage.delete(&generation.registry_key()).await?;
            tracing::info!(generation = %generation.name(), entries = removed, "retired stale cache generation");
            retired.push(generation.name());
        }
        Ok(retired)
    }

    /// Find a stored response for exactly this request identity.
    ///
    /// Generations of the current tag are searched first (static, dynamic,
    /// image), then any others still registered.
    pub async fn lookup(&self, request: &Request) -> Result<Option<Response>, Error> {
        if request.method != Method::GET {
            return Ok(None);
        }

        let mut generations = self.generations().await?;
        generations.sort_by_key(|g| (g.version_tag != self.current_tag, g.role));

        for generation in generations {
            if let Some(json) = self.storage.get(&generation.entry_key(request)).await? {
                let entry: StoredEntry = serde_json::from_str(&json)?;
                tracing::debug!(generation = %generation.name(), identity = %entry.identity, "cache hit");
                return Ok(Some(entry.response));
            }
        }

        Ok(None)
    }

    /// Store `response` for `request` in `generation`, creating the generation if needed.
    ///
    /// Only GET requests with a 2xx status are cacheable; anything else is
    /// skipped and reported as `false`.
    pub async fn store(&self, generation: &Generation, request: &Request, response: &Response) -> Result<bool, Error> {
        if request.method != Method::GET || !response.is_ok() {
            tracing::debug!(identity = %request.identity(), status = response.status, "response not cacheable");
            return Ok(false);
        }

        self.ensure(generation.role, &generation.version_tag).await?;

        let entry = StoredEntry {
            identity: request.identity(),
            stored_at: chrono::Utc::now().to_rfc3339(),
            response: response.clone(),
        };
        self.storage
            .set(&generation.entry_key(request), &serde_json::to_string(&entry)?)
            .await?;

        Ok(true)
    }
}
