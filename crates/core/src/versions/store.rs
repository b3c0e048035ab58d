//! Per-document version logs.
//!
//! All logs are persisted as one JSON object keyed by document id under a
//! single storage key. A save reads that object, prepends to one document's
//! log, trims it to the cap and writes the whole object back.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};

use super::diff::{DiffRecord, diff_lines};
use super::hash::content_hash;
use crate::config::AppConfig;
use crate::storage::Storage;
use crate::Error;

pub const DEFAULT_VERSIONS_KEY: &str = "document_versions";
pub const DEFAULT_MAX_VERSIONS: usize = 20;

const DEFAULT_USER: &str = "Anonymous";
const DEFAULT_COMMENT: &str = "Auto-saved";
const EVENT_CAPACITY: usize = 64;

/// A saved snapshot of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Millisecond timestamp, strictly increasing within a document.
    pub id: i64,
    pub document_id: String,
    pub content: String,
    /// ISO-8601 creation time, derived from `id`.
    pub timestamp: String,
    pub user: String,
    pub comment: String,
    /// UTF-8 length of `content`.
    pub size_bytes: usize,
    pub content_hash: String,
}

/// Optional attribution attached to a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMetadata {
    pub user: Option<String>,
    pub comment: Option<String>,
}

impl VersionMetadata {
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self { user: None, comment: Some(comment.into()) }
    }
}

/// Two versions and the positional diff from the first to the second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    pub version_a: Version,
    pub version_b: Version,
    pub diff: Vec<DiffRecord>,
}

/// Notifications for editing surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionEvent {
    Saved { document_id: String, version_id: i64 },
    Restored { document_id: String, content: String },
}

type VersionLogs = BTreeMap<String, Vec<Version>>;

/// Capped, deduplicating version history for many documents.
pub struct VersionStore {
    storage: Arc<dyn Storage>,
    key: String,
    max_versions: usize,
    /// Serializes read-modify-write cycles; holds the last issued id.
    writer: Mutex<i64>,
    events: broadcast::Sender<VersionEvent>,
}

impl VersionStore {
    /// Store with the default key and a cap of 20 versions per document.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_options(storage, DEFAULT_VERSIONS_KEY, DEFAULT_MAX_VERSIONS)
    }

    pub fn with_options(storage: Arc<dyn Storage>, key: impl Into<String>, max_versions: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { storage, key: key.into(), max_versions: max_versions.max(1), writer: Mutex::new(0), events }
    }

    pub fn from_config(storage: Arc<dyn Storage>, config: &AppConfig) -> Self {
        Self::with_options(storage, config.versions_key.clone(), config.max_versions)
    }

    /// Receive save and restore notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<VersionEvent> {
        self.events.subscribe()
    }

    async fn load(&self) -> Result<VersionLogs, Error> {
        match self.storage.get(&self.key).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(VersionLogs::new()),
        }
    }

    async fn persist(&self, logs: &VersionLogs) -> Result<(), Error> {
        let json = serde_json::to_string(logs)?;
        self.storage.set(&self.key, &json).await
    }

    /// Save `content` as the newest version of `document_id`.
    ///
    /// Returns `Ok(None)` when the newest existing version already has the
    /// same content hash; nothing is written in that case.
    pub async fn save_version(
        &self, document_id: &str, content: &str, metadata: VersionMetadata,
    ) -> Result<Option<Version>, Error> {
        if document_id.is_empty() {
            return Err(Error::InvalidInput("document_id cannot be empty".into()));
        }

        let mut last_id = self.writer.lock().await;
        self.save_locked(&mut last_id, document_id, content, metadata).await
    }

    /// Save path shared by `save_version` and `restore`; the caller holds the writer lock.
    async fn save_locked(
        &self, last_id: &mut i64, document_id: &str, content: &str, metadata: VersionMetadata,
    ) -> Result<Option<Version>, Error> {
        let hash = content_hash(content);
        let mut logs = self.load().await?;
        let log = logs.entry(document_id.to_string()).or_default();

        if log.first().is_some_and(|head| head.content_hash == hash) {
            tracing::debug!(document_id, hash = %hash, "content unchanged, skipping save");
            return Ok(None);
        }

        let head_id = log.first().map_or(0, |head| head.id);
        let id = Utc::now().timestamp_millis().max(*last_id + 1).max(head_id + 1);
        let timestamp = DateTime::<Utc>::from_timestamp_millis(id)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let version = Version {
            id,
            document_id: document_id.to_string(),
            content: content.to_string(),
            timestamp,
            user: metadata.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
            comment: metadata.comment.unwrap_or_else(|| DEFAULT_COMMENT.to_string()),
            size_bytes: content.len(),
            content_hash: hash,
        };

        log.insert(0, version.clone());
        log.truncate(self.max_versions);

        self.persist(&logs).await?;
        *last_id = id;

        tracing::debug!(document_id, version_id = id, size = version.size_bytes, "saved version");
        let _ = self.events.send(VersionEvent::Saved { document_id: document_id.to_string(), version_id: id });

        Ok(Some(version))
    }

    /// Versions of a document, newest first. Empty for unknown documents.
    pub async fn list_versions(&self, document_id: &str) -> Result<Vec<Version>, Error> {
        let mut logs = self.load().await?;
        Ok(logs.remove(document_id).unwrap_or_default())
    }

    /// Ids of every document with at least one saved version.
    pub async fn document_ids(&self) -> Result<Vec<String>, Error> {
        let logs = self.load().await?;
        Ok(logs.into_iter().filter(|(_, log)| !log.is_empty()).map(|(id, _)| id).collect())
    }

    /// Look up one version.
    ///
    /// # Errors
    ///
    /// `DocumentNotFound` when the document has no log, `VersionNotFound`
    /// when the log lacks `version_id`.
    pub async fn get_version(&self, document_id: &str, version_id: i64) -> Result<Version, Error> {
        let log = self.list_versions(document_id).await?;
        find_version(document_id, &log, version_id).cloned()
    }

    /// Restore `version_id`, first snapshotting the current head.
    ///
    /// The snapshot goes through the normal save path, so when the head is
    /// already persisted it is a no-op and the pre-restore state stays the
    /// newest version. Returns the restored content for the editor to load.
    pub async fn restore_version(&self, document_id: &str, version_id: i64) -> Result<String, Error> {
        self.restore(document_id, version_id, None).await
    }

    /// Restore `version_id`, first saving the caller's unsaved `working` copy.
    pub async fn restore_version_over(
        &self, document_id: &str, version_id: i64, working: &str,
    ) -> Result<String, Error> {
        self.restore(document_id, version_id, Some(working)).await
    }

    async fn restore(&self, document_id: &str, version_id: i64, working: Option<&str>) -> Result<String, Error> {
        let mut last_id = self.writer.lock().await;
        let log = self.list_versions(document_id).await?;
        let target = find_version(document_id, &log, version_id)?.clone();

        let current = match working {
            Some(content) => content,
            None => log.first().map(|head| head.content.as_str()).unwrap_or_default(),
        };
        let comment = format!("Restored from version {}", display_timestamp(&target.timestamp));
        self.save_locked(&mut last_id, document_id, current, VersionMetadata::with_comment(comment))
            .await?;
        drop(last_id);

        tracing::info!(document_id, version_id, "restored version");
        let _ = self.events.send(VersionEvent::Restored {
            document_id: document_id.to_string(),
            content: target.content.clone(),
        });

        Ok(target.content)
    }

    /// Diff two versions of the same document, `version_a` as the old side.
    pub async fn compare_versions(
        &self, document_id: &str, version_a: i64, version_b: i64,
    ) -> Result<VersionComparison, Error> {
        let log = self.list_versions(document_id).await?;
        let a = find_version(document_id, &log, version_a)?.clone();
        let b = find_version(document_id, &log, version_b)?.clone();
        let diff = diff_lines(&a.content, &b.content);

        Ok(VersionComparison { version_a: a, version_b: b, diff })
    }
}

fn find_version<'a>(document_id: &str, log: &'a [Version], version_id: i64) -> Result<&'a Version, Error> {
    if log.is_empty() {
        return Err(Error::DocumentNotFound(document_id.to_string()));
    }
    log.iter()
        .find(|v| v.id == version_id)
        .ok_or_else(|| Error::VersionNotFound { document_id: document_id.to_string(), version_id })
}

fn display_timestamp(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
