//! version_list and version_get tool implementations.

use quire_core::versions::format_size;
use quire_core::{Version, VersionStore};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::require;
use crate::tools::json_result;

/// Parameters for the version_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionListParams {
    /// Document whose history to list. When omitted, lists the documents
    /// that have history instead.
    #[serde(default)]
    pub document_id: Option<String>,
}

/// One row of a history listing. Content is left out; fetch it with version_get.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionSummary {
    pub id: i64,
    pub timestamp: String,
    pub user: String,
    pub comment: String,
    pub size_bytes: usize,
    /// Human-readable size, e.g. "1.5 KB".
    pub size: String,
    pub content_hash: String,
}

impl From<&Version> for VersionSummary {
    fn from(version: &Version) -> Self {
        Self {
            id: version.id,
            timestamp: version.timestamp.clone(),
            user: version.user.clone(),
            comment: version.comment.clone(),
            size_bytes: version.size_bytes,
            size: format_size(version.size_bytes),
            content_hash: version.content_hash.clone(),
        }
    }
}

/// Output from the version_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionListOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Newest first.
    #[serde(default)]
    pub versions: Vec<VersionSummary>,
    #[serde(default)]
    pub documents: Vec<String>,
}

pub async fn list(store: &VersionStore, params: VersionListParams) -> Result<VersionListOutput, McpError> {
    match params.document_id {
        Some(document_id) => {
            require("document_id", &document_id)?;
            let versions = store.list_versions(&document_id).await?;
            Ok(VersionListOutput {
                versions: versions.iter().map(VersionSummary::from).collect(),
                document_id: Some(document_id),
                documents: Vec::new(),
            })
        }
        None => Ok(VersionListOutput { document_id: None, versions: Vec::new(), documents: store.document_ids().await? }),
    }
}

/// Implementation of the version_list tool.
pub async fn list_impl(store: &VersionStore, params: VersionListParams) -> Result<CallToolResult, McpError> {
    json_result(&list(store, params).await?)
}

/// Parameters for the version_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionGetParams {
    pub document_id: String,
    pub version_id: i64,
}

/// Implementation of the version_get tool.
pub async fn get_impl(store: &VersionStore, params: VersionGetParams) -> Result<CallToolResult, McpError> {
    require("document_id", &params.document_id)?;
    let version = store.get_version(&params.document_id, params.version_id).await?;
    json_result(&version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{MemoryStorage, VersionMetadata};
    use std::sync::Arc;

    async fn seeded() -> (VersionStore, Vec<i64>) {
        let store = VersionStore::new(Arc::new(MemoryStorage::new()));
        let mut ids = Vec::new();
        for content in ["one", "one\ntwo"] {
            let version = store
                .save_version("doc-1", content, VersionMetadata::default())
                .await
                .unwrap()
                .unwrap();
            ids.push(version.id);
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_list_document_history() {
        let (store, ids) = seeded().await;
        let output = list(&store, VersionListParams { document_id: Some("doc-1".into()) }).await.unwrap();

        let listed: Vec<i64> = output.versions.iter().map(|v| v.id).collect();
        assert_eq!(listed, vec![ids[1], ids[0]]);
        assert_eq!(output.versions[0].size, "7 B");
    }

    #[tokio::test]
    async fn test_list_unknown_document_is_empty() {
        let (store, _) = seeded().await;
        let output = list(&store, VersionListParams { document_id: Some("doc-2".into()) }).await.unwrap();
        assert!(output.versions.is_empty());
    }

    #[tokio::test]
    async fn test_list_documents() {
        let (store, _) = seeded().await;
        let output = list(&store, VersionListParams { document_id: None }).await.unwrap();
        assert_eq!(output.documents, vec!["doc-1".to_string()]);
    }

    #[tokio::test]
    async fn test_get_impl() {
        let (store, ids) = seeded().await;

        let found = get_impl(&store, VersionGetParams { document_id: "doc-1".into(), version_id: ids[0] }).await;
        assert!(found.is_ok());

        let missing = get_impl(&store, VersionGetParams { document_id: "doc-1".into(), version_id: 1 }).await;
        assert!(missing.is_err());
    }
}
