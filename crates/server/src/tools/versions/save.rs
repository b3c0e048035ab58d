//! version_save tool implementation.
//!
//! Snapshots a document's content unless it matches the newest version.

use quire_core::{Version, VersionMetadata, VersionStore};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::require;
use crate::tools::json_result;

/// Parameters for the version_save tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionSaveParams {
    /// Document to snapshot.
    pub document_id: String,

    /// Full document content.
    pub content: String,

    /// Author of the change (default: "Anonymous").
    #[serde(default)]
    pub user: Option<String>,

    /// Free-text comment (default: "Auto-saved").
    #[serde(default)]
    pub comment: Option<String>,
}

/// Output from the version_save tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionSaveOutput {
    /// False when the content matched the newest version and nothing was written.
    pub saved: bool,
    pub version: Option<Version>,
}

pub async fn save(store: &VersionStore, params: VersionSaveParams) -> Result<VersionSaveOutput, McpError> {
    require("document_id", &params.document_id)?;

    let metadata = VersionMetadata { user: params.user, comment: params.comment };
    let version = store
        .save_version(&params.document_id, &params.content, metadata)
        .await?;

    Ok(VersionSaveOutput { saved: version.is_some(), version })
}

/// Implementation of the version_save tool.
pub async fn save_impl(store: &VersionStore, params: VersionSaveParams) -> Result<CallToolResult, McpError> {
    json_result(&save(store, params).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::MemoryStorage;
    use std::sync::Arc;

    fn params(content: &str) -> VersionSaveParams {
        VersionSaveParams { document_id: "doc-1".into(), content: content.into(), user: None, comment: None }
    }

    #[tokio::test]
    async fn test_save_then_duplicate() {
        let store = VersionStore::new(Arc::new(MemoryStorage::new()));

        let first = save(&store, params("hello")).await.unwrap();
        assert!(first.saved);
        let version = first.version.unwrap();
        assert_eq!(version.user, "Anonymous");
        assert_eq!(version.comment, "Auto-saved");

        let again = save(&store, params("hello")).await.unwrap();
        assert!(!again.saved);
        assert!(again.version.is_none());
    }

    #[tokio::test]
    async fn test_save_with_metadata() {
        let store = VersionStore::new(Arc::new(MemoryStorage::new()));
        let output = save(
            &store,
            VersionSaveParams { user: Some("ana".into()), comment: Some("manual".into()), ..params("body") },
        )
        .await
        .unwrap();

        let version = output.version.unwrap();
        assert_eq!(version.user, "ana");
        assert_eq!(version.comment, "manual");
    }

    #[tokio::test]
    async fn test_save_rejects_blank_document() {
        let store = VersionStore::new(Arc::new(MemoryStorage::new()));
        let result = save_impl(&store, VersionSaveParams { document_id: " ".into(), ..params("x") }).await;
        assert!(result.is_err());
    }
}
