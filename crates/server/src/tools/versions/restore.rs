//! version_restore tool implementation.
//!
//! Returns an older version's content for the editor to load, after
//! snapshotting the current state so the restore can itself be undone.

use quire_core::VersionStore;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::require;
use crate::tools::json_result;

/// Parameters for the version_restore tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionRestoreParams {
    pub document_id: String,

    /// Version to restore.
    pub version_id: i64,

    /// Unsaved editor content to snapshot before restoring. When omitted the
    /// newest saved version is taken as the current state.
    #[serde(default)]
    pub working_content: Option<String>,
}

/// Output from the version_restore tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionRestoreOutput {
    pub document_id: String,
    pub restored_from: i64,
    pub content: String,
}

pub async fn restore(store: &VersionStore, params: VersionRestoreParams) -> Result<VersionRestoreOutput, McpError> {
    require("document_id", &params.document_id)?;

    let content = match &params.working_content {
        Some(working) => {
            store
                .restore_version_over(&params.document_id, params.version_id, working)
                .await?
        }
        None => store.restore_version(&params.document_id, params.version_id).await?,
    };

    Ok(VersionRestoreOutput { document_id: params.document_id, restored_from: params.version_id, content })
}

/// Implementation of the version_restore tool.
pub async fn restore_impl(store: &VersionStore, params: VersionRestoreParams) -> Result<CallToolResult, McpError> {
    json_result(&restore(store, params).await?)
}
