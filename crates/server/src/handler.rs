//! MCP server handler implementation.
//!
//! Routes tool calls to the version store and the offline worker.
use std::sync::Arc;

use crate::tools::{
    CacheStatusParams, OfflineFetchParams, VersionCompareParams, VersionGetParams, VersionListParams,
    VersionRestoreParams, VersionSaveParams, compare_impl, fetch_impl, get_impl, list_impl, restore_impl, save_impl,
    status_impl,
};

use quire_client::LifecycleController;
use quire_core::VersionStore;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for quire.
#[derive(Clone)]
pub struct QuireServer {
    versions: Arc<VersionStore>,
    worker: Arc<LifecycleController>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl QuireServer {
    pub fn new(versions: Arc<VersionStore>, worker: Arc<LifecycleController>) -> Self {
        Self { versions, worker, tool_router: Self::tool_router() }
    }

    #[tool(description = "Save a snapshot of a document. Skipped when the content matches the newest version.")]
    async fn version_save(&self, params: Parameters<VersionSaveParams>) -> Result<CallToolResult, McpError> {
        save_impl(&self.versions, params.0).await
    }

    #[tool(description = "List a document's versions newest first, or the documents with history when no id is given.")]
    async fn version_list(&self, params: Parameters<VersionListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.versions, params.0).await
    }

    #[tool(description = "Get one version of a document, including its full content.")]
    async fn version_get(&self, params: Parameters<VersionGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.versions, params.0).await
    }

    /// Snapshots the current state first, so the restore shows up in history
    /// and can itself be undone.
    #[tool(description = "Restore an older version of a document. Returns the content to load into the editor.")]
    async fn version_restore(&self, params: Parameters<VersionRestoreParams>) -> Result<CallToolResult, McpError> {
        restore_impl(&self.versions, params.0).await
    }

    #[tool(description = "Line-by-line positional diff between two versions of a document.")]
    async fn version_compare(&self, params: Parameters<VersionCompareParams>) -> Result<CallToolResult, McpError> {
        compare_impl(&self.versions, params.0).await
    }

    #[tool(description = "Send a request through the offline caching layer as a controlled page would.")]
    async fn offline_fetch(&self, params: Parameters<OfflineFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Show the worker lifecycle phase and the registered cache generations.")]
    async fn cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for QuireServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "quire".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
