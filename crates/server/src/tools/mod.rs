//! MCP tools exposed by quire.
//!
//! `versions` wraps the document version store; `offline` drives the
//! caching layer.

pub mod offline;
pub mod versions;

pub use offline::{CacheStatusParams, OfflineFetchParams, fetch_impl, status_impl};
pub use versions::{
    VersionCompareParams, VersionGetParams, VersionListParams, VersionRestoreParams, VersionSaveParams, compare_impl,
    get_impl, list_impl, restore_impl, save_impl,
};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(quire_core::Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
