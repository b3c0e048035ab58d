//! cache_status tool implementation.
//!
//! Reports the worker phase and every registered cache generation.

use quire_client::LifecycleController;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationStatus {
    /// `<version-tag>-<role>`
    pub name: String,
    pub role: String,
    pub version_tag: String,
    /// Whether this generation belongs to the running build.
    pub current: bool,
    pub entries: usize,
}

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub version_tag: String,
    pub phase: String,
    pub online: bool,
    pub generations: Vec<GenerationStatus>,
}

pub async fn status(worker: &LifecycleController) -> Result<CacheStatusOutput, McpError> {
    let buckets = worker.buckets();
    let mut generations = Vec::new();
    for generation in buckets.generations().await? {
        generations.push(GenerationStatus {
            name: generation.name(),
            role: generation.role.suffix().to_string(),
            current: generation.version_tag == worker.version_tag(),
            entries: buckets.entry_count(&generation).await?,
            version_tag: generation.version_tag,
        });
    }

    Ok(CacheStatusOutput {
        version_tag: worker.version_tag().to_string(),
        phase: worker.phase().as_str().to_string(),
        online: worker.router().is_online(),
        generations,
    })
}

/// Implementation of the cache_status tool.
pub async fn status_impl(worker: &LifecycleController, _params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    json_result(&status(worker).await?)
}
