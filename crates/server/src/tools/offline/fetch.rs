//! offline_fetch tool implementation.
//!
//! Sends one request through the worker as a controlled page would, so the
//! caching behavior can be exercised and inspected.

use quire_client::fetch::{Destination, Method, resolve};
use quire_client::{LifecycleController, Request};
use quire_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, require};
use crate::tools::json_result;

/// Parameters for the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// HTTP method (default: "GET").
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: document, image, script, style, manifest or other.
    #[serde(default)]
    pub destination: Option<String>,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 with invalid sequences replaced.
    pub body: String,
    pub body_bytes: usize,
    /// Worker phase when the request was handled.
    pub phase: String,
    pub online: bool,
}

fn build_request(worker: &LifecycleController, params: &OfflineFetchParams) -> Result<Request, McpError> {
    require("url", &params.url)?;

    let url = resolve(worker.shell().origin(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ToolError::UnsupportedMethod(params.method.clone()))?;

    let mut request = if params.navigate { Request::navigate(url) } else { Request::get(url) };
    request.method = method;
    if let Some(destination) = &params.destination {
        request = request.with_destination(destination.parse::<Destination>().map_err(ToolError::InvalidInput)?);
    }
    Ok(request)
}

pub async fn fetch(worker: &LifecycleController, params: OfflineFetchParams) -> Result<OfflineFetchOutput, McpError> {
    let request = build_request(worker, &params)?;
    let response = worker.on_fetch(&request).await?;

    Ok(OfflineFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        content_type: response.header("content-type").map(str::to_string),
        body: response.text(),
        body_bytes: response.body.len(),
        headers: response.headers,
        phase: worker.phase().as_str().to_string(),
        online: worker.router().is_online(),
    })
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(worker: &LifecycleController, params: OfflineFetchParams) -> Result<CallToolResult, McpError> {
    json_result(&fetch(worker, params).await?)
}
