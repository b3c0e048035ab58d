//! Parameter errors raised by the tool layer before any store is touched.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Missing or malformed tool arguments.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// HTTP method the offline layer does not understand.
    #[error("UNSUPPORTED_METHOD: {0}")]
    UnsupportedMethod(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) | ToolError::UnsupportedMethod(_) => -32602,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

/// Reject blank identifiers up front so they never reach storage keys.
pub fn require(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(())
}
