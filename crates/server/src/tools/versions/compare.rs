//! version_compare tool implementation.

use quire_core::VersionStore;
use quire_core::versions::{DiffKind, DiffRecord};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::history::VersionSummary;
use crate::error::require;
use crate::tools::json_result;

/// Parameters for the version_compare tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionCompareParams {
    pub document_id: String,
    /// Old side of the diff.
    pub version_a: i64,
    /// New side of the diff.
    pub version_b: i64,
}

/// Output from the version_compare tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionCompareOutput {
    pub version_a: VersionSummary,
    pub version_b: VersionSummary,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    /// One record per changed line position, in line order.
    pub diff: Vec<DiffRecord>,
}

pub async fn compare(store: &VersionStore, params: VersionCompareParams) -> Result<VersionCompareOutput, McpError> {
    require("document_id", &params.document_id)?;

    let comparison = store
        .compare_versions(&params.document_id, params.version_a, params.version_b)
        .await?;
    let count = |kind: DiffKind| comparison.diff.iter().filter(|r| r.kind == kind).count();

    Ok(VersionCompareOutput {
        version_a: VersionSummary::from(&comparison.version_a),
        version_b: VersionSummary::from(&comparison.version_b),
        added: count(DiffKind::Added),
        removed: count(DiffKind::Removed),
        modified: count(DiffKind::Modified),
        diff: comparison.diff,
    })
}

/// Implementation of the version_compare tool.
pub async fn compare_impl(store: &VersionStore, params: VersionCompareParams) -> Result<CallToolResult, McpError> {
    json_result(&compare(store, params).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{MemoryStorage, VersionMetadata};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_compare_counts() {
        let store = VersionStore::new(Arc::new(MemoryStorage::new()));
        let a = store
            .save_version("doc-1", "title\nbody\nfooter", VersionMetadata::default())
            .await
            .unwrap()
            .unwrap();
        let b = store
            .save_version("doc-1", "title\nBODY\nfooter\nsignature", VersionMetadata::default())
            .await
            .unwrap()
            .unwrap();

        let params = VersionCompareParams { document_id: "doc-1".into(), version_a: a.id, version_b: b.id };
        let output = compare(&store, params).await.unwrap();

        assert_eq!(output.modified, 1);
        assert_eq!(output.added, 1);
        assert_eq!(output.removed, 0);
        assert_eq!(output.diff[0].line_number, 2);
    }

    #[tokio::test]
    async fn test_compare_missing_version() {
        let store = VersionStore::new(Arc::new(MemoryStorage::new()));
        let a = store
            .save_version("doc-1", "x", VersionMetadata::default())
            .await
            .unwrap()
            .unwrap();

        let params = VersionCompareParams { document_id: "doc-1".into(), version_a: a.id, version_b: a.id + 1 };
        assert!(compare_impl(&store, params).await.is_err());
    }
}
