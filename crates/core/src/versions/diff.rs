//! Positional line diff.
//!
//! Lines are compared index against index. There is no alignment step, so an
//! inserted line near the top of a document reports every following line as
//! modified. Callers rely on that exact output for compare views.

use serde::{Deserialize, Serialize};

/// How a line differs between two contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

/// One differing line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    /// 1-based line number.
    pub line_number: usize,
    /// Line in the old content; absent when the line was added.
    pub old_line: Option<String>,
    /// Line in the new content; absent when the line was removed.
    pub new_line: Option<String>,
    pub kind: DiffKind,
}

/// Compare two contents line by line at matching positions.
///
/// Both inputs are split on `'\n'`, so an empty string is a single empty
/// line. Records come back in ascending line order.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffRecord> {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();
    let len = old_lines.len().max(new_lines.len());

    (0..len)
        .filter_map(|i| {
            let (old_line, new_line) = (old_lines.get(i).copied(), new_lines.get(i).copied());
            let kind = match (old_line, new_line) {
                (Some(a), Some(b)) if a == b => return None,
                (Some(_), Some(_)) => DiffKind::Modified,
                (None, Some(_)) => DiffKind::Added,
                (Some(_), None) => DiffKind::Removed,
                (None, None) => return None,
            };
            Some(DiffRecord {
                line_number: i + 1,
                old_line: old_line.map(str::to_string),
                new_line: new_line.map(str::to_string),
                kind,
            })
        })
        .collect()
}
