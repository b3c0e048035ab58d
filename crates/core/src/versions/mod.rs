//! Document version history.
//!
//! - [`hash`]: cheap content hash used to suppress identical consecutive saves
//! - [`diff`]: positional line diff for compare views
//! - [`store`]: capped, persisted per-document version logs

pub mod diff;
pub mod hash;
pub mod store;

pub use diff::{DiffKind, DiffRecord, diff_lines};
pub use hash::content_hash;
pub use store::{Version, VersionComparison, VersionEvent, VersionMetadata, VersionStore};

/// Human-readable byte size for version listings.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{bytes} B")
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(2 * 1024 * 1024), "2.0 MB");
    }
}
