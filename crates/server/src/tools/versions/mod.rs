//! Document version tools.

pub mod compare;
pub mod history;
pub mod restore;
pub mod save;

pub use compare::{VersionCompareParams, compare_impl};
pub use history::{VersionGetParams, VersionListParams, get_impl, list_impl};
pub use restore::{VersionRestoreParams, restore_impl};
pub use save::{VersionSaveParams, save_impl};
