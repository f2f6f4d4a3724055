//! Backup engine for borgbahm
//!
//! All archive work is delegated to an external engine reached through the
//! [`BackupEngine`] trait. [`BorgEngine`] is the only real adapter; it
//! exports the repository location and passphrase through the child's
//! environment so neither shows up in the process list.
//!
//! # Archive Naming
//!
//! Archives are named `<prefix>-YYYY-MM-DD_HH:MM:SS` in local time, e.g.
//! `home-2024-03-15_02:00:07`. The prefix doubles as the glob that scopes
//! listing and pruning, so archives created by other tools in the same
//! repository are left alone.

mod borg;

pub use borg::BorgEngine;

use chrono::NaiveDateTime;

use crate::config::RetentionPolicy;
use crate::error::BahmResult;

/// One archive as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Archive name inside the repository
    pub name: String,
    /// When the archive was created, in local time
    pub created: NaiveDateTime,
}

/// Narrow interface to the backup engine
pub trait BackupEngine {
    /// Check the engine is installed and the repository is present
    fn check_environment(&self) -> BahmResult<()>;

    /// Verify repository consistency
    fn check_repository(&self) -> BahmResult<()>;

    /// Create a new archive of the source tree
    fn create_archive(&self, name: &str) -> BahmResult<()>;

    /// Delete archives not covered by the retention policy
    fn prune_archives(&self, retention: &RetentionPolicy) -> BahmResult<()>;

    /// All archives created by this tool
    fn list_archives(&self) -> BahmResult<Vec<ArchiveInfo>>;

    /// Extract an archive into the restore root
    fn extract_archive(&self, name: &str) -> BahmResult<()>;
}

/// Build the archive name for a backup started at `now`
pub fn archive_name(prefix: &str, now: NaiveDateTime) -> String {
    format!("{}-{}", prefix, now.format("%Y-%m-%d_%H:%M:%S"))
}

/// The most recently created archive; ties go to the greater name
pub fn latest_archive(archives: &[ArchiveInfo]) -> Option<&ArchiveInfo> {
    archives
        .iter()
        .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)))
}
