//! Settings for borgbahm
//!
//! Tool locations, archive layout and the retention policy. Everything has a
//! default so the settings file is optional and may be partial.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::BahmPaths;
use crate::error::BahmError;

/// Retention settings handed to the engine's prune operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Number of daily archives to keep
    pub daily: u32,
    /// Number of weekly archives to keep
    pub weekly: u32,
    /// Number of monthly archives to keep
    pub monthly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily: 7,
            weekly: 4,
            monthly: 6,
        }
    }
}

/// Persistent settings for borgbahm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backup engine executable (name on PATH or absolute path)
    pub borg_binary: PathBuf,

    /// Mount utility executable
    pub mount_binary: PathBuf,

    /// Unmount utility executable
    pub umount_binary: PathBuf,

    /// Block device listing utility, used to verify mount points
    pub lsblk_binary: PathBuf,

    /// Directory tree that gets backed up
    pub source_dir: PathBuf,

    /// Working directory for extraction
    ///
    /// Archives store paths relative to `/`, so extracting from the root
    /// puts `home/...` back where it came from.
    pub restore_root: PathBuf,

    /// Archive name prefix, also used as the glob for list and prune
    pub archive_prefix: String,

    /// Compression algorithm passed to the engine
    pub compression: String,

    /// Skip directories tagged with CACHEDIR.TAG
    pub exclude_caches: bool,

    /// Exclude patterns passed to the engine
    pub excludes: Vec<String>,

    /// Run a repository consistency check before every operation
    pub check_repository: bool,

    /// Refuse to run without an effective UID of 0
    pub require_superuser: bool,

    /// Pause before unmounting so the device is no longer busy
    pub unmount_settle_secs: u64,

    /// Archive retention policy
    pub retention: RetentionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            borg_binary: PathBuf::from("borg"),
            mount_binary: PathBuf::from("mount"),
            umount_binary: PathBuf::from("umount"),
            lsblk_binary: PathBuf::from("lsblk"),
            source_dir: PathBuf::from("/home"),
            restore_root: PathBuf::from("/"),
            archive_prefix: "home".to_string(),
            compression: "lz4".to_string(),
            exclude_caches: true,
            excludes: vec!["/home/*/.cache/*".to_string()],
            check_repository: true,
            require_superuser: true,
            unmount_settle_secs: 2,
            retention: RetentionPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings for a run
    ///
    /// An explicit path must exist. Without one, the default settings file is
    /// read if present and built-in defaults are used otherwise.
    pub fn load(explicit: Option<&Path>, paths: &BahmPaths) -> Result<Self, BahmError> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(BahmError::Config(format!(
                        "Settings file not found: {}",
                        path.display()
                    )));
                }
                Self::load_from(path)
            }
            None => {
                let default_path = paths.settings_file();
                if default_path.is_file() {
                    Self::load_from(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self, BahmError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BahmError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            BahmError::Config(format!(
                "Failed to parse settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the engine cannot work with
    fn validate(&self) -> Result<(), BahmError> {
        if self.archive_prefix.trim().is_empty() {
            return Err(BahmError::Config("archive_prefix must not be empty".into()));
        }
        if self.archive_prefix.contains(['/', '*', '?', '[']) {
            return Err(BahmError::Config(format!(
                "archive_prefix contains reserved characters: {}",
                self.archive_prefix
            )));
        }
        if self.compression.trim().is_empty() {
            return Err(BahmError::Config("compression must not be empty".into()));
        }
        Ok(())
    }

    /// Glob matching every archive this tool creates
    pub fn archive_glob(&self) -> String {
        format!("{}-*", self.archive_prefix)
    }

    /// Delay before the unmount call
    pub fn unmount_settle(&self) -> Duration {
        Duration::from_secs(self.unmount_settle_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.retention.daily, 7);
        assert_eq!(settings.retention.weekly, 4);
        assert_eq!(settings.retention.monthly, 6);
        assert_eq!(settings.source_dir, PathBuf::from("/home"));
        assert_eq!(settings.compression, "lz4");
        assert_eq!(settings.archive_glob(), "home-*");
        assert!(settings.require_superuser);
    }

    #[test]
    fn test_load_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let mut settings = Settings::default();
        settings.compression = "zstd,3".into();
        settings.unmount_settle_secs = 0;
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.unmount_settle(), Duration::ZERO);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "archive_prefix": "laptop", "retention": { "daily": 14, "monthly": 12 } }"#,
        )
        .unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.archive_prefix, "laptop");
        assert_eq!(loaded.retention.daily, 14);
        assert_eq!(loaded.retention.weekly, 4);
        assert_eq!(loaded.borg_binary, PathBuf::from("borg"));
        assert_eq!(loaded.excludes, vec!["/home/*/.cache/*".to_string()]);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BahmPaths::with_base_dir(temp_dir.path().to_path_buf());
        let missing = temp_dir.path().join("nope.json");

        let err = Settings::load(Some(&missing), &paths).unwrap_err();
        assert!(matches!(err, BahmError::Config(_)));
    }

    #[test]
    fn test_missing_default_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BahmPaths::with_base_dir(temp_dir.path().to_path_buf());

        let loaded = Settings::load(None, &paths).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_rejects_glob_characters_in_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "archive_prefix": "home*" }"#).unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, BahmError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, BahmError::Config(_)));
    }
}
