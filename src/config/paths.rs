//! Path management for borgbahm
//!
//! Resolves where the settings file lives and normalizes the user-supplied
//! paths that get compared against mount tables.
//!
//! ## Path Resolution Order
//!
//! 1. `BORGBAHM_CONFIG_DIR` environment variable (if set)
//! 2. Platform config directory from `directories` (e.g. `~/.config/borgbahm`)
//! 3. `/etc/borgbahm` when no home directory can be determined

use std::path::{Component, Path, PathBuf};

use directories::ProjectDirs;

use crate::error::BahmError;

/// Manages all paths used by borgbahm
#[derive(Debug, Clone)]
pub struct BahmPaths {
    /// Base directory for borgbahm configuration
    base_dir: PathBuf,
}

impl BahmPaths {
    /// Create a new BahmPaths instance
    pub fn new() -> Result<Self, BahmError> {
        let base_dir = if let Ok(custom) = std::env::var("BORGBAHM_CONFIG_DIR") {
            if custom.trim().is_empty() {
                return Err(BahmError::Config(
                    "BORGBAHM_CONFIG_DIR is set but empty".into(),
                ));
            }
            PathBuf::from(custom)
        } else {
            ProjectDirs::from("", "", "borgbahm")
                .map(|dirs| dirs.config_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("/etc/borgbahm"))
        };

        Ok(Self { base_dir })
    }

    /// Create BahmPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }
}

/// Lexically normalize a path
///
/// Collapses repeated separators, drops `.` components and trailing
/// slashes, and folds `..` into its parent. Symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `/..` is `/`
                if normalized.has_root() && normalized.parent().is_none() {
                    continue;
                }
                let ends_in_parent = matches!(
                    normalized.components().next_back(),
                    Some(Component::ParentDir) | None
                );
                if ends_in_parent {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
