//! Per-run configuration
//!
//! Built once from the command line and never mutated afterwards.

use std::path::PathBuf;

use super::paths::normalize_path;
use crate::secret::SecureString;

/// What a run does once the device is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Create a new archive, then prune old ones
    #[default]
    Backup,
    /// Extract the most recent archive
    Restore,
}

/// How much output a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only; engine output discarded
    Quiet,
    /// Progress messages and engine summaries
    #[default]
    Normal,
    /// Everything, including each external invocation
    Debug,
}

impl Verbosity {
    /// Resolve the command line flags; `--debug` wins over `--quiet`
    pub fn from_flags(debug: bool, quiet: bool) -> Self {
        if debug {
            Self::Debug
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub fn is_quiet(self) -> bool {
        self == Self::Quiet
    }

    pub fn is_debug(self) -> bool {
        self == Self::Debug
    }
}

/// Immutable configuration for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Block device holding the repository, e.g. `/dev/sdc`
    pub device: PathBuf,
    /// Existing directory the device is mounted at
    pub mount_dir: PathBuf,
    /// Repository directory name on the mounted device
    pub repo_name: String,
    /// Repository passphrase
    pub passphrase: SecureString,
    pub mode: Mode,
    pub verbosity: Verbosity,
}

impl RunConfig {
    /// Location of the repository once the device is mounted
    pub fn repository_path(&self) -> PathBuf {
        normalize_path(&self.mount_dir).join(&self.repo_name)
    }

    /// Device path as passed to the mount utility
    pub fn normalized_device(&self) -> PathBuf {
        normalize_path(&self.device)
    }
}
