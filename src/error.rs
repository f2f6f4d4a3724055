//! Error types for borgbahm
//!
//! Every stage of a run has its own variant so the binary can map a failure
//! to a distinct process exit code.

use thiserror::Error;

/// The main error type for borgbahm operations
#[derive(Error, Debug)]
pub enum BahmError {
    /// Bad arguments, detected before any side effect
    #[error("Validation error: {0}")]
    Validation(String),

    /// The process lacks super user privileges
    #[error("Privilege error: {0}")]
    Privileges(String),

    /// Settings file could not be located, read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device could not be attached at the mount directory
    #[error("Mount error: {0}")]
    Mount(String),

    /// The device could not be detached from the mount directory
    #[error("Unmount error: {0}")]
    Unmount(String),

    /// The backup engine is missing or the repository is absent
    #[error("Environment error: {0}")]
    Environment(String),

    /// The repository failed its consistency check
    #[error("Repository error: {0}")]
    Repository(String),

    /// Creating the archive failed
    #[error("Backup error: {0}")]
    Backup(String),

    /// Pruning old archives failed
    #[error("Prune error: {0}")]
    Prune(String),

    /// Listing or extracting the archive failed
    #[error("Restore error: {0}")]
    Restore(String),

    /// File or process I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl BahmError {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Privileges(_) => 1,
            Self::Mount(_) => 2,
            Self::Unmount(_) => 3,
            Self::Environment(_) => 4,
            Self::Repository(_) => 5,
            Self::Backup(_) => 6,
            Self::Prune(_) => 7,
            Self::Restore(_) => 8,
            Self::Validation(_) => 9,
            Self::Config(_) => 10,
            Self::Io(_) | Self::Json(_) => 11,
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error may be downgraded to a warning
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Prune(_))
    }
}

impl From<std::io::Error> for BahmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BahmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for borgbahm operations
pub type BahmResult<T> = Result<T, BahmError>;
