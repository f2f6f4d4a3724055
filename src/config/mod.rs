//! Configuration module for borgbahm
//!
//! This module provides configuration management including:
//! - Settings file path resolution
//! - Persistent tool and retention settings
//! - The immutable per-run configuration

pub mod paths;
pub mod run;
pub mod settings;

pub use paths::BahmPaths;
pub use run::{Mode, RunConfig, Verbosity};
pub use settings::{RetentionPolicy, Settings};
