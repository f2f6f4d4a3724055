//! borgbahm - scheduled, rotated borg backups onto a removable drive
//!
//! Mounts a backup drive, creates a compressed borg archive of `/home` (or
//! restores the most recent one), prunes old archives down to 7 daily,
//! 4 weekly and 6 monthly, and unmounts the drive again on every exit path.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `cli`: Command line parsing
//! - `config`: Run configuration, settings file and paths
//! - `error`: Error taxonomy and exit codes
//! - `engine`: Backup engine port and the borg adapter
//! - `mount`: Mount port, the mount/umount adapter and the scoped guard
//! - `orchestrator`: The run sequence
//! - `process`: External process invocation
//! - `validate`: Input and privilege checks
//!
//! # Example
//!
//! ```rust,ignore
//! use borgbahm::config::Settings;
//! use borgbahm::engine::BorgEngine;
//! use borgbahm::mount::SystemMounter;
//! use borgbahm::orchestrator::Orchestrator;
//! use borgbahm::process::SystemRunner;
//!
//! let runner = SystemRunner::new(config.verbosity);
//! let mounter = SystemMounter::new(runner, &settings);
//! let engine = BorgEngine::new(
//!     runner,
//!     config.repository_path(),
//!     config.passphrase.clone(),
//!     settings.clone(),
//!     config.verbosity,
//! );
//! let report = Orchestrator::new(&config, &settings, &mounter, &engine).run()?;
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mount;
pub mod orchestrator;
pub mod process;
pub mod secret;
pub mod validate;

pub use error::{BahmError, BahmResult};
