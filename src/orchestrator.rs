//! Backup orchestration
//!
//! One run walks `Init → Validated → Mounted → {BackupDone | RestoreDone |
//! OperationFailed} → Unmounted → {Success | Failure}`. There are no
//! retries; the first failing step ends the run, and the device is
//! unmounted on every path where it was mounted.
//!
//! Prune failures are deliberately non-fatal: a fresh archive on a fuller
//! disk beats no archive at all, so they surface as warnings in the
//! [`RunReport`] while every other engine failure fails the run.

use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

use crate::config::{Mode, RunConfig, Settings};
use crate::engine::{archive_name, latest_archive, BackupEngine};
use crate::error::{BahmError, BahmResult};
use crate::mount::{MountGuard, MountPort};
use crate::validate::{check_superuser, validate_run_config};

/// Source of "now" for archive names
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Summary of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub mode: Mode,
    /// Archive created or restored
    pub archive: String,
    /// Failures that did not fail the run
    pub warnings: Vec<BahmError>,
}

/// Drives one backup or restore run
pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    settings: &'a Settings,
    mounter: &'a dyn MountPort,
    engine: &'a dyn BackupEngine,
    clock: Clock,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a RunConfig,
        settings: &'a Settings,
        mounter: &'a dyn MountPort,
        engine: &'a dyn BackupEngine,
    ) -> Self {
        Self {
            config,
            settings,
            mounter,
            engine,
            clock: local_now,
        }
    }

    /// Replace the clock used for archive names
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Execute the run
    ///
    /// If both the operation and the unmount fail, the operation's error is
    /// returned and the unmount failure is only logged.
    pub fn run(&self) -> BahmResult<RunReport> {
        validate_run_config(self.config)?;

        if self.settings.require_superuser {
            info!("Checking availability of super user privileges");
            check_superuser()?;
        }

        info!(
            "Mounting {} to directory {}",
            self.config.device.display(),
            self.config.mount_dir.display()
        );
        let guard = MountGuard::acquire(
            self.mounter,
            &self.config.normalized_device(),
            &self.config.mount_dir,
            self.settings.unmount_settle(),
        )?;

        let outcome = self.operate();

        info!(
            "Unmounting {} from directory {}",
            self.config.device.display(),
            guard.target().display()
        );
        let unmounted = guard.release();

        match (outcome, unmounted) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(unmount_err)) => Err(unmount_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unmount_err)) => {
                error!(error = %unmount_err, "unmount also failed");
                Err(err)
            }
        }
    }

    /// Everything that happens while the device is mounted
    fn operate(&self) -> BahmResult<RunReport> {
        info!("Initializing environment");
        self.engine.check_environment()?;

        if self.settings.check_repository {
            info!(
                "Checking {} repository consistency",
                self.config.repository_path().display()
            );
            self.engine.check_repository()?;
        }

        match self.config.mode {
            Mode::Backup => self.backup(),
            Mode::Restore => self.restore(),
        }
    }

    fn backup(&self) -> BahmResult<RunReport> {
        let name = archive_name(&self.settings.archive_prefix, (self.clock)());

        info!("Creating new backup archive {}", name);
        self.engine.create_archive(&name)?;

        info!("Removing old backup archives that are no longer needed");
        let mut warnings = Vec::new();
        if let Err(err) = self.engine.prune_archives(&self.settings.retention) {
            if !err.is_recoverable() {
                return Err(err);
            }
            warn!(error = %err, "pruning failed, archive {} is kept", name);
            warnings.push(err);
        }

        Ok(RunReport {
            mode: Mode::Backup,
            archive: name,
            warnings,
        })
    }

    fn restore(&self) -> BahmResult<RunReport> {
        let archives = self.engine.list_archives()?;
        let latest = latest_archive(&archives).ok_or_else(|| {
            BahmError::Restore(format!(
                "Repository {} contains no {} archives",
                self.config.repository_path().display(),
                self.settings.archive_glob()
            ))
        })?;

        info!("Restoring the backup archive with name {}", latest.name);
        self.engine.extract_archive(&latest.name)?;

        Ok(RunReport {
            mode: Mode::Restore,
            archive: latest.name.clone(),
            warnings: Vec::new(),
        })
    }
}
