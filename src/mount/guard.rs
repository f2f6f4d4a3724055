//! Scoped mount handle

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, warn};

use super::MountPort;
use crate::config::paths::normalize_path;
use crate::error::{BahmError, BahmResult};

/// A device mounted for the duration of a run
pub struct MountGuard<'a> {
    port: &'a dyn MountPort,
    device: PathBuf,
    target: PathBuf,
    settle: Duration,
    mounted: bool,
}

impl<'a> MountGuard<'a> {
    /// Mount `device` at `target` and verify the result
    ///
    /// A device already mounted at `target` is adopted and will be unmounted
    /// on release. A device mounted anywhere else is a [`BahmError::Mount`].
    /// When the mount call succeeds but the device is not found at `target`
    /// afterwards, it is unmounted before the error is returned.
    pub fn acquire(
        port: &'a dyn MountPort,
        device: &Path,
        target: &Path,
        settle: Duration,
    ) -> BahmResult<Self> {
        port.probe_device(device)?;

        let target = normalize_path(target);
        match port.mount_point(device)? {
            Some(current) if normalize_path(&current) == target => {
                warn!(
                    device = %device.display(),
                    target = %target.display(),
                    "device already mounted at target, reusing it"
                );
                return Ok(Self::mounted(port, device, target, settle));
            }
            Some(current) => {
                return Err(BahmError::Mount(format!(
                    "{} is already mounted at {}",
                    device.display(),
                    current.display()
                )));
            }
            None => {}
        }

        port.mount(device, &target)?;
        let mut guard = Self::mounted(port, device, target, settle);
        if let Err(e) = guard.verify() {
            guard.mounted = false;
            if let Err(unmount_err) = guard.port.unmount(&guard.target) {
                error!(
                    target = %guard.target.display(),
                    error = %unmount_err,
                    "unmount after failed verification failed"
                );
            }
            return Err(e);
        }

        debug!(device = %device.display(), target = %guard.target.display(), "mounted");
        Ok(guard)
    }

    fn mounted(port: &'a dyn MountPort, device: &Path, target: PathBuf, settle: Duration) -> Self {
        Self {
            port,
            device: device.to_path_buf(),
            target,
            settle,
            mounted: true,
        }
    }

    /// The mount call succeeded; confirm the device really sits at the target
    fn verify(&self) -> BahmResult<()> {
        match self.port.mount_point(&self.device)? {
            Some(current) if normalize_path(&current) == self.target => Ok(()),
            Some(current) => Err(BahmError::Mount(format!(
                "{} ended up mounted at {} instead of {}",
                self.device.display(),
                current.display(),
                self.target.display()
            ))),
            None => Err(BahmError::Mount(format!(
                "{} is not mounted at {} after mounting",
                self.device.display(),
                self.target.display()
            ))),
        }
    }

    /// Mount directory this guard owns
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Unmount now and report the outcome
    pub fn release(mut self) -> BahmResult<()> {
        self.unmount_once()
    }

    fn unmount_once(&mut self) -> BahmResult<()> {
        if !self.mounted {
            return Ok(());
        }
        self.mounted = false;

        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }

        match self.port.mount_point(&self.device) {
            Ok(Some(current)) if normalize_path(&current) == self.target => {}
            Ok(_) => {
                debug!(
                    device = %self.device.display(),
                    "device no longer mounted at target, nothing to unmount"
                );
                return Ok(());
            }
            Err(e) => {
                debug!(error = %e, "could not read mount state, unmounting anyway");
            }
        }

        self.port.unmount(&self.target)?;
        debug!(target = %self.target.display(), "unmounted");
        Ok(())
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.mounted {
            if let Err(e) = self.unmount_once() {
                error!(target = %self.target.display(), error = %e, "unmount on exit failed");
            }
        }
    }
}
