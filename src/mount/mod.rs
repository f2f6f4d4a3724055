//! Device mounting for borgbahm
//!
//! The OS mount utility is reached through the [`MountPort`] trait, with one
//! adapter that shells out to `mount`, `umount` and `lsblk`.
//!
//! # Guaranteed unmount
//!
//! [`MountGuard::acquire`] takes ownership of the mount as soon as the mount
//! utility succeeds. If the device then fails verification at the target
//! directory, it is unmounted before the error is returned. A returned guard
//! unmounts exactly once: either through
//! [`MountGuard::release`], whose result the caller inspects, or from `Drop`
//! if the protected region unwinds first.

mod guard;
mod system;

pub use guard::MountGuard;
pub use system::SystemMounter;

use std::path::{Path, PathBuf};

use crate::error::BahmResult;

/// Narrow interface to the OS mount facility
pub trait MountPort {
    /// Check that `device` exists and is a block device
    fn probe_device(&self, device: &Path) -> BahmResult<()>;

    /// Directory `device` is currently mounted at, if any
    fn mount_point(&self, device: &Path) -> BahmResult<Option<PathBuf>>;

    /// Attach `device` at `target`
    fn mount(&self, device: &Path, target: &Path) -> BahmResult<()>;

    /// Detach whatever is mounted at `target`
    fn unmount(&self, target: &Path) -> BahmResult<()>;
}
