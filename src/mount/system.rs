//! Mount adapter backed by `mount`, `umount` and `lsblk`

use std::path::{Path, PathBuf};

use super::MountPort;
use crate::config::Settings;
use crate::error::{BahmError, BahmResult};
use crate::process::{CommandRunner, Invocation, ProcessOutput};

/// Shells out to the OS mount utilities
pub struct SystemMounter<R> {
    runner: R,
    mount_binary: PathBuf,
    umount_binary: PathBuf,
    lsblk_binary: PathBuf,
}

impl<R: CommandRunner> SystemMounter<R> {
    pub fn new(runner: R, settings: &Settings) -> Self {
        Self {
            runner,
            mount_binary: settings.mount_binary.clone(),
            umount_binary: settings.umount_binary.clone(),
            lsblk_binary: settings.lsblk_binary.clone(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> MountPort for SystemMounter<R> {
    fn probe_device(&self, device: &Path) -> BahmResult<()> {
        let metadata = std::fs::metadata(device).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BahmError::Mount(format!("Device does not exist: {}", device.display()))
            } else {
                BahmError::Mount(format!("Cannot inspect device {}: {}", device.display(), e))
            }
        })?;

        if !is_block_device(&metadata) {
            return Err(BahmError::Mount(format!(
                "Not a block device: {}",
                device.display()
            )));
        }
        Ok(())
    }

    fn mount_point(&self, device: &Path) -> BahmResult<Option<PathBuf>> {
        let inv = Invocation::new(&self.lsblk_binary)
            .args(["-o", "MOUNTPOINT", "-n", "-r", "-d"])
            .arg(device);
        let out = self.runner.run(&inv)?;
        if !out.success() {
            return Err(BahmError::Mount(failure_message(
                &format!("lsblk {}", device.display()),
                &out,
            )));
        }
        Ok(parse_mount_point(&out.stdout))
    }

    fn mount(&self, device: &Path, target: &Path) -> BahmResult<()> {
        let inv = Invocation::new(&self.mount_binary).arg(device).arg(target);
        let out = self.runner.run(&inv)?;
        if !out.success() {
            return Err(BahmError::Mount(failure_message(
                &format!("mount {} {}", device.display(), target.display()),
                &out,
            )));
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> BahmResult<()> {
        let inv = Invocation::new(&self.umount_binary).arg(target);
        let out = self.runner.run(&inv).map_err(|e| BahmError::Unmount(e.to_string()))?;
        if !out.success() {
            return Err(BahmError::Unmount(failure_message(
                &format!("umount {}", target.display()),
                &out,
            )));
        }
        Ok(())
    }
}

fn failure_message(what: &str, out: &ProcessOutput) -> String {
    match out.stderr_tail(2) {
        Some(tail) => format!("{} failed with {}: {}", what, out.status_text(), tail),
        None => format!("{} failed with {}", what, out.status_text()),
    }
}

#[cfg(unix)]
fn is_block_device(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    metadata.file_type().is_block_device()
}

#[cfg(not(unix))]
fn is_block_device(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// First mount point in raw `lsblk -o MOUNTPOINT` output
fn parse_mount_point(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| PathBuf::from(unescape_lsblk(line)))
}

/// Decode the `\xHH` escapes lsblk uses in raw output
fn unescape_lsblk(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            let value = std::str::from_utf8(&bytes[i + 2..i + 4])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(value) = value {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
