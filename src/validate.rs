//! Input validation
//!
//! Runs before anything is mounted or executed. Device checks live in the
//! mount phase since they need the device node itself.

use std::path::Component;

use crate::config::RunConfig;
use crate::error::{BahmError, BahmResult};

/// Check the run configuration before any side effect
pub fn validate_run_config(config: &RunConfig) -> BahmResult<()> {
    if config.device.as_os_str().is_empty() {
        return Err(BahmError::Validation("Device path must not be empty".into()));
    }

    if config.mount_dir.as_os_str().is_empty() {
        return Err(BahmError::Validation("Mount directory must not be empty".into()));
    }
    if !config.mount_dir.exists() {
        return Err(BahmError::Validation(format!(
            "Mount directory does not exist: {}",
            config.mount_dir.display()
        )));
    }
    if !config.mount_dir.is_dir() {
        return Err(BahmError::Validation(format!(
            "Mount directory is not a directory: {}",
            config.mount_dir.display()
        )));
    }

    validate_repo_name(&config.repo_name)?;

    if config.passphrase.is_empty() {
        return Err(BahmError::Validation("Passphrase must not be empty".into()));
    }

    Ok(())
}

/// The repository must be a single directory directly below the mount point
fn validate_repo_name(name: &str) -> BahmResult<()> {
    if name.trim().is_empty() {
        return Err(BahmError::Validation("Repository name must not be empty".into()));
    }

    let mut components = std::path::Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(BahmError::Validation(format!(
            "Repository name must be a plain directory name: {}",
            name
        ))),
    }
}

/// Effective UID check; mounting needs root
pub fn check_superuser() -> BahmResult<()> {
    if is_superuser() {
        Ok(())
    } else {
        Err(BahmError::Privileges(
            "This program requires super user privileges".into(),
        ))
    }
}

#[cfg(unix)]
fn is_superuser() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_superuser() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, Verbosity};
    use crate::secret::SecureString;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(mount_dir: PathBuf) -> RunConfig {
        RunConfig {
            device: PathBuf::from("/dev/sdc"),
            mount_dir,
            repo_name: "borgrepo".into(),
            passphrase: SecureString::new("Pa55w0rd"),
            mode: Mode::Backup,
            verbosity: Verbosity::Normal,
        }
    }

    #[test]
    fn test_valid_config() {
        let temp = TempDir::new().unwrap();
        validate_run_config(&config(temp.path().to_path_buf())).unwrap();
    }

    #[test]
    fn test_missing_mount_dir() {
        let temp = TempDir::new().unwrap();
        let err = validate_run_config(&config(temp.path().join("missing"))).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_mount_dir_is_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, "").unwrap();

        let err = validate_run_config(&config(file)).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_empty_passphrase() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config(temp.path().to_path_buf());
        cfg.passphrase = SecureString::new("");
        assert!(validate_run_config(&cfg).unwrap_err().is_validation());
    }

    #[test]
    fn test_empty_device() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config(temp.path().to_path_buf());
        cfg.device = PathBuf::new();
        assert!(validate_run_config(&cfg).unwrap_err().is_validation());
    }

    #[test]
    fn test_repo_name_rules() {
        assert!(validate_repo_name("borgrepo").is_ok());
        assert!(validate_repo_name("").is_err());
        assert!(validate_repo_name("  ").is_err());
        assert!(validate_repo_name("..").is_err());
        assert!(validate_repo_name(".").is_err());
        assert!(validate_repo_name("a/b").is_err());
        assert!(validate_repo_name("/abs").is_err());
    }
}
