//! Command line interface
//!
//! Bridges clap argument parsing with the run configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Mode, RunConfig, Verbosity};
use crate::error::{BahmError, BahmResult};
use crate::secret::SecureString;

const EXAMPLES: &str = "\
Example for creating a new backup archive:
    sudo borgbahm /dev/sdc /mnt/backup borgrepo Pa55w0rd

Example for restoring from the most recent backup archive:
    sudo borgbahm --restore /dev/sdc /mnt/backup borgrepo Pa55w0rd

It is assumed that 'mountdir' exists and that the repository on the device
is initialized. To initialize a borg repository use:
    sudo borg init --encryption=repokey /mnt/backup/borgrepo";

/// Placeholder passphrase that asks for the real one on the terminal
const PROMPT_MARKER: &str = "-";

#[derive(Parser, Debug)]
#[command(
    name = "borgbahm",
    version,
    about = "Manage backups of the /home directory with borg",
    long_about = "Manage backups of the /home directory with borg. Run this program on a \
                  daily basis to create incremental backups. It automatically maintains \
                  7 daily, 4 weekly and 6 monthly backup archives.",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Device name of the backup drive partition, e.g. /dev/sdc
    pub device: PathBuf,

    /// Directory for mounting the device, e.g. /mnt/backup
    pub mountdir: PathBuf,

    /// Name of the borg repository on the device, e.g. borgrepo
    pub reponame: String,

    /// Passphrase to access the borg repository; use '-' to be prompted
    #[arg(env = "BORGBAHM_PASSPHRASE", hide_env_values = true)]
    pub passphrase: String,

    /// Enable debug messages and verbose engine output
    #[arg(short, long)]
    pub debug: bool,

    /// Restore from the most recent archive, instead of backing up
    #[arg(short, long)]
    pub restore: bool,

    /// Enable quiet mode for less output
    #[arg(short, long)]
    pub quiet: bool,

    /// Settings file (JSON)
    #[arg(short, long, env = "BORGBAHM_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.debug, self.quiet)
    }

    pub fn mode(&self) -> Mode {
        if self.restore {
            Mode::Restore
        } else {
            Mode::Backup
        }
    }

    /// Build the run configuration, prompting for the passphrase if asked to
    pub fn into_run_config(mut self) -> BahmResult<RunConfig> {
        let passphrase = if self.passphrase == PROMPT_MARKER {
            let entered = rpassword::prompt_password("Repository passphrase: ")
                .map_err(|e| BahmError::Io(format!("Failed to read passphrase: {}", e)))?;
            SecureString::new(entered)
        } else {
            SecureString::new(std::mem::take(&mut self.passphrase))
        };

        Ok(RunConfig {
            mode: self.mode(),
            verbosity: self.verbosity(),
            device: self.device,
            mount_dir: self.mountdir,
            repo_name: self.reponame,
            passphrase,
        })
    }
}
