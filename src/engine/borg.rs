//! Borg adapter
//!
//! Borg exit codes: 0 is success, 1 is a warning (e.g. a file changed while
//! it was read) and 2 or more is an error. Warnings count as success for
//! create, prune and extract. `BORG_EXIT_CODES=legacy` pins that scheme on
//! borg releases that offer finer-grained codes.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ArchiveInfo, BackupEngine};
use crate::config::{RetentionPolicy, Settings, Verbosity};
use crate::error::{BahmError, BahmResult};
use crate::process::{resolve_program, CommandRunner, Invocation, OutputPolicy, ProcessOutput};
use crate::secret::SecureString;

/// Highest borg exit code that still means the operation completed
const BORG_WARNING: i32 = 1;

/// Drives the `borg` command line tool
pub struct BorgEngine<R> {
    runner: R,
    repository: PathBuf,
    passphrase: SecureString,
    settings: Settings,
    verbosity: Verbosity,
}

#[derive(Debug, Deserialize)]
struct ListOutput {
    archives: Vec<ListedArchive>,
}

#[derive(Debug, Deserialize)]
struct ListedArchive {
    name: String,
    time: String,
}

impl<R: CommandRunner> BorgEngine<R> {
    pub fn new(
        runner: R,
        repository: PathBuf,
        passphrase: SecureString,
        settings: Settings,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            runner,
            repository,
            passphrase,
            settings,
            verbosity,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Base invocation with the repository and secret in the environment
    fn borg(&self, subcommand: &str) -> Invocation {
        Invocation::new(&self.settings.borg_binary)
            .arg(subcommand)
            .env("BORG_REPO", self.repository.to_string_lossy().into_owned())
            .env("BORG_PASSPHRASE", self.passphrase.clone())
            .env("BORG_EXIT_CODES", "legacy")
    }

    /// `--verbose` unless quiet
    fn with_progress(&self, inv: Invocation) -> Invocation {
        if self.verbosity.is_quiet() {
            inv
        } else {
            inv.arg("--verbose")
        }
    }

    fn run_tolerant(&self, inv: Invocation, what: &str) -> Result<(), String> {
        let out = self.runner.run(&inv).map_err(|e| e.to_string())?;
        if out.code_at_most(BORG_WARNING) {
            if out.code == Some(BORG_WARNING) {
                warn!("borg {} finished with warnings", what);
            }
            return Ok(());
        }
        Err(failure_message(what, &out))
    }

    fn create_invocation(&self, name: &str) -> Invocation {
        let mut inv = self.with_progress(self.borg("create"));
        if !self.verbosity.is_quiet() {
            inv = inv.arg("--stats");
        }
        if self.verbosity.is_debug() {
            inv = inv.arg("--list");
        }
        inv = inv.args(["--compression", self.settings.compression.as_str()]);
        if self.settings.exclude_caches {
            inv = inv.arg("--exclude-caches");
        }
        for pattern in &self.settings.excludes {
            inv = inv.args(["--exclude", pattern.as_str()]);
        }
        inv.arg(format!("::{}", name))
            .arg(&self.settings.source_dir)
            .output(OutputPolicy::for_user_output(self.verbosity))
    }

    fn prune_invocation(&self, retention: &RetentionPolicy) -> Invocation {
        let mut inv = self.with_progress(self.borg("prune"));
        if !self.verbosity.is_quiet() {
            inv = inv.arg("--list");
        }
        inv.args(["--glob-archives", self.settings.archive_glob().as_str()])
            .args(["--keep-daily", retention.daily.to_string().as_str()])
            .args(["--keep-weekly", retention.weekly.to_string().as_str()])
            .args(["--keep-monthly", retention.monthly.to_string().as_str()])
            .output(OutputPolicy::for_user_output(self.verbosity))
    }

    fn extract_invocation(&self, name: &str) -> Invocation {
        let mut inv = self.with_progress(self.borg("extract"));
        if !self.verbosity.is_quiet() {
            inv = inv.arg("--list");
        }
        inv.arg(format!("::{}", name))
            .current_dir(&self.settings.restore_root)
            .output(OutputPolicy::for_user_output(self.verbosity))
    }
}

impl<R: CommandRunner> BackupEngine for BorgEngine<R> {
    fn check_environment(&self) -> BahmResult<()> {
        let borg = &self.settings.borg_binary;
        match resolve_program(borg) {
            Some(path) => debug!(borg = %path.display(), "found backup engine"),
            None => {
                return Err(BahmError::Environment(format!(
                    "{} is not installed or not executable",
                    borg.display()
                )));
            }
        }

        // Every borg repository carries a `config` file at its root
        let config_file = self.repository.join("config");
        if !config_file.is_file() {
            return Err(BahmError::Environment(format!(
                "No borg repository at {}; create one with 'borg init --encryption=repokey {}'",
                self.repository.display(),
                self.repository.display()
            )));
        }
        Ok(())
    }

    fn check_repository(&self) -> BahmResult<()> {
        let inv = self.borg("check").arg("--repository-only");
        let out = self
            .runner
            .run(&inv)
            .map_err(|e| BahmError::Repository(e.to_string()))?;
        if !out.success() {
            return Err(BahmError::Repository(failure_message("check", &out)));
        }
        Ok(())
    }

    fn create_archive(&self, name: &str) -> BahmResult<()> {
        self.run_tolerant(self.create_invocation(name), "create")
            .map_err(BahmError::Backup)
    }

    fn prune_archives(&self, retention: &RetentionPolicy) -> BahmResult<()> {
        self.run_tolerant(self.prune_invocation(retention), "prune")
            .map_err(BahmError::Prune)
    }

    fn list_archives(&self) -> BahmResult<Vec<ArchiveInfo>> {
        let inv = self
            .borg("list")
            .arg("--json")
            .args(["--glob-archives", self.settings.archive_glob().as_str()]);
        let out = self
            .runner
            .run(&inv)
            .map_err(|e| BahmError::Restore(e.to_string()))?;
        if !out.code_at_most(BORG_WARNING) {
            return Err(BahmError::Restore(failure_message("list", &out)));
        }
        parse_archive_list(&out.stdout)
    }

    fn extract_archive(&self, name: &str) -> BahmResult<()> {
        self.run_tolerant(self.extract_invocation(name), "extract")
            .map_err(BahmError::Restore)
    }
}

fn failure_message(what: &str, out: &ProcessOutput) -> String {
    match out.stderr_tail(3) {
        Some(tail) => format!("borg {} failed with {}: {}", what, out.status_text(), tail),
        None => format!("borg {} failed with {}", what, out.status_text()),
    }
}

/// Parse `borg list --json` output
fn parse_archive_list(stdout: &str) -> BahmResult<Vec<ArchiveInfo>> {
    let listing: ListOutput = serde_json::from_str(stdout)
        .map_err(|e| BahmError::Restore(format!("Could not parse borg archive list: {}", e)))?;

    listing
        .archives
        .into_iter()
        .map(|a| -> BahmResult<ArchiveInfo> {
            let created = parse_borg_time(&a.time).ok_or_else(|| {
                BahmError::Restore(format!(
                    "Archive {} has an unreadable timestamp: {}",
                    a.name, a.time
                ))
            })?;
            Ok(ArchiveInfo {
                name: a.name,
                created,
            })
        })
        .collect()
}

/// Borg 1.x prints naive local ISO times; newer releases add an offset
fn parse_borg_time(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Local).naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;
    use chrono::{Datelike, Timelike};
    use std::path::Path;
    use tempfile::TempDir;

    fn engine(runner: ScriptedRunner, verbosity: Verbosity) -> BorgEngine<ScriptedRunner> {
        BorgEngine::new(
            runner,
            PathBuf::from("/mnt/backup/borgrepo"),
            SecureString::new("Pa55w0rd"),
            Settings::default(),
            verbosity,
        )
    }

    fn listing(stdout: &'static str) -> ScriptedRunner {
        ScriptedRunner::new(move |_| ProcessOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    #[test]
    fn test_passphrase_only_in_environment() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Normal);
        e.create_archive("home-2024-03-15_02:00:07").unwrap();
        e.prune_archives(&RetentionPolicy::default()).unwrap();

        for call in e.runner().calls() {
            assert!(call.argv_lossy().iter().all(|a| !a.contains("Pa55w0rd")));
            assert!(!call.describe().contains("Pa55w0rd"));
            assert_eq!(call.env_value("BORG_PASSPHRASE"), Some("Pa55w0rd"));
            assert_eq!(call.env_value("BORG_REPO"), Some("/mnt/backup/borgrepo"));
        }
    }

    #[test]
    fn test_create_arguments() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Normal);
        e.create_archive("home-2024-03-15_02:00:07").unwrap();

        let calls = e.runner().calls();
        let call = &calls[0];
        assert_eq!(call.program(), Path::new("borg"));
        assert_eq!(
            call.argv_lossy(),
            vec![
                "create",
                "--verbose",
                "--stats",
                "--compression",
                "lz4",
                "--exclude-caches",
                "--exclude",
                "/home/*/.cache/*",
                "::home-2024-03-15_02:00:07",
                "/home",
            ]
        );
        assert_eq!(call.output_policy(), OutputPolicy::Inherit);
    }

    #[test]
    fn test_prune_keep_counts() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Normal);
        e.prune_archives(&RetentionPolicy::default()).unwrap();

        let args = e.runner().calls()[0].argv_lossy();
        assert_eq!(
            args,
            vec![
                "prune",
                "--verbose",
                "--list",
                "--glob-archives",
                "home-*",
                "--keep-daily",
                "7",
                "--keep-weekly",
                "4",
                "--keep-monthly",
                "6",
            ]
        );
    }

    #[test]
    fn test_quiet_drops_progress_flags_and_output() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Quiet);
        e.create_archive("home-x").unwrap();
        e.extract_archive("home-x").unwrap();

        let calls = e.runner().calls();
        for call in &calls {
            let args = call.argv_lossy();
            assert!(!args.iter().any(|a| a == "--verbose" || a == "--stats" || a == "--list"));
            assert_eq!(call.output_policy(), OutputPolicy::Discard);
        }
    }

    #[test]
    fn test_debug_lists_created_files() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Debug);
        e.create_archive("home-x").unwrap();

        let args = e.runner().calls()[0].argv_lossy();
        assert!(args.contains(&"--list".to_string()));
    }

    #[test]
    fn test_warning_exit_counts_as_success() {
        let e = engine(ScriptedRunner::always(1), Verbosity::Normal);
        assert!(e.create_archive("home-x").is_ok());
        assert!(e.prune_archives(&RetentionPolicy::default()).is_ok());
        assert!(e.extract_archive("home-x").is_ok());
    }

    #[test]
    fn test_error_exit_maps_to_stage_error() {
        let e = engine(ScriptedRunner::always(2), Verbosity::Normal);
        assert!(matches!(e.create_archive("home-x"), Err(BahmError::Backup(_))));
        assert!(matches!(
            e.prune_archives(&RetentionPolicy::default()),
            Err(BahmError::Prune(_))
        ));
        assert!(matches!(e.extract_archive("home-x"), Err(BahmError::Restore(_))));
        assert!(matches!(e.check_repository(), Err(BahmError::Repository(_))));
    }

    #[test]
    fn test_signal_termination_is_failure() {
        let e = engine(ScriptedRunner::new(|_| ProcessOutput::default()), Verbosity::Normal);
        let err = e.create_archive("home-x").unwrap_err();
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_extract_runs_from_restore_root() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Normal);
        e.extract_archive("home-2024-03-15_02:00:07").unwrap();

        let calls = e.runner().calls();
        let call = &calls[0];
        assert_eq!(call.working_dir(), Some(Path::new("/")));
        assert_eq!(call.argv_lossy().last().unwrap(), "::home-2024-03-15_02:00:07");
    }

    #[test]
    fn test_check_repository_arguments() {
        let e = engine(ScriptedRunner::always(0), Verbosity::Normal);
        e.check_repository().unwrap();
        assert_eq!(e.runner().calls()[0].argv_lossy(), vec!["check", "--repository-only"]);
        assert_eq!(e.runner().calls()[0].output_policy(), OutputPolicy::Capture);
    }

    #[test]
    fn test_list_archives_parses_json() {
        let e = engine(
            listing(
                r#"{"archives": [
                    {"archive": "home-2024-01-01_02:00:00", "name": "home-2024-01-01_02:00:00", "id": "aa", "start": "2024-01-01T02:00:00.000000", "time": "2024-01-01T02:00:00.000000"},
                    {"archive": "home-2024-03-15_02:00:00", "name": "home-2024-03-15_02:00:00", "id": "bb", "start": "2024-03-15T02:00:00.000000", "time": "2024-03-15T02:00:00.000000"}
                ], "encryption": {"mode": "repokey"}}"#,
            ),
            Verbosity::Normal,
        );

        let archives = e.list_archives().unwrap();
        assert_eq!(archives.len(), 2);
        assert_eq!(archives[1].name, "home-2024-03-15_02:00:00");
        assert_eq!(archives[1].created.month(), 3);
        assert_eq!(archives[1].created.hour(), 2);

        let args = e.runner().calls()[0].argv_lossy();
        assert_eq!(args, vec!["list", "--json", "--glob-archives", "home-*"]);
    }

    #[test]
    fn test_list_archives_garbage_is_restore_error() {
        let e = engine(listing("not json"), Verbosity::Normal);
        assert!(matches!(e.list_archives(), Err(BahmError::Restore(_))));
    }

    #[test]
    fn test_list_failure_includes_stderr() {
        let e = engine(
            ScriptedRunner::new(|_| ProcessOutput {
                code: Some(2),
                stdout: String::new(),
                stderr: "passphrase supplied in BORG_PASSPHRASE is incorrect\n".into(),
            }),
            Verbosity::Normal,
        );
        let err = e.list_archives().unwrap_err();
        assert!(err.to_string().contains("passphrase supplied"));
    }

    #[test]
    fn test_parse_borg_time_formats() {
        let naive = parse_borg_time("2024-03-15T02:00:07.123456").unwrap();
        assert_eq!(naive.day(), 15);
        assert_eq!(naive.second(), 7);
        assert!(parse_borg_time("2024-03-15T02:00:07").is_some());
        assert!(parse_borg_time("2024-03-15T02:00:07+00:00").is_some());
        assert!(parse_borg_time("yesterday").is_none());
    }

    #[test]
    fn test_check_environment_requires_repository_config() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        // `sh` stands in for the engine binary; only its presence matters here
        settings.borg_binary = PathBuf::from("sh");
        let repo = temp.path().join("borgrepo");
        std::fs::create_dir_all(&repo).unwrap();

        let e = BorgEngine::new(
            ScriptedRunner::always(0),
            repo.clone(),
            SecureString::new("x"),
            settings,
            Verbosity::Normal,
        );
        assert!(matches!(e.check_environment(), Err(BahmError::Environment(_))));

        std::fs::write(repo.join("config"), "[repository]\n").unwrap();
        e.check_environment().unwrap();
    }

    #[test]
    fn test_check_environment_missing_binary() {
        let mut settings = Settings::default();
        settings.borg_binary = PathBuf::from("/nonexistent/borg");
        let e = BorgEngine::new(
            ScriptedRunner::always(0),
            PathBuf::from("/nonexistent/repo"),
            SecureString::new("x"),
            settings,
            Verbosity::Normal,
        );
        let err = e.check_environment().unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
