//! External process invocation
//!
//! Every mount, lsblk and borg call goes through [`CommandRunner`], so the
//! adapters above it can be exercised with a scripted runner instead of real
//! processes.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::config::Verbosity;
use crate::error::{BahmError, BahmResult};
use crate::secret::SecureString;

/// What happens to a child's stdout and stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Collect both streams for inspection
    Capture,
    /// Let the child write straight to our terminal
    Inherit,
    /// Throw both streams away
    Discard,
}

impl OutputPolicy {
    /// Policy for engine commands whose output is meant for the user
    pub fn for_user_output(verbosity: Verbosity) -> Self {
        if verbosity.is_quiet() {
            Self::Discard
        } else {
            Self::Inherit
        }
    }
}

/// A fully described external command
#[derive(Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(String, SecureString)>,
    current_dir: Option<PathBuf>,
    output: OutputPolicy,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            output: OutputPolicy::Capture,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child only
    pub fn env(mut self, key: impl Into<String>, value: impl Into<SecureString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn output(mut self, policy: OutputPolicy) -> Self {
        self.output = policy;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as lossy UTF-8, for logs and assertions
    pub fn argv_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn output_policy(&self) -> OutputPolicy {
        self.output
    }

    /// Render the command line; environment values are never included
    pub fn describe(&self) -> String {
        let mut line = String::new();
        for (key, _) in &self.envs {
            line.push_str(key);
            line.push_str("=*** ");
        }
        line.push_str(&self.program.display().to_string());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        for (key, value) in &self.envs {
            cmd.env(key, value.as_str());
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.describe())
            .field("current_dir", &self.current_dir)
            .field("output", &self.output)
            .finish()
    }
}

/// Result of a finished child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured stdout; empty unless the policy was `Capture`
    pub stdout: String,
    /// Captured stderr; empty unless the policy was `Capture`
    pub stderr: String,
}

impl ProcessOutput {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// True when the child exited normally with a code no greater than `max`
    pub fn code_at_most(&self, max: i32) -> bool {
        matches!(self.code, Some(code) if (0..=max).contains(&code))
    }

    /// Exit status for messages
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Last few non-empty stderr lines, joined for an error message
    pub fn stderr_tail(&self, lines: usize) -> Option<String> {
        let tail: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if tail.is_empty() {
            return None;
        }
        let start = tail.len().saturating_sub(lines);
        Some(tail[start..].join(" | "))
    }

    fn from_output(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs external commands to completion
pub trait CommandRunner {
    /// Run the command and wait for it
    ///
    /// A non-zero exit is not an error at this level; only failing to start
    /// or wait for the child is.
    fn run(&self, invocation: &Invocation) -> BahmResult<ProcessOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    verbosity: Verbosity,
}

impl SystemRunner {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> BahmResult<ProcessOutput> {
        debug!(command = %invocation.describe(), "running");

        let mut cmd = invocation.to_command();
        let spawn_err = |e: std::io::Error| {
            BahmError::Io(format!(
                "Failed to run {}: {}",
                invocation.program().display(),
                e
            ))
        };

        let output = match invocation.output_policy() {
            OutputPolicy::Capture => ProcessOutput::from_output(cmd.output().map_err(spawn_err)?),
            OutputPolicy::Inherit => {
                let status = cmd
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .map_err(spawn_err)?;
                ProcessOutput {
                    code: status.code(),
                    ..ProcessOutput::default()
                }
            }
            OutputPolicy::Discard => {
                let status = cmd
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .map_err(spawn_err)?;
                ProcessOutput {
                    code: status.code(),
                    ..ProcessOutput::default()
                }
            }
        };

        debug!(
            program = %invocation.program().display(),
            status = %output.status_text(),
            "finished"
        );
        if self.verbosity.is_debug() {
            if !output.stdout.trim().is_empty() {
                debug!(stdout = %output.stdout.trim_end(), "captured stdout");
            }
            if !output.stderr.trim().is_empty() {
                debug!(stderr = %output.stderr.trim_end(), "captured stderr");
            }
        }

        Ok(output)
    }
}
