// src/process.rs

//! Process spawning for git, makepkg and pacman
//!
//! Commands are described by a [`ProcessSpec`]: an argument vector, a
//! working directory, an optional user to run as, and an optional log file
//! that receives stdout and stderr. Nothing is passed through a shell, so
//! package names never need quoting.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Description of one external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Run as this user (via `sudo -H -u`) instead of the current one
    pub run_as: Option<String>,
    pub env: Vec<(String, String)>,
    /// Append stdout and stderr to this file
    pub output: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            run_as: None,
            env: Vec::new(),
            output: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn run_as(mut self, user: Option<String>) -> Self {
        self.run_as = user;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Human-readable command line, for logs only
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Full argument vector after user de-escalation is applied
    ///
    /// `sudo` resets the environment, so variables are passed through
    /// `env` on the far side.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(user) = &self.run_as {
            argv.extend(["sudo", "-H", "-u", user.as_str(), "--"].map(String::from));
            if !self.env.is_empty() {
                argv.push("env".to_string());
                argv.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
            }
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited with this status code
    Exited(i32),
    /// Killed by a signal
    Signaled,
    /// Exceeded its timeout and was killed
    TimedOut,
}

impl ProcessOutcome {
    pub fn success(self) -> bool {
        self == ProcessOutcome::Exited(0)
    }

    pub fn code(self) -> Option<i32> {
        match self {
            ProcessOutcome::Exited(code) => Some(code),
            _ => None,
        }
    }
}

/// Runs external commands
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, sending output to `spec.output` (or discarding it)
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome>;

    /// Run to completion and capture stdout
    fn capture(&self, spec: &ProcessSpec) -> Result<(ProcessOutcome, String)>;
}

/// Runner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &ProcessSpec) -> Command {
        let argv = spec.argv();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if spec.run_as.is_none() {
            cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutcome> {
        debug!("Running: {}", spec.display());
        let mut cmd = Self::command(spec);

        match &spec.output {
            Some(path) => {
                let log = open_append(path)?;
                cmd.stdout(Stdio::from(log.try_clone()?));
                cmd.stderr(Stdio::from(log));
            }
            None => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::CommandFailed(format!("Failed to spawn {}: {e}", spec.program)))?;

        let status = match spec.timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    warn!("{} timed out after {}s", spec.program, limit.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(ProcessOutcome::TimedOut);
                }
            },
            None => child.wait()?,
        };

        Ok(match status.code() {
            Some(code) => ProcessOutcome::Exited(code),
            None => ProcessOutcome::Signaled,
        })
    }

    fn capture(&self, spec: &ProcessSpec) -> Result<(ProcessOutcome, String)> {
        debug!("Capturing: {}", spec.display());
        let output = Self::command(spec)
            .stderr(Stdio::null())
            .output()
            .map_err(|e| Error::CommandFailed(format!("Failed to run {}: {e}", spec.program)))?;

        let outcome = match output.status.code() {
            Some(code) => ProcessOutcome::Exited(code),
            None => ProcessOutcome::Signaled,
        };
        Ok((outcome, String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

/// Open a file for appending, creating it if needed
pub fn open_append(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {e}", path.display())))
}
