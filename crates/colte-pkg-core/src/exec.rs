//! External tool execution.
//!
//! Every git, docker, build-script and reprepro invocation goes through a
//! [`CommandRunner`]. [`ProcessRunner`] spawns real processes; tests swap
//! in [`crate::fakes::ScriptedRunner`].

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// What to do with a child's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream straight to the terminal (long builds).
    Inherit,

    /// Capture for inspection by the caller.
    Capture,
}

/// A single external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,

    /// Arguments, in order.
    pub args: Vec<String>,

    /// Working directory (inherits ours when `None`).
    pub cwd: Option<PathBuf>,

    /// Output handling.
    pub output: OutputMode,
}

impl ToolCommand {
    /// Start a command whose output is streamed to the terminal.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            output: OutputMode::Inherit,
        }
    }

    /// Build from an argv-style vector (first element is the program).
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PipelineError::InvalidConfig("empty command".to_string()))?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Capture stdout/stderr instead of streaming them.
    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Capture;
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout (empty for [`OutputMode::Inherit`]).
    pub stdout: String,

    /// Captured stderr (empty for [`OutputMode::Inherit`]).
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Both streams, stderr last; tools disagree on where errors go.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Turn a non-zero exit into [`PipelineError::CommandFailed`].
    pub fn check(self, command: &ToolCommand) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(PipelineError::CommandFailed {
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.combined(),
            })
        }
    }
}

/// Executes external tools.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and report the exit status, successful or not.
    ///
    /// Errors only when the process could not be started.
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput>;

    /// Run to completion, failing on a non-zero exit.
    async fn run_checked(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.run(command).await?.check(command)
    }
}

/// Runs commands as child processes of this one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(command = %command, cwd = ?command.cwd, "Running command");

        if command.program.is_empty() {
            return Err(PipelineError::InvalidConfig("empty command".to_string()));
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let spawn_err = |source| PipelineError::Spawn {
            program: command.program.clone(),
            source,
        };

        let (status, stdout, stderr) = match command.output {
            OutputMode::Inherit => {
                let status = cmd.status().await.map_err(spawn_err)?;
                (status, String::new(), String::new())
            }
            OutputMode::Capture => {
                let output = cmd
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(spawn_err)?;
                (
                    output.status,
                    String::from_utf8_lossy(&output.stdout).to_string(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                )
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);
        debug!(command = %command, exit_code, duration_ms, "Command finished");

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}
