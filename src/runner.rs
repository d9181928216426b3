//! Command execution
//!
//! [`CommandRunner`] is the only way the installer starts external programs.
//! [`SystemRunner`] spawns real processes with process-group isolation and
//! registers them for cleanup; [`RecordingRunner`] records what would have
//! run, for tests.
//!
//! # Dry run
//!
//! A dry-run `SystemRunner` still executes read-only commands (disk
//! listings) but only logs commands whose [`SystemCommand::runs_in_dry_run`]
//! is false, returning an empty successful [`CommandOutput`] for them.

use crate::commands::SystemCommand;
use crate::error::{InstallError, Result};
use crate::process_guard::{CommandProcessGroup, TrackedChild};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Where a child's stdout and stderr go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Straight to the installer's terminal
    Inherit,
    /// Collected into [`CommandOutput`]
    Capture,
}

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Captured standard output (empty when inherited)
    pub stdout: String,
    /// Captured standard error (empty when inherited)
    pub stderr: String,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    pub success: bool,
    /// The command was only logged, not executed
    pub dry_run: bool,
}

impl CommandOutput {
    /// Output standing in for a command a dry run skipped
    pub fn skipped() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
            dry_run: true,
            ..Default::default()
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, command: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(InstallError::CommandFailed {
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Executes typed commands.
pub trait CommandRunner {
    /// Run `command` to completion.
    ///
    /// A non-zero exit is not an error here; see [`run_checked`].
    fn run(&mut self, command: &dyn SystemCommand, mode: OutputMode) -> Result<CommandOutput>;
}

/// Run with inherited output and fail on a non-zero exit.
pub fn run_checked(runner: &mut dyn CommandRunner, command: &dyn SystemCommand) -> Result<CommandOutput> {
    let output = runner.run(command, OutputMode::Inherit)?;
    output.ensure_success(&command.describe())?;
    Ok(output)
}

/// Run with captured output and fail on a non-zero exit.
pub fn capture_checked(
    runner: &mut dyn CommandRunner,
    command: &dyn SystemCommand,
) -> Result<CommandOutput> {
    let output = runner.run(command, OutputMode::Capture)?;
    output.ensure_success(&command.describe())?;
    Ok(output)
}

/// Run with inherited output; a non-zero exit is only logged.
///
/// For diagnostics such as disk listings, where a failure must not stop the
/// install.
pub fn run_unchecked(runner: &mut dyn CommandRunner, command: &dyn SystemCommand) -> Result<CommandOutput> {
    let output = runner.run(command, OutputMode::Inherit)?;
    if !output.success {
        warn!(
            "{} exited with {:?}; continuing",
            command.describe(),
            output.exit_code
        );
    }
    Ok(output)
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &dyn SystemCommand, mode: OutputMode) -> Result<CommandOutput> {
        let program = command.program();
        let line = command.describe();

        if self.dry_run && !command.runs_in_dry_run() {
            info!("[dry-run] {}", line);
            return Ok(CommandOutput::skipped());
        }

        info!("Running: {}", line);

        let stdin_text = command.stdin();
        let mut cmd = Command::new(program);
        cmd.args(command.args());

        if command.is_interactive() {
            // Must stay in the foreground group to read the terminal
            cmd.with_parent_death_signal();
        } else {
            cmd.in_new_process_group();
        }

        cmd.stdin(match (&stdin_text, command.is_interactive()) {
            (Some(_), _) => Stdio::piped(),
            (None, true) => Stdio::inherit(),
            (None, false) => Stdio::null(),
        });
        let (stdout, stderr) = match mode {
            OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
            OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
        };
        cmd.stdout(stdout).stderr(stderr);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => InstallError::CommandNotFound(program.to_string()),
            _ => InstallError::Io(e),
        })?;
        let _tracked = TrackedChild::register(child.id());

        let writer = match (child.stdin.take(), stdin_text) {
            (Some(mut pipe), Some(text)) => Some(std::thread::spawn(move || {
                pipe.write_all(text.as_bytes())
            })),
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The child may exit before reading everything; its status says why
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin early", program);
                }
                Ok(Err(e)) => return Err(InstallError::Io(e)),
                Err(_) => {
                    return Err(InstallError::Io(io::Error::other(
                        "stdin writer thread panicked",
                    )));
                }
            }
        }

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
            dry_run: false,
        };

        if result.success {
            debug!("{} finished successfully", program);
        } else {
            debug!("{} failed with exit code {:?}", program, result.exit_code);
        }
        Ok(result)
    }
}

/// One command as seen by a [`RecordingRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub interactive: bool,
    pub mode: OutputMode,
}

impl RecordedCommand {
    /// `program arg1 arg2...`, unquoted
    pub fn line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runner that never executes anything.
///
/// Every command succeeds with empty output unless scripted otherwise with
/// [`fail_on`](Self::fail_on) or [`respond`](Self::respond).
#[derive(Debug, Default)]
pub struct RecordingRunner {
    pub commands: Vec<RecordedCommand>,
    failures: HashMap<String, i32>,
    missing: Vec<String>,
    responses: HashMap<String, VecDeque<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run of `program` exit with `exit_code`
    pub fn fail_on(mut self, program: &str, exit_code: i32) -> Self {
        self.failures.insert(program.to_string(), exit_code);
        self
    }

    /// Make `program` look absent from PATH
    pub fn missing(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    /// Queue stdout for the next run of `program`
    pub fn respond(mut self, program: &str, stdout: &str) -> Self {
        self.responses
            .entry(program.to_string())
            .or_default()
            .push_back(stdout.to_string());
        self
    }

    /// Command lines in execution order
    pub fn lines(&self) -> Vec<String> {
        self.commands.iter().map(RecordedCommand::line).collect()
    }

    /// Position of the first command whose line starts with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.commands.iter().position(|c| c.line().starts_with(prefix))
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, command: &dyn SystemCommand, mode: OutputMode) -> Result<CommandOutput> {
        let program = command.program();
        if self.missing.iter().any(|m| m == program) {
            return Err(InstallError::CommandNotFound(program.to_string()));
        }

        self.commands.push(RecordedCommand {
            program: program.to_string(),
            args: command.args(),
            stdin: command.stdin(),
            interactive: command.is_interactive(),
            mode,
        });

        if let Some(&code) = self.failures.get(program) {
            return Ok(CommandOutput {
                stderr: format!("{} failed", program),
                exit_code: Some(code),
                success: false,
                ..Default::default()
            });
        }

        let stdout = self
            .responses
            .get_mut(program)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(CommandOutput {
            stdout,
            exit_code: Some(0),
            success: true,
            ..Default::default()
        })
    }
}
