//! Typed External Command Execution
//!
//! Every collaborator the installer talks to (dpkg, apt-get, git, cargo,
//! curl, systemctl, install) is invoked through a [`ToolCommand`] handed to a
//! [`CommandRunner`]. The runner is the only place that touches
//! `std::process::Command`, which keeps the steps testable with a recording
//! fake and gives one place to apply privilege escalation and dry-run.
//!
//! # Privilege
//!
//! Commands marked [`ToolCommand::privileged`] are wrapped in `sudo` when the
//! single start-up check ([`Privilege::detect`](crate::sanity::Privilege))
//! decided that the installer is not already root.
//!
//! # Dry run
//!
//! Mutating commands are logged and reported as successful without being
//! executed. Read-only probes still run so the log reflects the real host.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{ProvisionError, Result};
use crate::process_guard::CommandLifecycle;
use crate::sanity::Privilege;

/// A single invocation of an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child; the installer never changes its own
    pub current_dir: Option<PathBuf>,
    /// Needs root (wrapped in sudo when not already root)
    pub privileged: bool,
    /// Changes host state (skipped in dry-run)
    pub mutating: bool,
    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture_output: bool,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            privileged: false,
            mutating: false,
            capture_output: false,
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

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Requires root. Privileged commands are always mutating.
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self.mutating = true;
        self
    }

    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// First argument, usually the subcommand (`clone`, `install`, ...)
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output (empty unless captured)
    pub stdout: String,
    /// Standard error (empty unless captured)
    pub stderr: String,
    /// Exit code (None if terminated by signal or skipped)
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
            success: true,
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
            success: false,
        }
    }

    /// Result reported for a mutating command skipped by dry-run
    pub fn skipped() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(ProvisionError::CommandFailed {
                context: context.to_string(),
                code: self.exit_code.unwrap_or(-1),
                detail: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Executes [`ToolCommand`]s.
///
/// `Err` is reserved for commands that could not be started; a command that
/// ran and exited non-zero is an `Ok` output with `success == false`.
pub trait CommandRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutput>;

    /// Whether mutating commands are being skipped
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs commands on the real host.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    privilege: Privilege,
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(privilege: Privilege) -> Self {
        Self {
            privilege,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn build(&self, command: &ToolCommand) -> Command {
        let mut cmd = if command.privileged && self.privilege == Privilege::Sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&command.program);
            cmd
        } else {
            Command::new(&command.program)
        };
        cmd.args(&command.args).stdin(Stdio::inherit()).die_with_parent();

        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }
        // output() pipes both streams unless told otherwise
        if command.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        cmd
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<CommandOutput> {
        if self.dry_run && command.mutating {
            info!("[dry-run] would run: {}", command);
            return Ok(CommandOutput::skipped());
        }

        debug!(privileged = command.privileged, "running: {}", command);

        let output = self
            .build(command)
            .output()
            .map_err(|source| ProvisionError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        };

        debug!(
            "{} exited with {:?}",
            command.program,
            result.exit_code
        );
        Ok(result)
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Run a read-only probe; a program that cannot be started counts as failure.
pub fn probe(runner: &mut dyn CommandRunner, command: &ToolCommand) -> bool {
    match runner.run(command) {
        Ok(output) => output.success,
        Err(e) => {
            debug!("probe `{}` could not run: {}", command, e);
            false
        }
    }
}
