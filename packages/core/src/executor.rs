//! Command execution abstraction with privilege escalation support.
//!
//! Blocking commands (`umount`) can be wrapped with `sudo` or `pkexec` when
//! the poller does not run as root. Long-running commands (the post-processor)
//! are spawned detached and never waited on by the caller.

use std::ffi::OsStr;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// Privilege escalation method for executing commands that require root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivilegeEscalation {
    /// Execute directly without privilege escalation.
    #[default]
    None,
    /// Use `pkexec` for GUI-based privilege escalation (polkit).
    Pkexec,
    /// Use `sudo` for TTY-based privilege escalation.
    Sudo,
}

impl PrivilegeEscalation {
    fn wrapper(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Pkexec => Some("pkexec"),
            Self::Sudo => Some("sudo"),
        }
    }
}

/// Execution context for running system commands.
///
/// # Example
///
/// ```
/// use n2p_dcim_core::executor::{ExecutionContext, PrivilegeEscalation};
///
/// let ctx = ExecutionContext::default();
/// assert_eq!(ctx.escalation(), PrivilegeEscalation::None);
///
/// let sudo = ExecutionContext::with_escalation(PrivilegeEscalation::Sudo);
/// assert_eq!(sudo.escalation(), PrivilegeEscalation::Sudo);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    escalation: PrivilegeEscalation,
}

impl ExecutionContext {
    /// Creates a new execution context with no privilege escalation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an execution context with a specific escalation method.
    pub fn with_escalation(escalation: PrivilegeEscalation) -> Self {
        Self { escalation }
    }

    /// Returns the current privilege escalation method.
    pub fn escalation(&self) -> PrivilegeEscalation {
        self.escalation
    }

    /// Executes a command that may require root privileges.
    pub fn run_privileged(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        match self.escalation.wrapper() {
            None => run_command(cmd, args),
            Some(wrapper) => run_with_wrapper(wrapper, cmd, args),
        }
    }

    /// Executes a command that may require root privileges, checking for success.
    pub fn run_privileged_checked(&self, cmd: &str, args: &[&str]) -> Result<()> {
        let output = self.run_privileged(cmd, args)?;

        if !output.status.success() {
            return Err(Error::CommandExit {
                command: cmd.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    /// Spawns `program args..` in `cwd` without waiting for it.
    ///
    /// The child gets its own process group so an interrupt delivered to the
    /// poller's terminal does not reach it. A background thread reaps the
    /// child once it exits; the caller never sees its status.
    pub fn spawn_detached(&self, program: &Path, args: &[&OsStr], cwd: &Path) -> Result<u32> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|e| Error::Launch {
                program: program.display().to_string(),
                cwd: cwd.to_path_buf(),
                source: e,
            })?;

        let pid = child.id();
        thread::spawn(move || {
            let _ = child.wait();
            debug!("Detached process {} exited", pid);
        });

        Ok(pid)
    }
}

/// Runs a command directly without any wrapper.
fn run_command(cmd: &str, args: &[&str]) -> Result<Output> {
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .command_context(cmd)
}

/// Runs a command with a privilege escalation wrapper (pkexec or sudo).
fn run_with_wrapper(wrapper: &str, cmd: &str, args: &[&str]) -> Result<Output> {
    let mut wrapper_args = vec![cmd];
    wrapper_args.extend(args);

    Command::new(wrapper)
        .args(&wrapper_args)
        .output()
        .command_context(format!("{} {}", wrapper, cmd))
}
