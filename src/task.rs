//! Runs build commands as subprocesses.
//! Unaware of the build graph; just command execution.

use anyhow::anyhow;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Termination {
    Success,
    Interrupted,
    Failure,
}

/// The result of executing a build step.
#[derive(Debug)]
pub struct TaskResult {
    pub termination: Termination,
    /// Console output.
    pub output: Vec<u8>,
}

impl TaskResult {
    pub fn success() -> Self {
        TaskResult {
            termination: Termination::Success,
            output: Vec::new(),
        }
    }

    pub fn failure(output: impl Into<Vec<u8>>) -> Self {
        TaskResult {
            termination: Termination::Failure,
            output: output.into(),
        }
    }
}

#[cfg(unix)]
fn shell(cmdline: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("/bin/sh");
    cmd.arg("-c").arg(cmdline);
    cmd
}

#[cfg(windows)]
fn shell(cmdline: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("cmd");
    cmd.arg("/c").arg(cmdline);
    cmd
}

/// Describes how a command that did not exit successfully ended.
#[cfg(unix)]
fn describe_failure(status: &std::process::ExitStatus, output: &mut Vec<u8>) -> Termination {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(libc::SIGINT) => {
            let _ = write!(output, "interrupted");
            Termination::Interrupted
        }
        Some(sig) => {
            let _ = write!(output, "signal {}", sig);
            Termination::Failure
        }
        None => Termination::Failure,
    }
}

#[cfg(windows)]
fn describe_failure(_status: &std::process::ExitStatus, _output: &mut Vec<u8>) -> Termination {
    Termination::Failure
}

/// Executes a command line through the shell, with stdout and stderr
/// collected into one buffer.  Runs in `cwd` if given, else in the current
/// directory.
/// Returns an Err() if we failed outside of the process itself.
pub fn run_command(cmdline: &str, cwd: Option<&Path>) -> anyhow::Result<TaskResult> {
    let mut cmd = shell(cmdline);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let mut cmd = cmd
        .output()
        .map_err(|err| anyhow!("spawn {:?}: {}", cmdline, err))?;
    let mut output = Vec::new();
    output.append(&mut cmd.stdout);
    output.append(&mut cmd.stderr);

    let termination = if cmd.status.success() {
        Termination::Success
    } else {
        describe_failure(&cmd.status, &mut output)
    };
    Ok(TaskResult {
        termination,
        output,
    })
}
