//! Build progress reporting, for the purpose of display to the user.

use crate::task::{TaskResult, Termination};
use std::io::Write;

/// Trait for build progress notifications.
pub trait Progress {
    /// Called when a builder is about to execute.  `command` is the expanded
    /// command line, for rules that have one.
    fn task_started(&mut self, description: &str, command: Option<&str>);

    /// Called when an execution completes, successfully or not.
    fn task_finished(&mut self, description: &str, result: &TaskResult);

    /// Log a line of output.
    fn log(&mut self, msg: &str);
}

/// Progress implementation for a plain console, one line per event.
#[derive(Default)]
pub struct ConsoleProgress {
    /// Whether to print command lines of started programs.
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        ConsoleProgress { verbose }
    }
}

impl Progress for ConsoleProgress {
    fn task_started(&mut self, description: &str, command: Option<&str>) {
        match command {
            Some(command) if self.verbose => self.log(command),
            _ => self.log(description),
        }
    }

    fn task_finished(&mut self, description: &str, result: &TaskResult) {
        match result.termination {
            Termination::Success => {}
            Termination::Interrupted => self.log(&format!("interrupted: {}", description)),
            Termination::Failure => self.log(&format!("failed: {}", description)),
        }
        if !result.output.is_empty() {
            let mut stdout = std::io::stdout();
            // Best effort: a closed stdout shouldn't fail the build.
            let _ = stdout.write_all(&result.output);
            let _ = stdout.flush();
        }
    }

    fn log(&mut self, msg: &str) {
        println!("{}", msg);
    }
}

/// Progress implementation that prints nothing.
#[derive(Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn task_started(&mut self, _description: &str, _command: Option<&str>) {}
    fn task_finished(&mut self, _description: &str, _result: &TaskResult) {}
    fn log(&mut self, _msg: &str) {}
}
