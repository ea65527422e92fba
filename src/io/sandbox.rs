//! Sandboxed execution of candidate programs.
//!
//! Isolation here means a separate interpreter process on an ephemeral
//! scratch file, nothing stronger: no filesystem or network fencing and no
//! resource quotas beyond the wall-clock timeout.

use std::io::Write;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::Builder;
use tracing::{debug, instrument};

use crate::core::types::ExecOutcome;
use crate::io::config::InterpreterConfig;
use crate::io::process::run_command_with_timeout;

/// Timeout reply contract: the classifier matches this text verbatim.
pub const TIMEOUT_MESSAGE: &str = "Execution timed out.";

/// Abstraction over candidate-program execution backends.
pub trait Sandbox {
    /// Run one candidate program, bounded by `timeout` wall-clock.
    ///
    /// Returns captured stdout/stderr as text; partial output from a failed
    /// process is kept, and a timeout yields exactly
    /// `("", "Execution timed out.")`.
    fn execute(&self, code: &str, timeout: Duration) -> Result<ExecOutcome>;
}

/// Sandbox that materializes code into a uniquely named scratch file and
/// runs the configured interpreter on it in a child process.
pub struct InterpreterSandbox {
    interpreter: InterpreterConfig,
}

impl InterpreterSandbox {
    pub fn new(interpreter: InterpreterConfig) -> Self {
        Self { interpreter }
    }
}

impl Sandbox for InterpreterSandbox {
    #[instrument(skip_all, fields(timeout_secs = timeout.as_secs()))]
    fn execute(&self, code: &str, timeout: Duration) -> Result<ExecOutcome> {
        // NamedTempFile removes the file on drop, covering every exit path
        // out of this function, timeout and panic included.
        let mut scratch = Builder::new()
            .suffix(&self.interpreter.extension)
            .tempfile()
            .context("create scratch source file")?;
        scratch
            .write_all(code.as_bytes())
            .context("write candidate code")?;
        scratch.flush().context("flush candidate code")?;

        let (program, args) = self
            .interpreter
            .command
            .split_first()
            .context("interpreter command must not be empty")?;
        let mut cmd = Command::new(program);
        cmd.args(args).arg(scratch.path());

        let output = run_command_with_timeout(cmd, None, timeout)?;
        if output.timed_out {
            debug!("candidate execution timed out");
            return Ok(ExecOutcome {
                stdout: String::new(),
                stderr: TIMEOUT_MESSAGE.to_string(),
            });
        }

        debug!(exit_code = ?output.status.code(), "candidate execution finished");
        Ok(ExecOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    // Shell is used as the interpreter so tests don't depend on a Python
    // installation.
    fn shell_sandbox() -> InterpreterSandbox {
        InterpreterSandbox::new(InterpreterConfig {
            command: vec!["sh".to_string()],
            extension: ".sh".to_string(),
        })
    }

    #[test]
    fn clean_run_captures_stdout() {
        let sandbox = shell_sandbox();
        let outcome = sandbox
            .execute("echo ok", Duration::from_secs(5))
            .expect("execute");
        assert_eq!(outcome.stdout, "ok\n");
        assert_eq!(outcome.stderr, "");
        assert!(outcome.is_clean());
    }

    #[test]
    fn failing_run_keeps_partial_output() {
        let sandbox = shell_sandbox();
        let outcome = sandbox
            .execute("echo partial; echo boom >&2; exit 3", Duration::from_secs(5))
            .expect("execute");
        assert_eq!(outcome.stdout, "partial\n");
        assert_eq!(outcome.stderr, "boom\n");
        assert!(!outcome.is_clean());
    }

    /// The timeout contract is literal: empty stdout plus the exact
    /// message, returned within a small bounded overhead.
    #[test]
    fn infinite_loop_hits_the_timeout_contract() {
        let sandbox = shell_sandbox();
        let start = Instant::now();
        let outcome = sandbox
            .execute("while :; do :; done", Duration::from_secs(1))
            .expect("execute");
        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.stderr, TIMEOUT_MESSAGE);
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
