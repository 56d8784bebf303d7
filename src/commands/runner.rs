use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{GatewayError, Result};

/// Outcome of one external command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Best diagnostic text for a failed execution.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Asynchronous execution of an opaque command descriptor.
///
/// An `Err` means the command could not be run at all; a command that ran
/// and exited non-zero is reported through [`CommandOutput::status`] so
/// callers decide what a failure means for them.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs command lines through `sh -c` with piped output.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        log::debug!("Executing command: {}", truncate_for_log(command));

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GatewayError::ExecError(format!("failed to spawn command: {e}")))?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn truncate_for_log(command: &str) -> String {
    const MAX: usize = 48;
    if command.chars().count() > MAX {
        let head: String = command.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        command.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let output = CommandOutput {
            status: 1,
            stdout: "partial".to_string(),
            stderr: "boom".to_string(),
        };
        assert_eq!(output.diagnostic(), "boom");
    }

    #[test]
    fn test_diagnostic_falls_back_to_stdout() {
        let output = CommandOutput {
            status: 1,
            stdout: "only stdout".to_string(),
            stderr: "  ".to_string(),
        };
        assert_eq!(output.diagnostic(), "only stdout");
    }

    #[test]
    fn test_truncate_for_log() {
        let long = "x".repeat(100);
        assert!(truncate_for_log(&long).ends_with("..."));
        assert_eq!(truncate_for_log("short"), "short");
    }
}
