//! Shell command task

use crate::error::{Result, TaskGateError};
use crate::models::{ShellTaskConfig, MAX_OUTPUT_SIZE};
use crate::parser::validate_shell_config;
use crate::task::Task;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default per-command timeout when the task list does not set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Task that runs a local command without shell interpolation
///
/// A non-zero exit status or a timeout is reported as a task failure.
#[derive(Debug, Clone)]
pub struct ShellTask {
    config: ShellTaskConfig,
}

impl ShellTask {
    /// Create a shell task after validating its configuration
    pub fn new(config: ShellTaskConfig) -> Result<Self> {
        validate_shell_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ShellTaskConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    async fn run_command(&self) -> Result<()> {
        let config = &self.config;
        debug!("Command args: {:?}", config.args);

        // Individual args, no shell interpolation
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(workdir) = &config.workdir {
            cmd.current_dir(workdir);
        }

        if let Some(env) = &config.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        // Kill the child if the future is dropped on timeout
        cmd.kill_on_drop(true);

        let timeout = self.timeout();
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(TaskGateError::TaskTimeout {
                    task: config.name.clone(),
                    timeout: timeout.as_secs(),
                })
            }
        };

        let (stdout, stdout_truncated) = truncate_output(&output.stdout);
        let (stderr, stderr_truncated) = truncate_output(&output.stderr);
        if stdout_truncated || stderr_truncated {
            debug!("Output truncated to {} bytes", MAX_OUTPUT_SIZE);
        }
        debug!(task = %config.name, stdout = %stdout.trim_end(), "Command output");

        if output.status.success() {
            info!(
                task = %config.name,
                exit_code = ?output.status.code(),
                "Command completed"
            );
            Ok(())
        } else {
            Err(TaskGateError::CommandFailed {
                command: config.command.clone(),
                code: output.status.code(),
                stderr: stderr.trim_end().to_string(),
            })
        }
    }
}

#[async_trait]
impl Task for ShellTask {
    async fn run(&self) -> anyhow::Result<()> {
        info!("Executing shell command: {}", self.config.command);
        self.run_command().await?;
        Ok(())
    }

    fn name(&self) -> String {
        self.config.name.clone()
    }
}

/// Truncate captured output to MAX_OUTPUT_SIZE
///
/// Returns (truncated_string, was_truncated)
fn truncate_output(data: &[u8]) -> (String, bool) {
    let truncated = data.len() > MAX_OUTPUT_SIZE;
    let bytes = if truncated {
        &data[..MAX_OUTPUT_SIZE]
    } else {
        data
    };

    (String::from_utf8_lossy(bytes).to_string(), truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(name: &str, command: &str, args: &[&str]) -> ShellTaskConfig {
        ShellTaskConfig {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            workdir: None,
            env: None,
            timeout: Some(10),
        }
    }

    #[tokio::test]
    async fn test_shell_task_success() {
        let task = ShellTask::new(shell("echo", "/bin/echo", &["hello"])).unwrap();
        assert_eq!(task.name(), "echo");
        assert!(task.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_shell_task_nonzero_exit_fails() {
        let task = ShellTask::new(shell("fail", "/bin/sh", &["-c", "echo oops >&2; exit 3"])).unwrap();
        let err = task.run().await.unwrap_err();
        match err.downcast_ref::<TaskGateError>() {
            Some(TaskGateError::CommandFailed { code, stderr, .. }) => {
                assert_eq!(*code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shell_task_timeout() {
        let mut config = shell("slow", "/bin/sleep", &["5"]);
        config.timeout = Some(1);
        let task = ShellTask::new(config).unwrap();
        let err = task.run().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_shell_task_env() {
        let mut config = shell("env", "/bin/sh", &["-c", "test \"$GREETING\" = hi"]);
        config.env = Some([("GREETING".to_string(), "hi".to_string())].into());
        let task = ShellTask::new(config).unwrap();
        assert!(task.run().await.is_ok());
    }

    #[test]
    fn test_shell_task_rejects_relative_command() {
        assert!(matches!(
            ShellTask::new(shell("rel", "echo", &[])),
            Err(TaskGateError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_truncate_output() {
        let (out, truncated) = truncate_output(b"hello");
        assert_eq!(out, "hello");
        assert!(!truncated);

        let big = vec![b'a'; MAX_OUTPUT_SIZE + 10];
        let (out, truncated) = truncate_output(&big);
        assert_eq!(out.len(), MAX_OUTPUT_SIZE);
        assert!(truncated);
    }
}
