//! Error types for taskgate

use std::fmt;
use thiserror::Error;

/// taskgate error types
#[derive(Error, Debug)]
pub enum TaskGateError {
    /// Concurrency limit must allow at least one running task
    #[error("Concurrency limit must be at least 1 (got {0})")]
    InvalidConcurrencyLimit(usize),

    /// `execute` is one-shot per executor
    #[error("Executor has already been executed")]
    AlreadyExecuted,

    /// One or more tasks failed during execution
    #[error("{}", summarize_failures(.failures))]
    TasksFailed { failures: Vec<TaskFailure> },

    /// YAML parsing errors
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// YAML size exceeded limit
    #[error("Task list YAML exceeds 1MB limit (size: {0} bytes)")]
    YamlSizeExceeded(usize),

    /// Task count exceeded limit
    #[error("Task count {count} exceeds limit of {limit}")]
    TaskCountExceeded { count: usize, limit: usize },

    /// Task name validation error
    #[error("Task name '{name}' exceeds {max} characters")]
    TaskNameTooLong { name: String, max: usize },

    /// Invalid task name format
    #[error("Invalid task name '{name}': only alphanumeric, underscore, and dash allowed")]
    InvalidTaskName { name: String },

    /// Command exceeded its timeout
    #[error("Task '{task}' timed out after {timeout} seconds")]
    TaskTimeout { task: String, timeout: u64 },

    /// Command exited unsuccessfully
    #[error("Command '{command}' exited with status {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Command validation errors
    #[error("Command exceeds {limit} bytes")]
    CommandTooLong { limit: usize },

    /// Argument validation errors
    #[error("Argument count {count} exceeds limit of {limit}")]
    ArgCountExceeded { count: usize, limit: usize },

    #[error("Argument exceeds {limit} bytes")]
    ArgTooLong { limit: usize },

    /// Path validation errors
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path traversal attempt
    #[error("Path traversal detected in: {0}")]
    PathTraversal(String),

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskGateError {
    /// Failures carried by a `TasksFailed` error, empty for any other variant
    pub fn failures(&self) -> &[TaskFailure] {
        match self {
            TaskGateError::TasksFailed { failures } => failures,
            _ => &[],
        }
    }
}

/// Result type alias using TaskGateError
pub type Result<T> = std::result::Result<T, TaskGateError>;

/// A task that returned an error, wrapped with the name of the task
#[derive(Debug)]
pub struct TaskFailure {
    pub task: String,
    pub error: anyhow::Error,
}

impl TaskFailure {
    pub fn new(task: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            task: task.into(),
            error,
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task '{}' failed: {:#}", self.task, self.error)
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

fn summarize_failures(failures: &[TaskFailure]) -> String {
    match failures {
        [] => "Task execution failed".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} task(s) failed, first: {}", rest.len() + 1, first),
    }
}
