//! Core data models for taskgate

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// Input validation limits for task list files
pub const MAX_YAML_SIZE: usize = 1_048_576; // 1 MB
pub const MAX_TASK_COUNT: usize = 1_000;
pub const MAX_TASK_NAME_LEN: usize = 64;
pub const MAX_COMMAND_LEN: usize = 4_096; // 4 KB
pub const MAX_ARG_COUNT: usize = 256;
pub const MAX_ARG_LEN: usize = 4_096; // 4 KB
pub const MAX_OUTPUT_SIZE: usize = 10_485_760; // 10 MB
pub const MAX_PARALLEL_LIMIT: usize = 256;

/// Executor configuration: concurrency limit and error policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            continue_on_error: false,
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

/// Task list parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: ExecutorConfig,
    pub tasks: Vec<ShellTaskConfig>,
}

/// Local command run as one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellTaskConfig {
    pub name: String,
    pub command: String, // Absolute path to binary
    #[serde(default)]
    pub args: Vec<String>, // Arguments as list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>, // seconds
}

/// Terminal state of one submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    /// `run()` panicked; contained and logged, not a failure
    Panicked,
    /// Cancellation was observed before the task acquired a permit
    SkippedBeforeAdmission,
    /// The task held a permit but the executor was stopping before it ran
    SkippedAfterAdmission,
}

impl TaskOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            TaskOutcome::SkippedBeforeAdmission | TaskOutcome::SkippedAfterAdmission
        )
    }

    /// Whether `run()` returned an error; panics do not count
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failed)
    }

    /// Whether `run()` was invoked for this task
    pub fn was_attempted(&self) -> bool {
        !self.is_skipped()
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Succeeded => write!(f, "succeeded"),
            TaskOutcome::Failed => write!(f, "failed"),
            TaskOutcome::Panicked => write!(f, "panicked"),
            TaskOutcome::SkippedBeforeAdmission => write!(f, "skipped_before_admission"),
            TaskOutcome::SkippedAfterAdmission => write!(f, "skipped_after_admission"),
        }
    }
}

/// Outcome of one task within an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub outcome: TaskOutcome,
    pub duration: Duration,
}

impl TaskRecord {
    pub fn skipped_before_admission(name: String) -> Self {
        Self {
            name,
            outcome: TaskOutcome::SkippedBeforeAdmission,
            duration: Duration::ZERO,
        }
    }
}

/// Summary of one full execution pass, records in submission order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub records: Vec<TaskRecord>,
    pub elapsed: Duration,
    pub peak_concurrency: usize,
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn count(&self, outcome: TaskOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TaskOutcome::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn panicked(&self) -> usize {
        self.count(TaskOutcome::Panicked)
    }

    pub fn skipped(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    /// Outcome of the first task with the given name
    pub fn outcome_of(&self, name: &str) -> Option<TaskOutcome> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_parallel, 4);
        assert!(!config.continue_on_error);
    }

    #[test]
    fn test_task_outcome_display() {
        assert_eq!(TaskOutcome::Succeeded.to_string(), "succeeded");
        assert_eq!(TaskOutcome::Failed.to_string(), "failed");
        assert_eq!(TaskOutcome::Panicked.to_string(), "panicked");
        assert_eq!(
            TaskOutcome::SkippedBeforeAdmission.to_string(),
            "skipped_before_admission"
        );
        assert_eq!(
            TaskOutcome::SkippedAfterAdmission.to_string(),
            "skipped_after_admission"
        );
    }

    #[test]
    fn test_task_outcome_classification() {
        assert!(!TaskOutcome::Panicked.is_failure());
        assert!(TaskOutcome::Failed.is_failure());
        assert!(TaskOutcome::Panicked.was_attempted());
        assert!(!TaskOutcome::SkippedAfterAdmission.was_attempted());
        assert!(!TaskOutcome::SkippedBeforeAdmission.is_failure());
    }

    #[test]
    fn test_execution_report_counts() {
        let record = |name: &str, outcome| TaskRecord {
            name: name.to_string(),
            outcome,
            duration: Duration::ZERO,
        };
        let report = ExecutionReport {
            records: vec![
                record("a", TaskOutcome::Succeeded),
                record("b", TaskOutcome::Failed),
                record("c", TaskOutcome::Panicked),
                record("d", TaskOutcome::SkippedBeforeAdmission),
            ],
            ..Default::default()
        };
        assert_eq!(report.total(), 4);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.panicked(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.outcome_of("c"), Some(TaskOutcome::Panicked));
        assert_eq!(report.outcome_of("zzz"), None);
    }

    #[test]
    fn test_executor_config_serde_defaults() {
        let config: ExecutorConfig = serde_yaml::from_str("continue_on_error: true").unwrap();
        assert_eq!(config.max_parallel, 4);
        assert!(config.continue_on_error);
    }
}
