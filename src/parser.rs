//! YAML parser with validation for task lists

use crate::error::{Result, TaskGateError};
use crate::models::*;
use std::fs;
use std::path::Path;

/// Parse a task list from a YAML file.
///
/// Enforces the resource limits for task lists:
/// - YAML file size must be <= 1MB
/// - Task count must be <= 1,000
/// - Task names must be alphanumeric + underscore/dash only
/// - `max_parallel` must be between 1 and 256
///
/// Task names do not have to be unique; they only identify tasks in logs.
///
/// # Errors
///
/// * `TaskGateError::Io` - If file cannot be read
/// * `TaskGateError::YamlSizeExceeded` - If file exceeds 1MB
/// * `TaskGateError::TaskCountExceeded` - If the list has > 1,000 tasks
/// * `TaskGateError::YamlParse` - If YAML is malformed
/// * `TaskGateError::InvalidTaskName` - If task names are invalid
///
/// # Example
///
/// ```no_run
/// use taskgate::parser::parse_task_list_file;
///
/// let config = parse_task_list_file("tasks.yaml")?;
/// println!("Loaded task list: {}", config.name);
/// # Ok::<(), taskgate::error::TaskGateError>(())
/// ```
pub fn parse_task_list_file<P: AsRef<Path>>(path: P) -> Result<TaskListConfig> {
    let content = fs::read_to_string(path)?;
    parse_task_list_yaml(&content)
}

/// Parse a task list from a YAML string.
///
/// # Example
///
/// ```
/// use taskgate::parser::parse_task_list_yaml;
///
/// let yaml = r#"
/// name: nightly
/// config:
///   max_parallel: 2
///   continue_on_error: true
/// tasks:
///   - name: greet
///     command: "/bin/echo"
///     args: ["hello"]
/// "#;
///
/// let config = parse_task_list_yaml(yaml)?;
/// assert_eq!(config.config.max_parallel, 2);
/// # Ok::<(), taskgate::error::TaskGateError>(())
/// ```
pub fn parse_task_list_yaml(content: &str) -> Result<TaskListConfig> {
    if content.len() > MAX_YAML_SIZE {
        return Err(TaskGateError::YamlSizeExceeded(content.len()));
    }

    let config: TaskListConfig = serde_yaml::from_str(content)?;

    if config.tasks.len() > MAX_TASK_COUNT {
        return Err(TaskGateError::TaskCountExceeded {
            count: config.tasks.len(),
            limit: MAX_TASK_COUNT,
        });
    }

    for task in &config.tasks {
        validate_task_name(&task.name)?;
        validate_shell_config(task)?;
    }

    validate_executor_config(&config.config)?;

    Ok(config)
}

/// Validate the concurrency limit of an executor configuration
pub fn validate_executor_config(config: &ExecutorConfig) -> Result<()> {
    if config.max_parallel == 0 {
        return Err(TaskGateError::Validation(
            "max_parallel must be at least 1".to_string(),
        ));
    }
    if config.max_parallel > MAX_PARALLEL_LIMIT {
        return Err(TaskGateError::Validation(format!(
            "max_parallel must be at most {}",
            MAX_PARALLEL_LIMIT
        )));
    }
    Ok(())
}

/// Validate task name format and length
fn validate_task_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TaskGateError::InvalidTaskName {
            name: name.to_string(),
        });
    }

    if name.len() > MAX_TASK_NAME_LEN {
        return Err(TaskGateError::TaskNameTooLong {
            name: name.to_string(),
            max: MAX_TASK_NAME_LEN,
        });
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(TaskGateError::InvalidTaskName {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Validate a shell task configuration.
///
/// - Command must be an absolute path
/// - Command length must be <= 4096 bytes
/// - Argument count must be <= 256, each argument <= 4096 bytes
/// - Working directory must be absolute with no `..` traversal
pub fn validate_shell_config(config: &ShellTaskConfig) -> Result<()> {
    if config.command.len() > MAX_COMMAND_LEN {
        return Err(TaskGateError::CommandTooLong {
            limit: MAX_COMMAND_LEN,
        });
    }

    if !config.command.starts_with('/') {
        return Err(TaskGateError::InvalidPath(
            "Command must be an absolute path".to_string(),
        ));
    }

    if config.args.len() > MAX_ARG_COUNT {
        return Err(TaskGateError::ArgCountExceeded {
            count: config.args.len(),
            limit: MAX_ARG_COUNT,
        });
    }

    if config.args.iter().any(|arg| arg.len() > MAX_ARG_LEN) {
        return Err(TaskGateError::ArgTooLong { limit: MAX_ARG_LEN });
    }

    if let Some(workdir) = &config.workdir {
        validate_path(workdir)?;
    }

    if config.timeout == Some(0) {
        return Err(TaskGateError::Validation(format!(
            "Task '{}' timeout must be at least 1 second",
            config.name
        )));
    }

    Ok(())
}

/// Validate that a path is absolute and free of `..` components
pub fn validate_path(path: &str) -> Result<()> {
    if path.contains("..") {
        return Err(TaskGateError::PathTraversal(path.to_string()));
    }

    if !path.starts_with('/') {
        return Err(TaskGateError::InvalidPath(
            "Path must be absolute".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(command: &str) -> ShellTaskConfig {
        ShellTaskConfig {
            name: "task".to_string(),
            command: command.to_string(),
            args: vec![],
            workdir: None,
            env: None,
            timeout: None,
        }
    }

    #[test]
    fn test_parse_simple_task_list() {
        let yaml = r#"
name: build
description: "Build everything"
tasks:
  - name: task1
    command: "/bin/echo"
    args: ["hello"]
    timeout: 30
"#;
        let config = parse_task_list_yaml(yaml).unwrap();
        assert_eq!(config.name, "build");
        assert_eq!(config.config, ExecutorConfig::default());
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks[0].args, vec!["hello".to_string()]);
        assert_eq!(config.tasks[0].timeout, Some(30));
    }

    #[test]
    fn test_duplicate_task_names_allowed() {
        let yaml = r#"
name: dup
tasks:
  - name: step
    command: "/bin/true"
  - name: step
    command: "/bin/true"
"#;
        let config = parse_task_list_yaml(yaml).unwrap();
        assert_eq!(config.tasks.len(), 2);
    }

    #[test]
    fn test_yaml_size_limit() {
        let large_yaml = "name: test\ntasks:\n".to_string() + &"  - name: x\n".repeat(100_000);
        let result = parse_task_list_yaml(&large_yaml);
        assert!(matches!(result, Err(TaskGateError::YamlSizeExceeded(_))));
    }

    #[test]
    fn test_task_count_limit() {
        let mut yaml = "name: test\ntasks:\n".to_string();
        for i in 0..1001 {
            yaml.push_str(&format!("  - name: task{}\n    command: /bin/true\n", i));
        }
        let result = parse_task_list_yaml(&yaml);
        assert!(matches!(
            result,
            Err(TaskGateError::TaskCountExceeded { .. })
        ));
    }

    #[test]
    fn test_max_parallel_bounds() {
        let yaml = "name: t\nconfig:\n  max_parallel: 0\ntasks: []\n";
        assert!(matches!(
            parse_task_list_yaml(yaml),
            Err(TaskGateError::Validation(msg)) if msg.contains("at least 1")
        ));

        let yaml = "name: t\nconfig:\n  max_parallel: 257\ntasks: []\n";
        assert!(matches!(
            parse_task_list_yaml(yaml),
            Err(TaskGateError::Validation(msg)) if msg.contains("at most 256")
        ));
    }

    #[test]
    fn test_task_name_validation() {
        assert!(validate_task_name("task1").is_ok());
        assert!(validate_task_name("task_1").is_ok());
        assert!(validate_task_name("task-1").is_ok());

        assert!(matches!(
            validate_task_name(""),
            Err(TaskGateError::InvalidTaskName { .. })
        ));
        assert!(matches!(
            validate_task_name("task 1"),
            Err(TaskGateError::InvalidTaskName { .. })
        ));
        assert!(matches!(
            validate_task_name("a".repeat(65).as_str()),
            Err(TaskGateError::TaskNameTooLong { .. })
        ));
    }

    #[test]
    fn test_validate_shell_config() {
        let mut config = shell("/bin/echo");
        config.workdir = Some("/tmp".to_string());
        assert!(validate_shell_config(&config).is_ok());

        assert!(matches!(
            validate_shell_config(&shell("echo")),
            Err(TaskGateError::InvalidPath(_))
        ));

        let mut config = shell("/bin/echo");
        config.workdir = Some("/tmp/../etc".to_string());
        assert!(matches!(
            validate_shell_config(&config),
            Err(TaskGateError::PathTraversal(_))
        ));

        let mut config = shell("/bin/echo");
        config.args = vec!["x".to_string(); MAX_ARG_COUNT + 1];
        assert!(matches!(
            validate_shell_config(&config),
            Err(TaskGateError::ArgCountExceeded { .. })
        ));

        let mut config = shell("/bin/echo");
        config.timeout = Some(0);
        assert!(matches!(
            validate_shell_config(&config),
            Err(TaskGateError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("/tmp").is_ok());
        assert!(matches!(
            validate_path("/tmp/../etc"),
            Err(TaskGateError::PathTraversal(_))
        ));
        assert!(matches!(
            validate_path("tmp"),
            Err(TaskGateError::InvalidPath(_))
        ));
    }
}
