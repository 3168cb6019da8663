//! CLI interface for taskgate

use crate::error::TaskGateError;
use crate::executor::Executor;
use crate::logging::{init_logging, LogConfig, LogFormat};
use crate::metrics::ExecutorMetrics;
use crate::models::{ExecutorConfig, TaskListConfig};
use crate::parser::{parse_task_list_file, validate_executor_config};
use crate::shell::ShellTask;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, Level};

/// taskgate - run a list of commands with bounded concurrency
#[derive(Parser, Debug)]
#[command(name = "taskgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a list of commands with bounded concurrency", long_about = None)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: Level,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute every task in a task list
    Run {
        /// Path to task list YAML file
        tasks: PathBuf,

        /// Override the maximum number of concurrently running tasks
        #[arg(short = 'j', long)]
        max_parallel: Option<usize>,

        /// Keep running remaining tasks after a failure
        #[arg(long, conflicts_with = "stop_on_error")]
        continue_on_error: bool,

        /// Stop admitting tasks after the first failure
        #[arg(long)]
        stop_on_error: bool,

        /// Print Prometheus metrics to stdout after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Validate a task list without running it
    Validate {
        /// Path to task list YAML file
        tasks: PathBuf,
    },
}

impl Cli {
    /// Initialize logging based on CLI arguments
    pub fn init_logging(&self) -> anyhow::Result<()> {
        init_logging(&self.log_config())
    }

    fn log_config(&self) -> LogConfig {
        // Without an explicit -j the limit comes from the task list
        let max_parallel = match &self.command {
            Commands::Run { max_parallel, .. } => *max_parallel,
            Commands::Validate { .. } => Some(1),
        };
        LogConfig::new(self.log_level, self.log_format, max_parallel)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Run {
                tasks,
                max_parallel,
                continue_on_error,
                stop_on_error,
                metrics,
            } => {
                let policy = error_policy(*continue_on_error, *stop_on_error);
                let success = self
                    .run_tasks(tasks, *max_parallel, policy, *metrics)
                    .await?;
                if !success {
                    std::process::exit(1);
                }
            }
            Commands::Validate { tasks } => {
                self.validate_tasks(tasks)?;
            }
        }
        Ok(())
    }

    /// Run a task list once; returns false when any task failed
    async fn run_tasks(
        &self,
        path: &Path,
        max_parallel: Option<usize>,
        continue_on_error: Option<bool>,
        print_metrics: bool,
    ) -> anyhow::Result<bool> {
        info!("Loading task list from: {:?}", path);
        let list = parse_task_list_file(path)?;
        let config = effective_config(&list, max_parallel, continue_on_error)?;
        info!(
            "Task list '{}' loaded: {} tasks, max_parallel={}, continue_on_error={}",
            list.name,
            list.tasks.len(),
            config.max_parallel,
            config.continue_on_error
        );

        let metrics = Arc::new(ExecutorMetrics::new()?);
        let mut executor = Executor::from_config(&config)?.with_metrics(metrics.clone());
        for task in list.tasks {
            executor.submit(ShellTask::new(task)?);
        }

        let cancel = executor.cancel_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, no further tasks will be started");
                cancel.cancel();
            }
        });

        let result = executor.execute().await;

        if let Some(report) = executor.report() {
            for record in &report.records {
                println!(
                    "{:<32} {:<26} {:>8}ms",
                    record.name,
                    record.outcome.to_string(),
                    record.duration.as_millis()
                );
            }
            println!(
                "{} succeeded, {} failed, {} panicked, {} skipped in {}ms",
                report.succeeded(),
                report.failed(),
                report.panicked(),
                report.skipped(),
                report.elapsed.as_millis()
            );
        }

        if print_metrics {
            print!("{}", metrics.render()?);
        }

        match result {
            Ok(()) => {
                info!("Task list '{}' completed successfully", list.name);
                Ok(true)
            }
            Err(TaskGateError::TasksFailed { failures }) => {
                for failure in &failures {
                    error!("{}", failure);
                }
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate a task list without executing
    fn validate_tasks(&self, path: &Path) -> anyhow::Result<()> {
        info!("Validating task list: {:?}", path);
        let list = parse_task_list_file(path)?;

        println!("Task list '{}' is valid", list.name);
        println!("Tasks: {}", list.tasks.len());
        println!(
            "max_parallel: {}, continue_on_error: {}",
            list.config.max_parallel, list.config.continue_on_error
        );

        Ok(())
    }
}

/// `--continue-on-error` / `--stop-on-error` as an override; `None` keeps the file's value
fn error_policy(continue_on_error: bool, stop_on_error: bool) -> Option<bool> {
    match (continue_on_error, stop_on_error) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Apply command-line overrides on top of the task list's executor config
fn effective_config(
    list: &TaskListConfig,
    max_parallel: Option<usize>,
    continue_on_error: Option<bool>,
) -> crate::error::Result<ExecutorConfig> {
    let mut config = list.config.clone();
    if let Some(limit) = max_parallel {
        config.max_parallel = limit;
    }
    if let Some(continue_on_error) = continue_on_error {
        config.continue_on_error = continue_on_error;
    }
    validate_executor_config(&config)?;
    Ok(config)
}
