//! Prometheus metrics for executor runs
//!
//! # Available Metrics
//!
//! - `taskgate_task_outcomes_total{outcome}` - Counter of task terminal states
//! - `taskgate_task_duration_seconds` - Histogram of task run durations
//! - `taskgate_active_tasks` - Gauge of tasks currently inside `run()`
//! - `taskgate_executions_total{status}` - Counter of finished execution passes
//!
//! Metrics are optional: attach them with `Executor::with_metrics` and render
//! them in the Prometheus text format with [`ExecutorMetrics::render`].

use crate::error::Result;
use crate::models::TaskOutcome;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Histogram bucket boundaries for task duration metrics (in seconds)
const TASK_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0];

/// Metrics collected while executing tasks
#[derive(Clone)]
pub struct ExecutorMetrics {
    registry: Registry,
    task_outcomes: CounterVec,
    task_duration: Histogram,
    active_tasks: IntGauge,
    executions: CounterVec,
}

impl ExecutorMetrics {
    /// Create a metrics set registered in its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let task_outcomes = CounterVec::new(
            Opts::new(
                "taskgate_task_outcomes_total",
                "Total number of tasks by terminal outcome",
            ),
            &["outcome"],
        )?;

        let task_duration = Histogram::with_opts(
            HistogramOpts::new(
                "taskgate_task_duration_seconds",
                "Task run duration in seconds",
            )
            .buckets(TASK_DURATION_BUCKETS.to_vec()),
        )?;

        let active_tasks = IntGauge::with_opts(Opts::new(
            "taskgate_active_tasks",
            "Tasks currently running",
        ))?;

        let executions = CounterVec::new(
            Opts::new(
                "taskgate_executions_total",
                "Total number of finished execution passes",
            ),
            &["status"],
        )?;

        registry.register(Box::new(task_outcomes.clone()))?;
        registry.register(Box::new(task_duration.clone()))?;
        registry.register(Box::new(active_tasks.clone()))?;
        registry.register(Box::new(executions.clone()))?;

        Ok(Self {
            registry,
            task_outcomes,
            task_duration,
            active_tasks,
            executions,
        })
    }

    /// Record a task's terminal outcome; durations are only observed for attempted tasks
    pub fn record_task(&self, outcome: TaskOutcome, duration: Duration) {
        self.task_outcomes
            .with_label_values(&[&outcome.to_string()])
            .inc();
        if outcome.was_attempted() {
            self.task_duration.observe(duration.as_secs_f64());
        }
    }

    pub fn task_started(&self) {
        self.active_tasks.inc();
    }

    pub fn task_finished(&self) {
        self.active_tasks.dec();
    }

    pub fn record_execution(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.executions.with_label_values(&[status]).inc();
    }

    pub fn outcome_count(&self, outcome: TaskOutcome) -> u64 {
        self.task_outcomes
            .with_label_values(&[&outcome.to_string()])
            .get() as u64
    }

    pub fn active_tasks(&self) -> i64 {
        self.active_tasks.get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_task_outcomes() {
        let metrics = ExecutorMetrics::new().unwrap();
        metrics.record_task(TaskOutcome::Succeeded, Duration::from_millis(20));
        metrics.record_task(TaskOutcome::Succeeded, Duration::from_millis(30));
        metrics.record_task(TaskOutcome::SkippedBeforeAdmission, Duration::ZERO);

        assert_eq!(metrics.outcome_count(TaskOutcome::Succeeded), 2);
        assert_eq!(metrics.outcome_count(TaskOutcome::SkippedBeforeAdmission), 1);
        assert_eq!(metrics.outcome_count(TaskOutcome::Failed), 0);
        assert_eq!(metrics.task_duration.get_sample_count(), 2);
    }

    #[test]
    fn test_active_tasks_gauge() {
        let metrics = ExecutorMetrics::new().unwrap();
        metrics.task_started();
        metrics.task_started();
        metrics.task_finished();
        assert_eq!(metrics.active_tasks(), 1);
    }

    #[test]
    fn test_render_text_format() {
        let metrics = ExecutorMetrics::new().unwrap();
        metrics.record_task(TaskOutcome::Failed, Duration::from_millis(5));
        metrics.record_execution(false);

        let output = metrics.render().unwrap();
        assert!(output.contains("taskgate_task_outcomes_total{outcome=\"failed\"} 1"));
        assert!(output.contains("taskgate_executions_total{status=\"failed\"} 1"));
        assert!(output.contains("taskgate_active_tasks 0"));
        assert!(output.contains("taskgate_task_duration_seconds_count 1"));
    }
}
