//! Bounded-concurrency task executor
//!
//! Tasks are submitted up front and then run by a single [`Executor::execute`]
//! pass. Each task must acquire a permit from the admission gate before it is
//! spawned, so at most `concurrency_limit` tasks are inside `run()` at any
//! instant. Failures are forwarded to a coordinator which, under the
//! stop-on-error policy, raises the cancellation signal: tasks not yet admitted
//! are skipped, tasks already running finish normally. A panicking task is
//! contained and logged but is not a failure.
//!
//! # Example
//!
//! ```no_run
//! use taskgate::executor::Executor;
//! use taskgate::task::FnTask;
//!
//! # async fn example() -> taskgate::error::Result<()> {
//! let mut executor = Executor::new(3, true)?;
//! for i in 0..10 {
//!     executor.submit(FnTask::new(format!("job-{}", i), || async { Ok(()) }));
//! }
//!
//! executor.execute().await?;
//! assert!(executor.is_finished());
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TaskFailure, TaskGateError};
use crate::metrics::ExecutorMetrics;
use crate::models::{ExecutionReport, ExecutorConfig, TaskOutcome, TaskRecord};
use crate::task::Task;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cooperative cancellation for an executor
///
/// Cancelling prevents new admissions and makes admitted tasks that have not
/// started yet skip. It never interrupts a task that is already running.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Runs submitted tasks with at most `concurrency_limit` in flight
pub struct Executor {
    concurrency_limit: usize,
    continue_on_error: bool,
    tasks: Vec<Arc<dyn Task>>,
    started: bool,
    finished: bool,
    cancel_tx: Arc<watch::Sender<bool>>,
    metrics: Option<Arc<ExecutorMetrics>>,
    report: Option<ExecutionReport>,
}

impl Executor {
    /// Create an executor
    ///
    /// # Errors
    ///
    /// * `TaskGateError::InvalidConcurrencyLimit` - If `concurrency_limit` is 0
    pub fn new(concurrency_limit: usize, continue_on_error: bool) -> Result<Self> {
        if concurrency_limit == 0 {
            return Err(TaskGateError::InvalidConcurrencyLimit(concurrency_limit));
        }

        let (cancel_tx, _) = watch::channel(false);

        Ok(Self {
            concurrency_limit,
            continue_on_error,
            tasks: Vec::new(),
            started: false,
            finished: false,
            cancel_tx: Arc::new(cancel_tx),
            metrics: None,
            report: None,
        })
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        Self::new(config.max_parallel, config.continue_on_error)
    }

    /// Attach a metrics collector updated as tasks run
    pub fn with_metrics(mut self, metrics: Arc<ExecutorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn submit<T: Task + 'static>(&mut self, task: T) {
        self.tasks.push(Arc::new(task));
    }

    pub fn submit_shared(&mut self, task: Arc<dyn Task>) {
        self.tasks.push(task);
    }

    /// Submit a task that may be absent; `None` is ignored
    pub fn submit_optional(&mut self, task: Option<Arc<dyn Task>>) {
        if let Some(task) = task {
            self.submit_shared(task);
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Per-task outcomes of the completed execution pass
    pub fn report(&self) -> Option<&ExecutionReport> {
        self.report.as_ref()
    }

    /// Run every submitted task and wait until all of them are settled
    ///
    /// Returns `Ok(())` when no task returned an error. Skipped and panicked
    /// tasks are not failures; panics show up only in the log and as
    /// `TaskOutcome::Panicked` in the report. Otherwise returns
    /// `TaskGateError::TasksFailed` with every reported failure in arrival
    /// order.
    ///
    /// # Errors
    ///
    /// * `TaskGateError::AlreadyExecuted` - If called a second time
    /// * `TaskGateError::TasksFailed` - If one or more tasks returned an error
    pub async fn execute(&mut self) -> Result<()> {
        if self.started {
            return Err(TaskGateError::AlreadyExecuted);
        }
        self.started = true;

        let start = Instant::now();
        let total = self.tasks.len();
        info!(
            tasks = total,
            concurrency_limit = self.concurrency_limit,
            continue_on_error = self.continue_on_error,
            "Starting execution"
        );

        let gate = Arc::new(Semaphore::new(self.concurrency_limit));
        let (errors_tx, errors_rx) = mpsc::channel(self.concurrency_limit);
        let coordinator = tokio::spawn(coordinate(
            errors_rx,
            Arc::clone(&self.cancel_tx),
            self.continue_on_error,
        ));

        let ctx = LaunchContext {
            cancel_rx: self.cancel_tx.subscribe(),
            errors: errors_tx,
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            metrics: self.metrics.clone(),
        };
        let peak = Arc::clone(&ctx.peak);
        let mut cancel_rx = self.cancel_tx.subscribe();
        let mut pending = Vec::with_capacity(total);

        for task in &self.tasks {
            let name = task.name();
            let permit = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => None,
                permit = Arc::clone(&gate).acquire_owned() => permit.ok(),
            };

            match permit {
                Some(permit) => {
                    debug!(task = %name, "Task admitted");
                    let handle = tokio::spawn(run_admitted(
                        Arc::clone(task),
                        name.clone(),
                        permit,
                        ctx.clone(),
                    ));
                    pending.push(Pending::Launched { name, handle });
                }
                None => {
                    warn!(task = %name, "Executor cancelled, skipping task before admission");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_task(TaskOutcome::SkippedBeforeAdmission, Duration::ZERO);
                    }
                    pending.push(Pending::Settled(TaskRecord::skipped_before_admission(name)));
                }
            }
        }

        // The coordinator stops once every launched task has dropped its sender.
        drop(ctx);

        let mut records = Vec::with_capacity(total);
        for entry in pending {
            let record = match entry {
                Pending::Settled(record) => record,
                Pending::Launched { name, handle } => match handle.await {
                    Ok(record) => record,
                    Err(join_err) => {
                        error!(task = %name, error = %join_err, "Task terminated abnormally");
                        TaskRecord {
                            name,
                            outcome: TaskOutcome::Panicked,
                            duration: Duration::ZERO,
                        }
                    }
                },
            };
            records.push(record);
        }
        debug_assert_eq!(records.len(), total);

        let failures = match coordinator.await {
            Ok(failures) => failures,
            Err(join_err) => {
                error!(error = %join_err, "Error coordinator terminated abnormally");
                Vec::new()
            }
        };

        self.finished = true;

        let report = ExecutionReport {
            records,
            elapsed: start.elapsed(),
            peak_concurrency: peak.load(Ordering::SeqCst),
            cancelled: *self.cancel_tx.borrow(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            panicked = report.panicked(),
            skipped = report.skipped(),
            peak_concurrency = report.peak_concurrency,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Execution finished"
        );
        self.report = Some(report);

        if let Some(metrics) = &self.metrics {
            metrics.record_execution(failures.is_empty());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TaskGateError::TasksFailed { failures })
        }
    }

    /// Blocking form of [`Executor::execute`]
    ///
    /// Drives the execution on a private multi-threaded runtime. Must not be
    /// called from within an async context.
    pub fn execute_blocking(&mut self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.execute())
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("concurrency_limit", &self.concurrency_limit)
            .field("continue_on_error", &self.continue_on_error)
            .field("tasks", &self.tasks.len())
            .field("finished", &self.finished)
            .finish()
    }
}

enum Pending {
    Settled(TaskRecord),
    Launched {
        name: String,
        handle: JoinHandle<TaskRecord>,
    },
}

/// Coordination state shared with every launched task
#[derive(Clone)]
struct LaunchContext {
    cancel_rx: watch::Receiver<bool>,
    errors: mpsc::Sender<TaskFailure>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    metrics: Option<Arc<ExecutorMetrics>>,
}

/// Tracks tasks inside `run()`; decrements on drop, including unwinding
struct RunningGuard<'a> {
    ctx: &'a LaunchContext,
}

impl<'a> RunningGuard<'a> {
    fn enter(ctx: &'a LaunchContext) -> Self {
        let now = ctx.running.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(metrics) = &ctx.metrics {
            metrics.task_started();
        }
        Self { ctx }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.ctx.running.fetch_sub(1, Ordering::SeqCst);
        if let Some(metrics) = &self.ctx.metrics {
            metrics.task_finished();
        }
    }
}

/// Run one admitted task; the permit is held until this returns
async fn run_admitted(
    task: Arc<dyn Task>,
    name: String,
    permit: OwnedSemaphorePermit,
    ctx: LaunchContext,
) -> TaskRecord {
    let _permit = permit;

    // Best-effort: a stop decision may land right after this check.
    if *ctx.cancel_rx.borrow() {
        warn!(task = %name, "Executor is stopping, skipping admitted task");
        if let Some(metrics) = &ctx.metrics {
            metrics.record_task(TaskOutcome::SkippedAfterAdmission, Duration::ZERO);
        }
        return TaskRecord {
            name,
            outcome: TaskOutcome::SkippedAfterAdmission,
            duration: Duration::ZERO,
        };
    }

    info!(task = %name, "Starting task");
    let started = Instant::now();
    let result = {
        let _running = RunningGuard::enter(&ctx);
        AssertUnwindSafe(task.run()).catch_unwind().await
    };
    let duration = started.elapsed();

    let (outcome, failure) = match result {
        Ok(Ok(())) => {
            info!(
                task = %name,
                duration_ms = duration.as_millis() as u64,
                "Task completed"
            );
            (TaskOutcome::Succeeded, None)
        }
        Ok(Err(err)) => {
            let detail = format!("{:#}", err);
            error!(task = %name, error = %detail, "Task failed");
            (TaskOutcome::Failed, Some(TaskFailure::new(name.clone(), err)))
        }
        // Contained and logged only; a panic never reaches the error sink.
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(task = %name, panic = %message, "Task panicked, panic contained");
            (TaskOutcome::Panicked, None)
        }
    };

    if let Some(metrics) = &ctx.metrics {
        metrics.record_task(outcome, duration);
    }

    if let Some(failure) = failure {
        if ctx.errors.send(failure).await.is_err() {
            warn!(task = %name, "Error sink closed, failure not reported");
        }
    }

    TaskRecord {
        name,
        outcome,
        duration,
    }
}

/// Drain the error sink, cancelling on the first failure unless errors are tolerated
///
/// Keeps draining after cancellation so failures from tasks that were already
/// running are still collected.
async fn coordinate(
    mut errors: mpsc::Receiver<TaskFailure>,
    cancel: Arc<watch::Sender<bool>>,
    continue_on_error: bool,
) -> Vec<TaskFailure> {
    let mut failures = Vec::new();
    let mut cancel_rx = cancel.subscribe();
    let mut stopping = false;

    loop {
        tokio::select! {
            received = errors.recv() => match received {
                Some(failure) => {
                    debug!(error = %failure, "Failure reported to coordinator");
                    failures.push(failure);
                    if !continue_on_error && !stopping {
                        info!("Task failed with continue_on_error=false, shutting down the executor");
                        stopping = true;
                        cancel.send_replace(true);
                    }
                }
                None => break,
            },
            _ = cancelled(&mut cancel_rx), if !stopping => {
                stopping = true;
                info!("Cancellation requested, no further tasks will be admitted");
            }
        }
    }

    failures
}

/// Resolves once the signal is set; never resolves if the sender is gone
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
