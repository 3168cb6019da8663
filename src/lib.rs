//! taskgate - bounded-concurrency task runner
//!
//! Submit independent tasks to an [`executor::Executor`], then run them all
//! with at most N executing at once. Under the stop-on-error policy the first
//! failure prevents any not-yet-admitted task from starting.

pub mod cli;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod shell;
pub mod task;

pub use error::{Result, TaskFailure, TaskGateError};
pub use executor::{CancelHandle, Executor};
pub use models::{ExecutionReport, ExecutorConfig, TaskOutcome, TaskRecord};
pub use task::{BlockingTask, FnTask, Task};
