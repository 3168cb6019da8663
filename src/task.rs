//! Task abstraction executed by the bounded executor
//!
//! A task is anything with an async `run` and a human-readable `name`. The
//! executor treats every invocation as opaque: it may take arbitrarily long,
//! fail, or panic.
//!
//! # Example
//!
//! ```
//! use taskgate::task::{BlockingTask, FnTask, Task};
//!
//! let ping = FnTask::new("ping", || async { Ok(()) });
//! assert_eq!(ping.name(), "ping");
//!
//! let checksum = BlockingTask::new("checksum", || {
//!     let sum: u64 = (1..=100).sum();
//!     anyhow::ensure!(sum == 5050, "bad checksum");
//!     Ok(())
//! });
//! assert_eq!(checksum.name(), "checksum");
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A unit of work submitted to the executor
#[async_trait]
pub trait Task: Send + Sync {
    /// Perform the work
    async fn run(&self) -> anyhow::Result<()>;

    /// Stable identifier used in logs and error context; not required to be unique
    fn name(&self) -> String;
}

#[async_trait]
impl<T: Task + ?Sized> Task for Arc<T> {
    async fn run(&self) -> anyhow::Result<()> {
        (**self).run().await
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Task backed by an async closure
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.f)().await
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Task backed by a synchronous, possibly blocking closure
///
/// The closure runs on tokio's blocking thread pool so a long computation or
/// blocking I/O never stalls the async workers. A panic inside the closure is
/// resumed on the calling task, where the executor contains it like any other
/// task panic.
pub struct BlockingTask<F> {
    name: String,
    f: Arc<F>,
}

impl<F> BlockingTask<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

#[async_trait]
impl<F> Task for BlockingTask<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        let f = Arc::clone(&self.f);
        match tokio::task::spawn_blocking(move || f()).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => Err(anyhow::anyhow!(
                "blocking task '{}' was cancelled: {}",
                self.name,
                join_err
            )),
        }
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
