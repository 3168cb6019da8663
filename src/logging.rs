//! Structured logging configuration using tracing
//!
//! The library only emits `tracing` events (task start, completion, failure,
//! panic, skip, stop decision, execution summary). Binaries pick where they go
//! by installing a subscriber with [`init_logging`].

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Output encoding of log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Human-readable, for terminals
    #[value(alias = "text")]
    Pretty,
}

/// Subscriber settings for one executor run
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Tag events with the worker thread id. Only useful when tasks of a run
    /// can interleave on several threads.
    pub thread_ids: bool,
}

impl LogConfig {
    /// Settings for a run with the given concurrency limit, if known
    ///
    /// Thread ids are left out only for serial runs (`Some(1)`); an unknown
    /// limit is treated as parallel.
    pub fn new(level: Level, format: LogFormat, max_parallel: Option<usize>) -> Self {
        Self {
            level,
            format,
            thread_ids: max_parallel != Some(1),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(Level::INFO, LogFormat::Pretty, None)
    }
}

/// Install the global subscriber, writing to stderr
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_thread_ids(config.thread_ids)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.finish())?,
    }

    Ok(())
}
