//! Tracing subscriber set-up for binaries and orchestrators embedding Trainkit.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Install the global subscriber: human-readable stderr output filtered by
/// `config.level`, plus a daily-rolling JSON file when `config.json_dir` is set.
///
/// Keep the returned guard alive for the lifetime of the process; dropping it
/// flushes the file writer. Fails if a global subscriber is already set.
pub fn init_tracing(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, tracing_subscriber::util::TryInitError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(&config.level));

    let (json_layer, guard) = match &config.json_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "trainkit.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()?;
    Ok(guard)
}
