//! Logging initialization and the runner's logging sink.

use crate::config::LogFormat;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Log level filter (e.g., "info", "debug")
/// * `format` - Log output format (json or pretty)
pub fn init_logging(level: &str, format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            registry.with(tfmt::layer().json()).init();
        }
        LogFormat::Pretty => {
            registry.with(tfmt::layer().pretty()).init();
        }
    }
}

/// Sink for the runner's progress messages.
///
/// Called from both control paths, possibly concurrently.
pub trait Logger: Send + Sync {
    fn info(&self, args: fmt::Arguments<'_>);
}

/// Forwards messages to `tracing` at INFO level. This is the default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "lameduck", "{}", args);
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn info(&self, _args: fmt::Arguments<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<String>>);

    impl Logger for Capture {
        fn info(&self, args: fmt::Arguments<'_>) {
            self.0.lock().push(args.to_string());
        }
    }

    #[test]
    fn test_logger_receives_formatted_message() {
        let capture = Capture::default();
        capture.info(format_args!("entering lame-duck mode for {}s", 3));
        assert_eq!(
            *capture.0.lock(),
            vec!["entering lame-duck mode for 3s".to_string()]
        );
    }

    #[test]
    fn test_noop_logger_is_callable() {
        NoopLogger.info(format_args!("ignored"));
    }

    // Note: Can only init logging once per process, so we don't test init_logging directly
    #[test]
    fn test_log_format_variants() {
        assert_ne!(LogFormat::Json, LogFormat::Pretty);
    }
}
