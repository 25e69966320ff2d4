//! Runner options and their resolution into [`Settings`].

use crate::config::ConfigError;
use crate::error::BoxError;
use crate::signal::Signal;
use crate::util::{Logger, NoopLogger, TracingLogger};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lame-duck period used when none is configured.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(3);

/// Function run just before the server's shutdown begins.
///
/// It receives the run's cancellation token. Errors are logged and otherwise
/// ignored.
pub type HookFunction =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A single option applied on top of the default [`Settings`].
///
/// Options are applied in order; a later option replaces whatever an earlier
/// one set for the same field.
#[derive(Clone)]
pub enum RunOption {
    /// Length of the lame-duck period. Must be non-zero.
    Period(Duration),
    /// Signals that begin lame-duck mode. Replaces the previous set entirely.
    Signals(Vec<Signal>),
    /// Sink for the runner's progress messages.
    Logger(Arc<dyn Logger>),
    /// Discard all of the runner's progress messages.
    WithoutLogger,
    /// Hook run before shutdown. Only the last one given is kept.
    PreShutdownHook(HookFunction),
    /// Treat [`ServerClosed`](crate::ServerClosed) from `serve` as a clean return.
    ServerClosedOk,
}

impl RunOption {
    pub fn period(period: Duration) -> Self {
        RunOption::Period(period)
    }

    pub fn signals(signals: impl IntoIterator<Item = Signal>) -> Self {
        RunOption::Signals(signals.into_iter().collect())
    }

    pub fn logger(logger: impl Logger + 'static) -> Self {
        RunOption::Logger(Arc::new(logger))
    }

    /// Wrap an async closure as a pre-shutdown hook.
    pub fn pre_shutdown_hook<F, Fut>(hook: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        RunOption::PreShutdownHook(Arc::new(
            move |token| -> BoxFuture<'static, Result<(), BoxError>> { Box::pin(hook(token)) },
        ))
    }

    fn apply(self, settings: &mut Settings) {
        match self {
            RunOption::Period(period) => settings.period = period,
            RunOption::Signals(signals) => settings.signals = signals,
            RunOption::Logger(logger) => settings.logger = logger,
            RunOption::WithoutLogger => settings.logger = Arc::new(NoopLogger),
            RunOption::PreShutdownHook(hook) => settings.hook = Some(hook),
            RunOption::ServerClosedOk => settings.server_closed_ok = true,
        }
    }
}

impl fmt::Debug for RunOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOption::Period(p) => f.debug_tuple("Period").field(p).finish(),
            RunOption::Signals(s) => f.debug_tuple("Signals").field(s).finish(),
            RunOption::Logger(_) => f.write_str("Logger(..)"),
            RunOption::WithoutLogger => f.write_str("WithoutLogger"),
            RunOption::PreShutdownHook(_) => f.write_str("PreShutdownHook(..)"),
            RunOption::ServerClosedOk => f.write_str("ServerClosedOk"),
        }
    }
}

/// Fully resolved runner configuration.
#[derive(Clone)]
pub struct Settings {
    pub period: Duration,
    pub signals: Vec<Signal>,
    pub logger: Arc<dyn Logger>,
    pub hook: Option<HookFunction>,
    pub server_closed_ok: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            signals: Signal::DEFAULTS.to_vec(),
            logger: Arc::new(TracingLogger),
            hook: None,
            server_closed_ok: false,
        }
    }
}

impl Settings {
    /// Apply `options` in order over the defaults and validate the result.
    pub fn resolve(options: impl IntoIterator<Item = RunOption>) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        for option in options {
            option.apply(&mut settings);
        }

        if settings.period.is_zero() {
            return Err(ConfigError::InvalidGracePeriod);
        }

        if settings.signals.is_empty() {
            return Err(ConfigError::NoSignals);
        }

        Ok(settings)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("period", &self.period)
            .field("signals", &self.signals)
            .field("hook", &self.hook.is_some())
            .field("server_closed_ok", &self.server_closed_ok)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve([]).unwrap();
        assert_eq!(settings.period, Duration::from_secs(3));
        assert_eq!(settings.signals, vec![Signal::Interrupt, Signal::Terminate]);
        assert!(settings.hook.is_none());
        assert!(!settings.server_closed_ok);
    }

    #[test]
    fn test_later_options_override() {
        let settings = Settings::resolve([
            RunOption::period(Duration::from_secs(1)),
            RunOption::signals([Signal::Hangup, Signal::Quit]),
            RunOption::period(Duration::from_millis(250)),
            RunOption::signals([Signal::User1]),
        ])
        .unwrap();

        assert_eq!(settings.period, Duration::from_millis(250));
        assert_eq!(settings.signals, vec![Signal::User1]);
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = Settings::resolve([RunOption::period(Duration::ZERO)]);
        assert!(matches!(result, Err(ConfigError::InvalidGracePeriod)));
    }

    #[test]
    fn test_empty_signals_rejected() {
        let result = Settings::resolve([RunOption::signals([])]);
        assert!(matches!(result, Err(ConfigError::NoSignals)));
    }

    #[test]
    fn test_invalid_intermediate_value_is_fine() {
        let settings = Settings::resolve([
            RunOption::signals([]),
            RunOption::period(Duration::ZERO),
            RunOption::signals([Signal::Terminate]),
            RunOption::period(Duration::from_secs(5)),
        ])
        .unwrap();
        assert_eq!(settings.signals, vec![Signal::Terminate]);
        assert_eq!(settings.period, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_last_hook_wins() {
        let settings = Settings::resolve([
            RunOption::pre_shutdown_hook(|_| async { Err::<(), BoxError>("first".into()) }),
            RunOption::pre_shutdown_hook(|_| async { Ok::<(), BoxError>(()) }),
        ])
        .unwrap();

        let hook = settings.hook.expect("hook registered");
        assert!(hook(CancellationToken::new()).await.is_ok());
    }

    #[test]
    fn test_flags() {
        let settings =
            Settings::resolve([RunOption::ServerClosedOk, RunOption::WithoutLogger]).unwrap();
        assert!(settings.server_closed_ok);
        settings.logger.info(format_args!("silenced"));
    }
}
