//! The lame-duck coordinator.
//!
//! A run drives two futures concurrently:
//!
//! 1. The shutdown path waits for one of the configured signals, runs the
//!    pre-shutdown hook, then calls [`Server::shutdown`] with a deadline of
//!    signal receipt plus the lame-duck period. If the deadline passes it calls
//!    [`Server::close`]; if the run is cancelled first it gives up without
//!    closing. On return it fires the `done` latch.
//! 2. The serve path fires the `ready` latch and calls [`Server::serve`]. An
//!    error before any signal is returned immediately; once lame-duck mode has
//!    begun the shutdown path decides the outcome, so the serve path only waits
//!    for `done` or cancellation.
//!
//! Both share a token derived from the caller's. The first path to fail cancels
//! it so the other can unwind, and the run returns only after both finish.

use crate::config::{ConfigError, RunOption, Settings};
use crate::error::{
    BoxError, DeadlineExceeded, LameDuckError, RunError, ServerClosed, ShutdownCanceled,
};
use crate::server::Server;
use crate::signal::{Signal, Subscription};
use crate::state::{AtomicState, State};
use crate::util::Latch;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

/// Run `server` with lame-duck coverage until it stops.
///
/// Equivalent to [`Runner::new`] followed by a single [`Runner::run`].
pub async fn run<S>(
    cancel: CancellationToken,
    server: Arc<S>,
    options: impl IntoIterator<Item = RunOption>,
) -> Result<(), RunError>
where
    S: Server + 'static,
{
    Runner::new(server, options)?.run(cancel).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Path {
    Shutdown,
    Serve,
}

/// Lame-duck coordinator for a single [`Server`] run.
pub struct Runner {
    server: Arc<dyn Server>,
    settings: Settings,
    state: AtomicState,
    started: AtomicBool,
    ready: Latch,
    done: Latch,
}

impl Runner {
    /// Create a runner for `server`, applying `options` over the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the resolved lame-duck period is zero or no signals are configured.
    pub fn new<S>(
        server: Arc<S>,
        options: impl IntoIterator<Item = RunOption>,
    ) -> Result<Self, ConfigError>
    where
        S: Server + 'static,
    {
        Ok(Self::with_settings(server, Settings::resolve(options)?))
    }

    pub(crate) fn with_settings(server: Arc<dyn Server>, settings: Settings) -> Self {
        Self {
            server,
            settings,
            state: AtomicState::new(State::NotStarted),
            started: AtomicBool::new(false),
            ready: Latch::new(),
            done: Latch::new(),
        }
    }

    /// Latch that is set right before the server starts serving.
    pub fn ready(&self) -> Latch {
        self.ready.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state.load()
    }

    /// Settings resolved from the options given to [`Runner::new`].
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the server until it stops, providing lame-duck coverage.
    ///
    /// Returns `Ok(())` when shutdown completed within the lame-duck period.
    ///
    /// # Errors
    ///
    /// * [`RunError::Serve`]: the server failed before any signal arrived.
    /// * [`RunError::Canceled`]: `cancel` fired before any signal arrived.
    /// * [`RunError::LameDuck`]: shutdown failed or the period expired.
    /// * [`RunError::AlreadyStarted`]: this runner has been run before.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RunError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RunError::AlreadyStarted);
        }

        let token = cancel.child_token();
        let _teardown = token.clone().drop_guard();
        let first: Mutex<Option<Path>> = Mutex::new(None);

        let (shutdown, serve) = tokio::join!(
            self.guarded(Path::Shutdown, self.shutdown_path(&token), &token, &first),
            self.guarded(Path::Serve, self.serve_path(&token), &token, &first),
        );

        let triggered = self.state() == State::Stopping;
        let result = if triggered {
            shutdown
        } else {
            match *first.lock() {
                Some(Path::Shutdown) => shutdown,
                Some(Path::Serve) => serve,
                None => Ok(()),
            }
        };

        self.state.store(if triggered || result.is_ok() {
            State::Stopped
        } else {
            State::Failed
        });

        result
    }

    /// Await one control path; on error, record it as first if no other path
    /// has failed yet and cancel the shared token.
    async fn guarded<F>(
        &self,
        path: Path,
        fut: F,
        token: &CancellationToken,
        first: &Mutex<Option<Path>>,
    ) -> Result<(), RunError>
    where
        F: Future<Output = Result<(), RunError>>,
    {
        let result = fut.await;
        if result.is_err() {
            first.lock().get_or_insert(path);
            token.cancel();
        }
        result
    }

    async fn shutdown_path(&self, token: &CancellationToken) -> Result<(), RunError> {
        let result = self.lame_duck(token).await;
        self.close();
        result
    }

    async fn lame_duck(&self, token: &CancellationToken) -> Result<(), RunError> {
        self.logf(format_args!(
            "Waiting for signals: {}",
            SignalList(&self.settings.signals)
        ));

        let signal = self.wait_for_signal(token).await?;
        let deadline = Instant::now() + self.settings.period;

        self.state.store(State::Stopping);
        self.logf(format_args!(
            "Received signal [{}]; entering lame-duck mode for {}",
            signal,
            humantime::format_duration(self.settings.period)
        ));

        if let Some(hook) = &self.settings.hook
            && let Err(e) = hook(token.clone()).await
        {
            self.logf(format_args!("pre-shutdown hook failed: {}", e));
        }

        let scope = token.child_token();
        let _scope_guard = scope.clone().drop_guard();

        let shutdown: Result<(), BoxError> = tokio::select! {
            biased;

            _ = token.cancelled() => Err(ShutdownCanceled.into()),
            result = timeout_at(deadline, self.server.shutdown(scope, deadline)) => {
                result.unwrap_or_else(|_| Err(DeadlineExceeded.into()))
            }
        };

        let err = match shutdown {
            Ok(()) => {
                self.logf(format_args!("Completed lame-duck mode"));
                return Ok(());
            }
            Err(e) if e.is::<DeadlineExceeded>() => {
                self.logf(format_args!("Lame-duck period has expired"));
                let closed = self.server.close().await;
                return Err(LameDuckError::expired(closed.err()).into());
            }
            Err(e) => e,
        };

        self.logf(format_args!("error shutting down server: {}", err));
        token.cancel();
        Err(LameDuckError::failed(err).into())
    }

    async fn wait_for_signal(&self, token: &CancellationToken) -> Result<Signal, RunError> {
        let mut subscription = Subscription::new(&self.settings.signals).map_err(|e| {
            self.logf(format_args!("cannot subscribe to signals: {}", e));
            RunError::Subscribe(e)
        })?;

        tokio::select! {
            biased;

            _ = token.cancelled() => Err(RunError::Canceled),
            received = subscription.recv() => received.ok_or_else(|| {
                self.logf(format_args!("Signal source closed; no signal will arrive"));
                RunError::SignalSourceClosed
            }),
        }
    }

    async fn serve_path(&self, token: &CancellationToken) -> Result<(), RunError> {
        self.logf(format_args!("Starting server"));
        self.state.transition(State::NotStarted, State::Running);
        self.ready.fire();

        if let Err(err) = self.server.serve(token.clone()).await {
            if self.is_absorbed(&err) {
                self.logf(format_args!("Server closed: {}", err));
            } else if token.is_cancelled() {
                self.logf(format_args!("Server stopped after cancellation: {}", err));
            } else if self.state() == State::Stopping {
                self.logf(format_args!("Server stopped during lame-duck mode: {}", err));
            } else {
                self.logf(format_args!("Server failed: {}", err));
                self.state.transition(State::Running, State::Failed);
                return Err(RunError::Serve(err));
            }
        }

        self.logf(format_args!("Stopping server"));

        tokio::select! {
            _ = token.cancelled() => {
                self.logf(format_args!("Context canceled wait for server shutdown"));
            }
            _ = self.done.wait() => {
                self.logf(format_args!("Server stopped"));
            }
        }

        Ok(())
    }

    fn is_absorbed(&self, err: &BoxError) -> bool {
        self.settings.server_closed_ok && err.is::<ServerClosed>()
    }

    fn close(&self) {
        if self.done.fire() {
            self.logf(format_args!("runner closed"));
        } else {
            self.logf(format_args!("runner *NOT* closed"));
        }
    }

    fn logf(&self, args: fmt::Arguments<'_>) {
        self.settings.logger.info(args);
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct SignalList<'a>(&'a [Signal]);

impl fmt::Display for SignalList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, signal) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", signal)?;
        }
        f.write_str("]")
    }
}
