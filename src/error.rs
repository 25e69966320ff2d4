//! Error and outcome types.
//!
//! A run ends in exactly one of three ways that callers can tell apart by type:
//! a pass-through failure from the server or the caller's cancellation, a
//! [`LameDuckError`] describing how the shutdown sequence went wrong, or success.

use crate::config::ConfigError;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error returned by [`Server`](crate::Server) operations and hooks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Sentinel a server may return from `serve` once it has been shut down.
///
/// With [`RunOption::ServerClosedOk`](crate::RunOption::ServerClosedOk) set,
/// the runner treats this error as a clean return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("server closed")]
pub struct ServerClosed;

/// Sentinel a server may return from `shutdown` when the deadline it was
/// given has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// Reported as the cause of a shutdown that was abandoned because the run was
/// cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("context canceled")]
pub struct ShutdownCanceled;

/// Outcome of a shutdown sequence that did not complete cleanly.
#[derive(Debug, Default)]
pub struct LameDuckError {
    /// True iff the grace period elapsed before shutdown completed.
    pub expired: bool,
    /// The force-stop error when `expired`, otherwise the shutdown error.
    pub err: Option<BoxError>,
}

impl LameDuckError {
    /// Shutdown ran out of time; `err` is whatever force-stop returned.
    pub fn expired(err: Option<BoxError>) -> Self {
        Self { expired: true, err }
    }

    /// Shutdown failed for a reason other than the deadline.
    pub fn failed(err: BoxError) -> Self {
        Self {
            expired: false,
            err: Some(err),
        }
    }
}

impl fmt::Display for LameDuckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut msgs: Vec<String> = Vec::with_capacity(2);

        if self.expired {
            msgs.push("Lame-duck period has expired".to_string());
        }

        if let Some(err) = &self.err {
            let msg = err.to_string();
            if !msg.is_empty() {
                msgs.push(msg);
            }
        }

        f.write_str(&msgs.join(" + "))
    }
}

impl StdError for LameDuckError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.err.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Errors returned by [`Runner::run`](crate::Runner::run) and [`run`](crate::run).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("runner has already been started")]
    AlreadyStarted,

    /// The server failed before any shutdown trigger was observed.
    #[error(transparent)]
    Serve(BoxError),

    /// The signal source refused the subscription.
    #[error("cannot subscribe to signals: {0}")]
    Subscribe(#[source] std::io::Error),

    /// The signal source dropped the subscription before delivering anything.
    #[error("signal source closed before any signal was delivered")]
    SignalSourceClosed,

    /// The caller cancelled the run before any shutdown trigger was observed.
    #[error("context canceled")]
    Canceled,

    #[error(transparent)]
    LameDuck(#[from] LameDuckError),
}

impl RunError {
    /// Returns the shutdown outcome, if this error came from the shutdown sequence.
    pub fn as_lame_duck(&self) -> Option<&LameDuckError> {
        match self {
            RunError::LameDuck(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the grace period expired and the server was force-stopped.
    pub fn is_expired(&self) -> bool {
        self.as_lame_duck().is_some_and(|e| e.expired)
    }
}
