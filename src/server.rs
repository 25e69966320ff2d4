//! The server capability set driven by the runner.

use crate::error::BoxError;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A long-running service with a graceful and a forced stop.
///
/// Modelled on a typical network listener: a call to `shutdown` or `close`
/// should cause `serve` to return promptly.
#[async_trait]
pub trait Server: Send + Sync {
    /// Run the server until it is stopped, `cancel` fires, or it fails.
    ///
    /// An error returned before any shutdown trigger ends the run immediately
    /// and is handed back to the caller unchanged. Return `Ok(())` (or
    /// [`ServerClosed`](crate::ServerClosed) together with
    /// [`RunOption::ServerClosedOk`](crate::RunOption::ServerClosedOk)) when
    /// stopped by `shutdown` or `close`.
    async fn serve(&self, cancel: CancellationToken) -> Result<(), BoxError>;

    /// Begin a graceful drain that must finish by `deadline`.
    ///
    /// `cancel` fires if the run is cancelled while draining. The runner stops
    /// waiting at `deadline` or on cancellation regardless; returning
    /// [`DeadlineExceeded`](crate::DeadlineExceeded) earlier has the same
    /// effect as the deadline passing.
    async fn shutdown(
        &self,
        cancel: CancellationToken,
        deadline: Instant,
    ) -> Result<(), BoxError>;

    /// Force the server to stop. Called at most once, and only after the
    /// shutdown deadline has passed.
    async fn close(&self) -> Result<(), BoxError>;
}
