//! A small HTTP/1 server that implements [`Server`].
//!
//! `shutdown` stops accepting and waits for open connections to finish their
//! current request; `close` drops every connection immediately.

use crate::config::ServerConfig;
use crate::error::{BoxError, DeadlineExceeded, ServerClosed, ShutdownCanceled};
use crate::server::Server;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// HTTP server whose lifecycle is driven by a [`Runner`](crate::Runner).
pub struct HttpServer {
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Listener, taken by the first call to `serve`.
    listener: Mutex<Option<TcpListener>>,
    /// Tracks open connections for draining; taken by `shutdown` or `close`.
    graceful: Mutex<Option<GracefulShutdown>>,
    /// Stops the accept loop.
    stop: CancellationToken,
    /// Aborts every open connection.
    force: CancellationToken,
    /// Delay before each response.
    response_delay: Duration,
}

impl HttpServer {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.listen).await?;
        let local_addr = listener.local_addr()?;

        info!(listen = %local_addr, "http server bound");

        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            graceful: Mutex::new(Some(GracefulShutdown::new())),
            stop: CancellationToken::new(),
            force: CancellationToken::new(),
            response_delay: config.response_delay,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle an incoming connection.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let delay = self.response_delay;
        let service = service_fn(move |req| handle_request(req, delay));
        let conn = http1::Builder::new()
            .keep_alive(true)
            .serve_connection(TokioIo::new(stream), service);

        let Some(conn) = self.graceful.lock().as_ref().map(|g| g.watch(conn)) else {
            debug!(client = %client_addr, "connection refused while stopping");
            return;
        };

        let force = self.force.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = conn => {
                    if let Err(e) = result {
                        debug!(client = %client_addr, error = %e, "connection error");
                    }
                }
                _ = force.cancelled() => {
                    debug!(client = %client_addr, "connection force-closed");
                }
            }
        });
    }
}

#[async_trait]
impl Server for HttpServer {
    #[instrument(skip_all, fields(listen = %self.local_addr))]
    async fn serve(&self, cancel: CancellationToken) -> Result<(), BoxError> {
        let listener = match self.listener.lock().take() {
            Some(listener) if !self.stop.is_cancelled() => listener,
            _ => return Err(ServerClosed.into()),
        };

        info!("http server starting");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => self.handle_connection(stream, addr),
                        Err(e) => error!(error = %e, "failed to accept connection"),
                    }
                }

                _ = self.stop.cancelled() => {
                    info!("http server stopped accepting connections");
                    return Ok(());
                }

                _ = cancel.cancelled() => {
                    info!("http server cancelled");
                    return Ok(());
                }
            }
        }
    }

    async fn shutdown(
        &self,
        cancel: CancellationToken,
        deadline: Instant,
    ) -> Result<(), BoxError> {
        self.stop.cancel();

        let Some(graceful) = self.graceful.lock().take() else {
            return Ok(());
        };

        info!(
            remaining_ms = deadline.saturating_duration_since(Instant::now()).as_millis(),
            "draining open connections"
        );

        tokio::select! {
            result = tokio::time::timeout_at(deadline, graceful.shutdown()) => match result {
                Ok(()) => {
                    info!("all connections drained");
                    Ok(())
                }
                Err(_) => Err(DeadlineExceeded.into()),
            },

            _ = cancel.cancelled() => {
                warn!("drain abandoned after cancellation");
                Err(ShutdownCanceled.into())
            }
        }
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.stop.cancel();
        self.force.cancel();
        self.graceful.lock().take();
        warn!("http server force-closed");
        Ok(())
    }
}

/// Handle an incoming request.
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    delay: Duration,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    let method = req.method();

    debug!(path = %path, method = %method, "http request");

    if method != Method::GET {
        return Ok(text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed\n"));
    }

    match path {
        "/health" | "/healthz" => Ok(text(StatusCode::OK, "OK\n")),
        "/" => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(text(StatusCode::OK, "lameduck demo server\n"))
        }
        _ => Ok(text(StatusCode::NOT_FOUND, "Not found\n")),
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
