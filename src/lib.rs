//! lameduck - Signal-triggered lame-duck shutdown for long-running servers
//!
//! This crate provides a coordinator that:
//! - Runs a [`Server`] until one of a configurable set of signals arrives
//! - Gives the server a bounded grace period to drain in-flight work
//! - Force-stops the server if that period expires
//! - Reports a single, typed outcome ([`RunError`] / [`LameDuckError`])
//!
//! By default lame-duck mode is triggered by SIGINT or SIGTERM and lasts
//! three seconds.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use lameduck::{HttpServer, RunOption};
//! # use lameduck::config::ServerConfig;
//! # use tokio_util::sync::CancellationToken;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Arc::new(HttpServer::bind(&ServerConfig::default()).await?);
//! lameduck::run(
//!     CancellationToken::new(),
//!     server,
//!     [RunOption::period(std::time::Duration::from_secs(10))],
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod runner;
pub mod server;
pub mod signal;
pub mod state;
pub mod util;

pub use config::{Config, ConfigError, RunOption};
pub use error::{
    BoxError, DeadlineExceeded, LameDuckError, RunError, ServerClosed, ShutdownCanceled,
};
pub use http::HttpServer;
pub use runner::{Runner, run};
pub use server::Server;
pub use signal::Signal;
pub use state::State;
