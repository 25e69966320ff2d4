//! Utility functions and helpers.

mod latch;
mod logging;

pub use latch::Latch;
pub use logging::{Logger, NoopLogger, TracingLogger, init_logging};
