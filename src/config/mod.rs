//! Configuration: runner options, file loading, parsing, and validation.

mod loader;
mod options;
mod types;
mod validation;

pub use loader::{ConfigError, load_config};
pub use options::{DEFAULT_PERIOD, HookFunction, RunOption, Settings};
pub use types::*;
pub use validation::validate_config;
