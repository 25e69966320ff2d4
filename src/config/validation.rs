//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;

/// Validate the configuration.
///
/// Checks for:
/// - A non-zero grace period
/// - At least one trigger signal, with no duplicates
/// - A recognised log level
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.lameduck.grace_period.is_zero() {
        errors.push("lame-duck grace period must be greater than zero".to_string());
    }

    if config.lameduck.signals.is_empty() {
        errors.push("at least one lame-duck signal must be defined".to_string());
    }

    let mut seen = HashSet::new();
    for signal in &config.lameduck.signals {
        if !seen.insert(signal) {
            errors.push(format!("duplicate lame-duck signal: {}", signal));
        }
    }

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
