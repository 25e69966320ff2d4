//! Configuration data types.

use crate::config::options::{DEFAULT_PERIOD, RunOption};
use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Lame-duck behaviour
    #[serde(default)]
    pub lameduck: LameDuckConfig,

    /// The HTTP server run under the coordinator
    #[serde(default)]
    pub server: ServerConfig,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Lame-duck settings as they appear in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LameDuckConfig {
    /// How long the server may drain before it is force-stopped
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,

    /// Signals that begin lame-duck mode
    #[serde(default = "default_signals")]
    pub signals: Vec<Signal>,

    /// Treat "server closed" from the server's serve loop as a clean exit
    #[serde(default)]
    pub server_closed_ok: bool,

    /// Silence the coordinator's own progress messages
    #[serde(default)]
    pub quiet: bool,
}

impl Default for LameDuckConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            signals: default_signals(),
            server_closed_ok: false,
            quiet: false,
        }
    }
}

impl LameDuckConfig {
    /// Runner options equivalent to these settings.
    pub fn options(&self) -> Vec<RunOption> {
        let mut options = vec![
            RunOption::period(self.grace_period),
            RunOption::signals(self.signals.iter().copied()),
        ];

        if self.server_closed_ok {
            options.push(RunOption::ServerClosedOk);
        }

        if self.quiet {
            options.push(RunOption::WithoutLogger);
        }

        options
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address and port to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Artificial delay before each response, to make draining observable
    #[serde(default, with = "humantime_serde")]
    pub response_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            response_delay: Duration::ZERO,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_grace_period() -> Duration {
    DEFAULT_PERIOD
}

fn default_signals() -> Vec<Signal> {
    Signal::DEFAULTS.to_vec()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.lameduck.grace_period, Duration::from_secs(3));
        assert_eq!(
            config.lameduck.signals,
            vec![Signal::Interrupt, Signal::Terminate]
        );
        assert_eq!(config.server.listen.port(), 8080);
    }

    #[test]
    fn test_lameduck_serde() {
        let yaml = r#"
grace_period: 1m 30s
signals: [SIGTERM, hup]
server_closed_ok: true
"#;
        let config: LameDuckConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.grace_period, Duration::from_secs(90));
        assert_eq!(config.signals, vec![Signal::Terminate, Signal::Hangup]);
        assert!(config.server_closed_ok);
        assert!(!config.quiet);
    }

    #[test]
    fn test_options_from_config() {
        let config = LameDuckConfig {
            grace_period: Duration::from_millis(500),
            signals: vec![Signal::User1],
            server_closed_ok: true,
            quiet: true,
        };

        let options = config.options();
        assert_eq!(options.len(), 4);
        assert!(matches!(options[0], RunOption::Period(p) if p == Duration::from_millis(500)));
        assert!(matches!(&options[1], RunOption::Signals(s) if s == &vec![Signal::User1]));
        assert!(matches!(options[2], RunOption::ServerClosedOk));
        assert!(matches!(options[3], RunOption::WithoutLogger));
    }
}
