//! Logging setup
//!
//! Library crates only emit `tracing` events; binaries and test harnesses
//! call [`init_logging`] once to install a subscriber. `RUST_LOG` takes
//! precedence over the configured directive.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"daycycle_player=trace,info"`
    pub directive: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            directive: "info".to_owned(),
            json: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to `directive`
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.directive)
                .map_err(|e| ConfigError::InvalidLogDirective(format!("{}: {}", self.directive, e))),
        }
    }
}

/// Install the global subscriber.
///
/// Fails if the directive can't be parsed or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::LoggingInit(e.to_string()))
}
