//! Node configuration.
//!
//! Defaults can be overridden through the environment:
//!
//! | Variable                    | Meaning                                    | Default       |
//! |-----------------------------|--------------------------------------------|---------------|
//! | `PLASMA_DATA_DIR`           | data directory (database and lock file)    | `~/.plasma`   |
//! | `PLASMA_OPERATOR`           | operator address queried on the root chain | zero address  |
//! | `PLASMA_POLL_INTERVAL_MS`   | reconciler poll interval                   | 1000          |
//! | `PLASMA_CONFIRMATIONS`      | deposit confirmation depth                 | 1             |
//! | `PLASMA_BACKOFF_INITIAL_MS` | first retry delay after a client failure   | 500           |
//! | `PLASMA_BACKOFF_MAX_MS`     | retry delay cap                            | 30000         |
//! | `PLASMA_LOG`                | `debug`, `info`, `warn` or `error`         | `info`        |

use crate::reconcile::service::ReconcileOptions;
use crate::types::address::Address;
use crate::utils::log::Level;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "PLASMA_DATA_DIR";
pub const ENV_OPERATOR: &str = "PLASMA_OPERATOR";
pub const ENV_POLL_INTERVAL_MS: &str = "PLASMA_POLL_INTERVAL_MS";
pub const ENV_CONFIRMATIONS: &str = "PLASMA_CONFIRMATIONS";
pub const ENV_BACKOFF_INITIAL_MS: &str = "PLASMA_BACKOFF_INITIAL_MS";
pub const ENV_BACKOFF_MAX_MS: &str = "PLASMA_BACKOFF_MAX_MS";
pub const ENV_LOG: &str = "PLASMA_LOG";

/// A configuration value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `var` is set to `value`, which is rejected for `reason`.
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings of a node: where its data lives, which operator it follows and
/// how the reconciler polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Holds the `db` directory and the writer lock file.
    pub data_dir: PathBuf,
    /// Operator address queried on the root chain.
    pub operator: Address,
    pub poll_interval: Duration,
    /// Root-chain blocks a deposit waits for before it is indexed.
    pub confirmation_depth: u64,
    /// First retry delay after a client failure.
    pub backoff_initial: Duration,
    /// Cap on the retry delay.
    pub backoff_max: Duration,
    pub log_level: Level,
}

/// `~/.plasma`, or `./.plasma` when the home directory is unknown.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".plasma")
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            operator: Address::ZERO,
            poll_interval: Duration::from_millis(1_000),
            confirmation_depth: 1,
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_millis(30_000),
            log_level: Level::Info,
        }
    }
}

fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

fn parse_millis(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    let ms: u64 = parse(var, value.clone())?;
    if ms == 0 {
        return Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}

impl NodeConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|var| std::env::var(var).ok())
    }

    /// Reads overrides through `lookup`; unset variables keep their default.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_OPERATOR) {
            config.operator = parse(ENV_OPERATOR, value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            config.poll_interval = parse_millis(ENV_POLL_INTERVAL_MS, value)?;
        }
        if let Some(value) = lookup(ENV_CONFIRMATIONS) {
            config.confirmation_depth = parse(ENV_CONFIRMATIONS, value)?;
        }
        if let Some(value) = lookup(ENV_BACKOFF_INITIAL_MS) {
            config.backoff_initial = parse_millis(ENV_BACKOFF_INITIAL_MS, value)?;
        }
        if let Some(value) = lookup(ENV_BACKOFF_MAX_MS) {
            config.backoff_max = parse_millis(ENV_BACKOFF_MAX_MS, value)?;
        }
        if let Some(value) = lookup(ENV_LOG) {
            config.log_level = parse(ENV_LOG, value)?;
        }

        if config.backoff_initial > config.backoff_max {
            return Err(ConfigError::Invalid {
                var: ENV_BACKOFF_INITIAL_MS,
                value: config.backoff_initial.as_millis().to_string(),
                reason: format!(
                    "exceeds {ENV_BACKOFF_MAX_MS} ({} ms)",
                    config.backoff_max.as_millis()
                ),
            });
        }

        Ok(config)
    }

    /// Reconciler settings derived from this configuration.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            operator: self.operator,
            poll_interval: self.poll_interval,
            confirmation_depth: self.confirmation_depth,
            backoff_initial: self.backoff_initial,
            backoff_max: self.backoff_max,
        }
    }
}
