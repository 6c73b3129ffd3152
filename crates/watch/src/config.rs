use std::time::Duration;

use crate::backoff::RetryPolicy;

/// A configuration variable that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Watcher configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Progress stream endpoint.
    pub progress_url: String,
    pub retry: RetryPolicy,
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            var: name,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

impl WatchConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                               |
    /// |--------------------------|---------------------------------------|
    /// | `PROGRESS_URL`           | `http://localhost:3000/api/progress`  |
    /// | `PROGRESS_MAX_RETRIES`   | `5`                                   |
    /// | `PROGRESS_BASE_DELAY_MS` | `1000`                                |
    /// | `PROGRESS_MAX_DELAY_MS`  | `10000`                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_var("PROGRESS_MAX_RETRIES", defaults.max_retries)?,
            base_delay: Duration::from_millis(parse_var(
                "PROGRESS_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_var(
                "PROGRESS_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )?),
            max_jitter: defaults.max_jitter,
        };

        Ok(Self {
            progress_url: std::env::var("PROGRESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api/progress".into()),
            retry,
        })
    }
}
