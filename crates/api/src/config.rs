use std::path::PathBuf;
use std::time::Duration;

use hookreel_pipeline::{DispatchConfig, UploadLimits};

/// A configuration variable that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for the running batch and background tasks to stop
    /// on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Base URL of the Render Service.
    pub render_service_url: String,
    /// Per-job render timeout in seconds. `0` disables it.
    pub render_timeout_secs: u64,
    /// Base URL of durable object storage.
    pub storage_url: String,
    /// Where the in-flight batch is checkpointed.
    pub state_path: PathBuf,
    /// Progress interpolation tick in milliseconds.
    pub progress_tick_ms: u64,
    /// Cap on the bytes held behind `blob:` handles.
    pub upload_cache_max_bytes: usize,
    /// Lifetime of a `blob:` handle in seconds.
    pub upload_ttl_secs: u64,
}

fn var_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_var<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = var_or(name, default);
    value.trim().parse().map_err(|e: T::Err| ConfigError {
        var: name,
        reason: e.to_string(),
        value,
    })
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                   |
    /// |-------------------------|---------------------------|
    /// | `HOST`                  | `0.0.0.0`                 |
    /// | `PORT`                  | `3000`                    |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                      |
    /// | `RENDER_SERVICE_URL`    | `http://localhost:8080`   |
    /// | `RENDER_TIMEOUT_SECS`   | `600`                     |
    /// | `STORAGE_URL`           | `http://localhost:9000`   |
    /// | `STATE_PATH`            | `data/batch_state.json`   |
    /// | `PROGRESS_TICK_MS`      | `500`                     |
    /// | `UPLOAD_CACHE_MAX_BYTES`| `1073741824`              |
    /// | `UPLOAD_TTL_SECS`       | `3600`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins: Vec<String> = var_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let progress_tick_ms: u64 = parse_var("PROGRESS_TICK_MS", "500")?;
        if progress_tick_ms == 0 {
            return Err(ConfigError {
                var: "PROGRESS_TICK_MS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", "3000")?,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "30")?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", "30")?,
            render_service_url: var_or("RENDER_SERVICE_URL", "http://localhost:8080"),
            render_timeout_secs: parse_var("RENDER_TIMEOUT_SECS", "600")?,
            storage_url: var_or("STORAGE_URL", "http://localhost:9000"),
            state_path: PathBuf::from(var_or("STATE_PATH", "data/batch_state.json")),
            progress_tick_ms,
            upload_cache_max_bytes: parse_var("UPLOAD_CACHE_MAX_BYTES", "1073741824")?,
            upload_ttl_secs: parse_var("UPLOAD_TTL_SECS", "3600")?,
        })
    }

    /// Dispatch loop settings derived from this configuration.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            tick_interval: Duration::from_millis(self.progress_tick_ms),
            render_timeout: (self.render_timeout_secs > 0)
                .then(|| Duration::from_secs(self.render_timeout_secs)),
        }
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.upload_cache_max_bytes,
            ttl: Duration::from_secs(self.upload_ttl_secs),
        }
    }
}
