use std::time::Duration;

use gravity_worker::core::error::GravityError;
use reqwest::Url;

/// Timeout of the health check.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the service lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: Url,
    /// Applies to every call but the health check. Unbounded when `None`.
    pub request_timeout: Option<Duration>,
    pub ping_timeout: Duration,
}

impl HttpConfig {
    /// Validate `base_url`. The service itself is only contacted on the first call.
    pub fn new(base_url: &str) -> Result<Self, GravityError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(GravityError::Config("Gravity URL is empty".to_string()));
        }
        let base_url = Url::parse(trimmed)
            .map_err(|e| GravityError::Config(format!("invalid Gravity URL {trimmed:?}: {e}")))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(GravityError::Config(format!(
                "Gravity URL must be http(s): {trimmed:?}"
            )));
        }
        Ok(Self {
            base_url,
            request_timeout: None,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// - `GRAVITY_URL` (required)
    /// - `GRAVITY_REQUEST_TIMEOUT_SECS`
    /// - `GRAVITY_PING_TIMEOUT_SECS`
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, GravityError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, GravityError> {
        let url = var("GRAVITY_URL").ok_or_else(|| {
            GravityError::Config("required environment variable GRAVITY_URL is not set".into())
        })?;
        let mut config = Self::new(&url)?;
        if let Some(timeout) = seconds_var(&var, "GRAVITY_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Some(timeout);
        }
        if let Some(timeout) = seconds_var(&var, "GRAVITY_PING_TIMEOUT_SECS")? {
            config.ping_timeout = timeout;
        }
        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }
}

fn seconds_var(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<Duration>, GravityError> {
    match var(name) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| GravityError::Config(format!("{name} must be a number of seconds: {e}"))),
        None => Ok(None),
    }
}
