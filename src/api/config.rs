//! Client configuration
//!
//! Everything the client needs is passed in explicitly; nothing is read from
//! the environment or from disk here.

use std::fmt;
use std::time::Duration;

/// Path segment appended to the base URL when `use_api_version` is set
pub const API_VERSION_PATH: &str = "/v1";

/// Retry behaviour for network-level failures
///
/// Attempt `n` (zero-based) waits `base_delay * 2^n`, capped at `max_delay`.
/// No new attempt starts once `stop_after` has elapsed since the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub stop_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            stop_after: Duration::from_secs(55),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_stop_after(mut self, limit: Duration) -> Self {
        self.stop_after = limit;
        self
    }

    /// Delay before retrying after the zero-based `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Connection settings and credentials for one API client
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    /// Append [`API_VERSION_PATH`] to `base_url`
    pub use_api_version: bool,
    /// Requested lifetime of the session token
    pub max_token_lifetime: Option<Duration>,
    /// Per-request timeout
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Configuration that logs in with a username and password
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            token: None,
            use_api_version: true,
            max_token_lifetime: None,
            timeout: Some(Duration::from_secs(30)),
            retry: RetryPolicy::default(),
        }
    }

    /// Configuration that reuses an already issued token
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            token: Some(token.into()),
            use_api_version: true,
            max_token_lifetime: None,
            timeout: Some(Duration::from_secs(30)),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_version(mut self, use_api_version: bool) -> Self {
        self.use_api_version = use_api_version;
        self
    }

    pub fn with_max_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_token_lifetime = Some(lifetime);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Root URL all endpoints are resolved against
    pub fn api_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.use_api_version && !base.ends_with(API_VERSION_PATH) {
            format!("{}{}", base, API_VERSION_PATH)
        } else {
            base.to_string()
        }
    }

    /// Whether the client can log in on its own
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub(crate) fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("use_api_version", &self.use_api_version)
            .field("max_token_lifetime", &self.max_token_lifetime)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
