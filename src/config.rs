//! Timeouts and redirect destinations, loaded from environment.

use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SIGN_OUT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_POST_LOGIN_PATH: &str = "/dashboard";
const DEFAULT_ERROR_PATH: &str = "/auth";

/// Tuning knobs for the session core and the OAuth callback route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Bound on the initial session fetch and each admin resolution.
    pub request_timeout: Duration,
    /// How long `sign_out` waits for the provider's acknowledgement.
    pub sign_out_timeout: Duration,
    /// Canonical destination after a successful login.
    pub post_login_path: String,
    /// Entry point that receives `?error=<reason>` redirects.
    pub error_path: String,
}

impl SyncConfig {
    /// Load from environment variables, falling back to defaults:
    ///
    /// - `AUTH_REQUEST_TIMEOUT_MS` (10000)
    /// - `AUTH_SIGN_OUT_TIMEOUT_MS` (5000)
    /// - `AUTH_POST_LOGIN_PATH` (`/dashboard`)
    /// - `AUTH_ERROR_PATH` (`/auth`)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            request_timeout: Duration::from_millis(env_parse("AUTH_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)),
            sign_out_timeout: Duration::from_millis(env_parse("AUTH_SIGN_OUT_TIMEOUT_MS", DEFAULT_SIGN_OUT_TIMEOUT_MS)),
            post_login_path: env_path("AUTH_POST_LOGIN_PATH", DEFAULT_POST_LOGIN_PATH),
            error_path: env_path("AUTH_ERROR_PATH", DEFAULT_ERROR_PATH),
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sign_out_timeout(mut self, timeout: Duration) -> Self {
        self.sign_out_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_post_login_path(mut self, path: impl Into<String>) -> Self {
        self.post_login_path = path.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            sign_out_timeout: Duration::from_millis(DEFAULT_SIGN_OUT_TIMEOUT_MS),
            post_login_path: DEFAULT_POST_LOGIN_PATH.to_owned(),
            error_path: DEFAULT_ERROR_PATH.to_owned(),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Absolute paths only; anything else keeps the default.
fn env_path(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| v.starts_with('/') && !v.starts_with("//"))
        .unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
