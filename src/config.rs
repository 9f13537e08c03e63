use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://www.habitrpg.com";

pub const ENV_API_USER: &str = "HABITRPG_API_USER";
pub const ENV_API_KEY: &str = "HABITRPG_API_KEY";
pub const ENV_BASE_URL: &str = "HABITRPG_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "HABITRPG_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported base url {url:?}: {reason}")]
    UnsupportedBaseUrl { url: String, reason: &'static str },
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),
}

/// API credentials sent as `x-api-user` and `x-api-key`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationInfo {
    pub api_user: String,
    pub api_key: String,
}

impl AuthenticationInfo {
    pub fn new(api_user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_user: api_user.into(),
            api_key: api_key.into(),
        }
    }
}

// The key stays out of logs and panic messages.
impl std::fmt::Debug for AuthenticationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationInfo")
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HabitRpgConfig {
    pub base_url: String,
    pub auth: AuthenticationInfo,
    pub request_timeout: Option<Duration>,
}

impl HabitRpgConfig {
    pub fn new(auth: AuthenticationInfo) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth,
            request_timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Loads the configuration from environment variables.
    ///
    /// - `HABITRPG_API_USER`, `HABITRPG_API_KEY` - required credentials
    /// - `HABITRPG_BASE_URL` - server override
    /// - `HABITRPG_TIMEOUT_MS` - per-request timeout in milliseconds
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_user = lookup(ENV_API_USER).ok_or(ClientError::MissingCredential(ENV_API_USER))?;
        let api_key = lookup(ENV_API_KEY).ok_or(ClientError::MissingCredential(ENV_API_KEY))?;
        let mut config = Self::new(AuthenticationInfo::new(api_user, api_key));

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(ms) = lookup(ENV_TIMEOUT_MS).and_then(|value| value.parse::<u64>().ok()) {
            config.request_timeout = Some(Duration::from_millis(ms));
        }
        Ok(config)
    }
}
