//! Client configuration (layered: code > env > defaults).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AutoPartError;
use crate::query::QueryOptions;

/// Base URL used when `AUTOPART_API_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
/// Shared transport timeout applied to every request, refresh included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Route the host should navigate to when the session cannot be recovered.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Configuration for an [`AutoPartClient`](crate::client::AutoPartClient).
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use autopart::config::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_base_url("https://api.autopart.example")
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(config.base_url(), "https://api.autopart.example");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
    token_dir: PathBuf,
    login_route: String,
    query_defaults: QueryOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_dir: default_token_dir(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            query_defaults: QueryOptions::default(),
        }
    }

    /// Load from environment variables (`AUTOPART_API_URL`, `AUTOPART_TIMEOUT_SECS`,
    /// `AUTOPART_TOKEN_DIR`, `AUTOPART_LOGIN_ROUTE`), reading `.env` if present.
    pub fn from_env() -> Result<Self, AutoPartError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();

        if let Ok(url) = std::env::var("AUTOPART_API_URL") {
            if !url.trim().is_empty() {
                config = config.with_base_url(url);
            }
        }

        if let Ok(raw) = std::env::var("AUTOPART_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AutoPartError::Configuration(format!(
                    "AUTOPART_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = std::env::var_os("AUTOPART_TOKEN_DIR") {
            config.token_dir = PathBuf::from(dir);
        }

        if let Ok(route) = std::env::var("AUTOPART_LOGIN_ROUTE") {
            config.login_route = route;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn with_query_defaults(mut self, options: QueryOptions) -> Self {
        self.query_defaults = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn token_dir(&self) -> &PathBuf {
        &self.token_dir
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn query_defaults(&self) -> &QueryOptions {
        &self.query_defaults
    }

    /// Join a backend path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn default_token_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "autopart")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".autopart"))
}
