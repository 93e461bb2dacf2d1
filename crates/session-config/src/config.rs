//! Runtime configuration for a tab session.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend origin (can be overridden at compile time via SESSION_API_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("SESSION_API_URL") {
    Some(url) => url,
    None => "http://localhost:3000",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const ENV_API_URL: &str = "SESSION_API_URL";
const ENV_LOG_LEVEL: &str = "SESSION_LOG_LEVEL";
const ENV_RPC_TIMEOUT_MS: &str = "SESSION_RPC_TIMEOUT_MS";

/// Session coordination configuration.
///
/// Every field has a default so a partial `config.json` is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
    /// Backend origin; RPCs go to `<api_base_url>/rest/rpc/<name>`.
    pub api_base_url: String,
    /// Upper bound for every status/refresh/login/logout/canary call.
    pub rpc_timeout_ms: u64,
    /// Route that hosts the login form.
    pub login_path: String,
    /// Landing route; the only route that can redirect into the setup flow.
    pub home_path: String,
    /// Entries older than this are pruned from the auth response log.
    pub response_log_window_secs: u64,
    /// Hard cap on response log entries regardless of age.
    pub response_log_capacity: usize,
    /// Number of transition records kept by the diagnostics journal.
    pub journal_capacity: usize,
    /// Refresh this many seconds before the access token expires. Zero disables it.
    pub proactive_refresh_margin_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            rpc_timeout_ms: 10_000,
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            response_log_window_secs: 60,
            response_log_capacity: 256,
            journal_capacity: 200,
            proactive_refresh_margin_secs: 30,
        }
    }
}

impl Config {
    /// Defaults overridden from the process environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load `config.json` from `paths` (defaults if absent), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `paths.config_file()`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Blank values are ignored; an unparsable timeout keeps the current value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(timeout) = non_empty(ENV_RPC_TIMEOUT_MS).and_then(|v| v.parse().ok()) {
            self.rpc_timeout_ms = timeout;
        }
    }

    /// Reject values that would break routing or make every RPC time out.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.login_path.starts_with('/') || !self.home_path.starts_with('/') {
            return Err(CoreError::Config(
                "login_path and home_path must be absolute routes".to_string(),
            ));
        }
        if self.login_path == self.home_path {
            return Err(CoreError::Config(
                "login_path and home_path must differ".to_string(),
            ));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(CoreError::Config("rpc_timeout_ms must be positive".to_string()));
        }
        self.api_base_url()?;
        Ok(())
    }

    /// Get the backend origin as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn response_log_window(&self) -> Duration {
        Duration::from_secs(self.response_log_window_secs)
    }

    /// `None` when proactive refresh is disabled.
    pub fn proactive_refresh_margin(&self) -> Option<Duration> {
        (self.proactive_refresh_margin_secs > 0)
            .then(|| Duration::from_secs(self.proactive_refresh_margin_secs))
    }
}
