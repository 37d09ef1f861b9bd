//! Configuration management for the PowerShades bridge
//!
//! This module handles loading, validation, and management of the bridge
//! configuration from YAML files, with environment variable overrides for
//! credentials.

use crate::api::auth::{BackoffPolicy, Credentials};
use crate::error::{Result, ShadesError};
use crate::platform::scheduler::PollIntervals;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Default remote API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.powershades.com";

/// Lower bound applied to `polling.poll_interval`
pub const MIN_POLL_INTERVAL_SECS: u64 = 2;
/// Lower bound applied to `polling.fast_poll_interval`
pub const MIN_FAST_POLL_INTERVAL_SECS: u64 = 1;
/// Lower bound applied to `polling.fast_poll_duration`
pub const MIN_FAST_POLL_DURATION_SECS: u64 = 5;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "POWERSHADES_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API credentials and endpoint
    pub api: ApiConfig,

    /// Authentication failure and backoff policy
    pub auth: AuthConfig,

    /// Poll cadence and list cache lifetimes
    pub polling: PollingConfig,

    /// Names of groups exposed as accessories; empty disables group polling
    pub expose_groups: Vec<String>,

    /// HTTP transport tuning
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Credentials and endpoint for the PowerShades cloud
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Long-lived API token; takes precedence over email/password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Account email for the JWT exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Account password for the JWT exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Base URL; a variant with the `/api` suffix toggled is tried as fallback
    pub base_url: String,
}

/// Authentication failure policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Failures tolerated before a backoff window opens
    pub max_auth_failures: u32,

    /// First backoff window in milliseconds
    pub auth_failure_backoff_ms: u64,

    /// Upper bound for any backoff window in milliseconds
    pub max_backoff_ms: u64,
}

/// Poll cadence (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Idle interval between polls
    pub poll_interval: u64,

    /// Interval used shortly after a user-triggered move
    pub fast_poll_interval: u64,

    /// How long after a move the fast interval stays in effect
    pub fast_poll_duration: u64,

    /// Lifetime of the cached shade list
    pub shade_list_cache_ttl: u64,

    /// Lifetime of the cached group list; falls back to the shade TTL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_list_cache_ttl: Option<u64>,
}

/// HTTP transport tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Maximum concurrent in-flight requests
    pub max_sockets: usize,

    /// Maximum idle pooled connections per host
    pub max_free_sockets: usize,

    /// TCP keep-alive in seconds
    pub keep_alive_secs: u64,

    /// Optional whole-request timeout in seconds; unset keeps transport defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub console_level: Option<String>,

    /// Optional file-specific level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the environment-named path or default locations
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::load_from_default_paths()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_default_paths() -> Result<Self> {
        let default_paths = [
            "powershades.yaml",
            "/data/powershades.yaml",
            "/etc/powershades/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Override credentials from `POWERSHADES_API_TOKEN`, `POWERSHADES_EMAIL`
    /// and `POWERSHADES_PASSWORD` when they are set and non-empty
    pub fn apply_env_overrides(&mut self) {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(token) = read("POWERSHADES_API_TOKEN") {
            self.api.api_token = Some(token);
        }
        if let Some(email) = read("POWERSHADES_EMAIL") {
            self.api.email = Some(email);
        }
        if let Some(password) = read("POWERSHADES_PASSWORD") {
            self.api.password = Some(password);
        }
    }

    /// Resolve the configured credentials; a static token wins over email/password
    pub fn credentials(&self) -> Result<Credentials> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(token) = non_empty(&self.api.api_token) {
            return Ok(Credentials::ApiToken(token));
        }
        match (non_empty(&self.api.email), non_empty(&self.api.password)) {
            (Some(email), Some(password)) => Ok(Credentials::Password { email, password }),
            _ => Err(ShadesError::validation(
                "api",
                "Either api_token or email and password must be configured",
            )),
        }
    }

    /// Whether both a static token and email/password are present
    pub fn has_conflicting_credentials(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.api.api_token) && (set(&self.api.email) || set(&self.api.password))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.credentials()?;

        if self.has_conflicting_credentials() {
            tracing::warn!(
                "Both api_token and email/password configured; api_token takes precedence"
            );
        }

        let base = self.api.base_url.trim();
        if base.is_empty() {
            return Err(ShadesError::validation(
                "api.base_url",
                "Base URL cannot be empty",
            ));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ShadesError::validation(
                "api.base_url",
                "Base URL must start with http:// or https://",
            ));
        }

        if self.auth.auth_failure_backoff_ms == 0 {
            return Err(ShadesError::validation(
                "auth.auth_failure_backoff_ms",
                "Must be greater than 0",
            ));
        }
        if self.auth.max_backoff_ms < self.auth.auth_failure_backoff_ms {
            return Err(ShadesError::validation(
                "auth.max_backoff_ms",
                "Must not be smaller than auth_failure_backoff_ms",
            ));
        }

        if self.http.max_sockets == 0 {
            return Err(ShadesError::validation(
                "http.max_sockets",
                "Must be greater than 0",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        Ok(())
    }
}

impl AuthConfig {
    /// Backoff policy derived from this section
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_auth_failures: self.max_auth_failures,
            auth_failure_backoff_ms: self.auth_failure_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
        }
    }
}

impl PollingConfig {
    /// Scheduler intervals with the configured minimums applied
    pub fn intervals(&self) -> PollIntervals {
        PollIntervals {
            idle: Duration::from_secs(self.poll_interval.max(MIN_POLL_INTERVAL_SECS)),
            fast: Duration::from_secs(self.fast_poll_interval.max(MIN_FAST_POLL_INTERVAL_SECS)),
            fast_window: Duration::from_secs(
                self.fast_poll_duration.max(MIN_FAST_POLL_DURATION_SECS),
            ),
        }
    }

    pub fn shade_list_ttl(&self) -> Duration {
        Duration::from_secs(self.shade_list_cache_ttl)
    }

    pub fn group_list_ttl(&self) -> Duration {
        Duration::from_secs(
            self.group_list_cache_ttl
                .unwrap_or(self.shade_list_cache_ttl),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token() -> Config {
        let mut config = Config::default();
        config.api.api_token = Some("tok".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.polling.poll_interval, 10);
        assert_eq!(config.polling.fast_poll_interval, 1);
        assert_eq!(config.polling.fast_poll_duration, 30);
        assert_eq!(config.polling.shade_list_cache_ttl, 300);
        assert_eq!(config.auth.max_auth_failures, 3);
        assert_eq!(config.auth.auth_failure_backoff_ms, 60_000);
        assert_eq!(config.auth.max_backoff_ms, 3_600_000);
        assert!(config.expose_groups.is_empty());
    }

    #[test]
    fn test_config_validation() {
        // No credentials at all
        assert!(Config::default().validate().is_err());

        let mut config = with_token();
        assert!(config.validate().is_ok());

        config.api.base_url = String::new();
        assert!(config.validate().is_err());

        config = with_token();
        config.api.base_url = "ftp://host".to_string();
        assert!(config.validate().is_err());

        config = with_token();
        config.auth.max_backoff_ms = 10;
        assert!(config.validate().is_err());

        config = with_token();
        config.logging.level = "LOUD".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_wins_over_password() {
        let mut config = with_token();
        config.api.email = Some("a@b.c".to_string());
        config.api.password = Some("pw".to_string());
        assert!(config.has_conflicting_credentials());
        assert_eq!(
            config.credentials().unwrap(),
            Credentials::ApiToken("tok".to_string())
        );
    }

    #[test]
    fn test_blank_token_falls_back_to_password() {
        let mut config = Config::default();
        config.api.api_token = Some("  ".to_string());
        config.api.email = Some("a@b.c".to_string());
        config.api.password = Some("pw".to_string());
        assert!(!config.has_conflicting_credentials());
        assert!(matches!(
            config.credentials().unwrap(),
            Credentials::Password { .. }
        ));
    }

    #[test]
    fn test_interval_minimums_are_enforced() {
        let mut polling = PollingConfig::default();
        polling.poll_interval = 0;
        polling.fast_poll_interval = 0;
        polling.fast_poll_duration = 1;
        let intervals = polling.intervals();
        assert_eq!(intervals.idle, Duration::from_secs(2));
        assert_eq!(intervals.fast, Duration::from_secs(1));
        assert_eq!(intervals.fast_window, Duration::from_secs(5));
    }

    #[test]
    fn test_group_ttl_defaults_to_shade_ttl() {
        let mut polling = PollingConfig::default();
        polling.shade_list_cache_ttl = 42;
        assert_eq!(polling.group_list_ttl(), Duration::from_secs(42));
        polling.group_list_cache_ttl = Some(7);
        assert_eq!(polling.group_list_ttl(), Duration::from_secs(7));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "api:\n  api_token: abc\nexpose_groups: [Bedroom]\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.api_token.as_deref(), Some("abc"));
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.expose_groups, vec!["Bedroom".to_string()]);
        assert_eq!(config.polling.poll_interval, 10);
    }
}
