//! Configuration management for startrail
//!
//! Values come from built-in defaults, an optional TOML file, and then
//! `STARTRAIL_*` environment variables, in that order of precedence.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Largest page size the search endpoint accepts
pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;

/// Largest history page read from the snapshot table in one query
pub const MAX_HISTORY_PAGE_SIZE: u64 = 100;

/// Format of scheduler times
pub const TIME_FORMAT: &str = "%H:%M";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hosting API client configuration
    pub github: GithubConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Collection behaviour
    pub collector: CollectorConfig,

    /// Daily job times
    pub scheduler: SchedulerConfig,

    /// HTTP view server
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Hosting API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API root, without trailing slash
    pub api_base_url: String,

    /// Product-identifying user agent
    pub user_agent: String,

    /// Personal access token (raises the rate limit)
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Minimum spacing between detail calls in milliseconds
    pub detail_interval_ms: u64,

    /// Warn when remaining requests drop below this
    pub rate_limit_warn_threshold: u64,

    /// Upper bound on waiting for a rate-limit reset
    pub max_rate_limit_wait_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Collection behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Star threshold for the trending search
    pub min_stars: u64,

    /// Results requested from the search endpoint
    pub search_page_size: u32,

    /// Project ids read per page during a history sweep
    pub history_page_size: u64,

    /// Skip history appends for ids missing from the snapshot table
    pub verify_project_exists: bool,
}

/// Daily job times, local clock, `HH:MM`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub collect_time: String,
    pub history_time: String,

    /// Run both jobs once when the server starts
    pub run_on_startup: bool,
}

/// HTTP view server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::from("https://api.github.com"),
            user_agent: String::from("GithubTrendingCollector"),
            token: None,
            request_timeout_secs: 30,
            detail_interval_ms: 1000,
            rate_limit_warn_threshold: 10,
            max_rate_limit_wait_secs: 3600,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/github.db"),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            min_stars: 100,
            search_page_size: MAX_SEARCH_PAGE_SIZE,
            history_page_size: MAX_HISTORY_PAGE_SIZE,
            verify_project_exists: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collect_time: String::from("02:00"),
            history_time: String::from("03:00"),
            run_on_startup: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5000,
            enable_cors: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from defaults and environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load an optional file, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `STARTRAIL_*` variables and `GITHUB_TOKEN`
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_string("STARTRAIL_API_BASE_URL") {
            self.github.api_base_url = v;
        }
        if let Some(v) = env_string("STARTRAIL_USER_AGENT") {
            self.github.user_agent = v;
        }
        if let Some(v) = env_string("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = env_parse("STARTRAIL_REQUEST_TIMEOUT") {
            self.github.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("STARTRAIL_DETAIL_INTERVAL_MS") {
            self.github.detail_interval_ms = v;
        }

        if let Some(v) = env_string("STARTRAIL_SQLITE_PATH") {
            self.database.sqlite_path = PathBuf::from(v);
        }

        if let Some(v) = env_parse("STARTRAIL_MIN_STARS") {
            self.collector.min_stars = v;
        }
        if let Some(v) = env_parse("STARTRAIL_VERIFY_PROJECT_EXISTS") {
            self.collector.verify_project_exists = v;
        }

        if let Some(v) = env_string("STARTRAIL_COLLECT_TIME") {
            self.scheduler.collect_time = v;
        }
        if let Some(v) = env_string("STARTRAIL_HISTORY_TIME") {
            self.scheduler.history_time = v;
        }
        if let Some(v) = env_parse("STARTRAIL_RUN_ON_STARTUP") {
            self.scheduler.run_on_startup = v;
        }

        if let Some(v) = env_string("STARTRAIL_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env_parse("STARTRAIL_PORT") {
            self.server.port = v;
        }
        if let Some(v) = env_parse("STARTRAIL_ENABLE_CORS") {
            self.server.enable_cors = v;
        }

        if let Some(v) = env_string("STARTRAIL_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_string("STARTRAIL_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.github.api_base_url)
            .with_context(|| format!("Invalid api_base_url: {}", self.github.api_base_url))?;

        if self.github.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty");
        }

        if self.github.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.collector.search_page_size == 0
            || self.collector.search_page_size > MAX_SEARCH_PAGE_SIZE
        {
            anyhow::bail!(
                "search_page_size must be between 1 and {MAX_SEARCH_PAGE_SIZE}, got {}",
                self.collector.search_page_size
            );
        }

        if self.collector.history_page_size == 0
            || self.collector.history_page_size > MAX_HISTORY_PAGE_SIZE
        {
            anyhow::bail!(
                "history_page_size must be between 1 and {MAX_HISTORY_PAGE_SIZE}, got {}",
                self.collector.history_page_size
            );
        }

        for (name, value) in [
            ("collect_time", &self.scheduler.collect_time),
            ("history_time", &self.scheduler.history_time),
        ] {
            NaiveTime::parse_from_str(value, TIME_FORMAT)
                .with_context(|| format!("Invalid {name} '{value}', expected HH:MM"))?;
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }
}

impl GithubConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn detail_interval(&self) -> Duration {
        Duration::from_millis(self.detail_interval_ms)
    }

    #[must_use]
    pub fn max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.max_rate_limit_wait_secs)
    }
}

impl ServerConfig {
    /// `host:port` for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.github.user_agent, "GithubTrendingCollector");
        assert_eq!(config.server.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn test_search_page_size_bounds() {
        let mut config = Config::default();
        config.collector.search_page_size = 0;
        assert!(config.validate().is_err());

        config.collector.search_page_size = 101;
        assert!(config.validate().is_err());

        config.collector.search_page_size = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_history_page_size() {
        let mut config = Config::default();
        config.collector.history_page_size = 0;
        assert!(config.validate().is_err());

        config.collector.history_page_size = MAX_HISTORY_PAGE_SIZE + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("history_page_size"));

        config.collector.history_page_size = MAX_HISTORY_PAGE_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_schedule_time() {
        let mut config = Config::default();
        config.scheduler.history_time = "25:00".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("history_time"));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.github.api_base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversions() {
        let config = Config::default();
        assert_eq!(config.github.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.github.detail_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [collector]
            min_stars = 500

            [server]
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.collector.min_stars, 500);
        assert_eq!(config.collector.search_page_size, 100);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scheduler.collect_time, "02:00");
    }

    #[test]
    fn test_token_not_serialized() {
        let mut config = Config::default();
        config.github.token = Some("secret".to_string());
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("secret"));
    }
}
