//! Configuration loading for the Incident Relay CLI.

use crate::validator::ValidationResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ir_connectors::fetcher::{timestamp, DEFAULT_MAX_PAGES};
use ir_connectors::identity::LifecycleSettings;
use ir_connectors::{OktaConfig, SecureString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `okta.api_token`.
pub const API_TOKEN_ENV: &str = "IR_OKTA_API_TOKEN";

const REDACTED: &str = "***REDACTED***";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Okta org connection.
    #[serde(default)]
    pub okta: OktaSettings,

    /// User lifecycle command settings.
    #[serde(default)]
    pub iam: LifecycleSettings,

    /// Incremental log fetching.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from a file, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides(std::env::var(API_TOKEN_ENV).ok());
        Ok(config)
    }

    /// Replaces the API token with `token` when one is given and non-empty.
    pub fn apply_env_overrides(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.okta.api_token = token;
        }
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        if !config.okta.api_token.is_empty() {
            config.okta.api_token = REDACTED.to_string();
        }
        config
    }

    /// Checks the configuration for errors that prevent running and for risky settings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        let url = self.okta.url.trim();
        if url.is_empty() {
            result.add_error("okta.url is required");
        } else if !url.starts_with("https://") && !url.starts_with("http://") {
            result.add_error(format!("okta.url must be an http(s) URL, got '{}'", url));
        } else if url.starts_with("http://") {
            result.add_warning("okta.url uses plain HTTP; the API token is sent unencrypted");
        }

        if self.okta.api_token.trim().is_empty() {
            result.add_error(format!(
                "okta.api_token is required (or set {})",
                API_TOKEN_ENV
            ));
        }
        if !self.okta.verify_tls {
            result.add_warning("okta.verify_tls is disabled; only honored in debug builds");
        }
        if self.okta.timeout_secs == 0 {
            result.add_error("okta.timeout_secs must be greater than 0");
        }
        if self.okta.max_retries > 5 {
            result.add_warning(format!(
                "okta.max_retries is {}; retries back off up to 30 seconds each",
                self.okta.max_retries
            ));
        }

        if self.fetch.max_fetch == 0 {
            result.add_error("fetch.max_fetch must be greater than 0");
        }
        if self.fetch.max_pages == 0 {
            result.add_error("fetch.max_pages must be greater than 0");
        }
        if let Err(e) = self.fetch.first_fetch_time(Utc::now()) {
            result.add_error(format!("fetch.first_fetch: {}", e));
        }
        if self.fetch.query_filter.trim().is_empty() {
            result.add_warning("fetch.query_filter is empty; every log event will be fetched");
        }

        result
    }
}

/// Okta org connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OktaSettings {
    /// Org URL, e.g. `https://example.okta.com`.
    #[serde(default)]
    pub url: String,

    /// API token.
    #[serde(default)]
    pub api_token: String,

    /// Whether to verify TLS certificates.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries for transport failures and 5xx responses.
    #[serde(default)]
    pub max_retries: u32,

    /// Client-side request budget.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for OktaSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_token: String::new(),
            verify_tls: true,
            timeout_secs: default_timeout(),
            max_retries: 0,
            requests_per_minute: None,
        }
    }
}

impl OktaSettings {
    /// Connector configuration for these settings.
    pub fn connector_config(&self) -> OktaConfig {
        let mut config = OktaConfig::new(
            self.url.trim(),
            SecureString::new(self.api_token.trim().to_string()),
        );
        config.connector.verify_tls = self.verify_tls;
        config.connector.timeout_secs = self.timeout_secs;
        config.connector.max_retries = self.max_retries;
        config.requests_per_minute = self.requests_per_minute;
        config
    }
}

/// Incremental fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Log query expression, passed to the API verbatim.
    #[serde(default)]
    pub query_filter: String,

    /// Start of the first window: a relative expression such as `3 days`, or a timestamp.
    #[serde(default = "default_first_fetch")]
    pub first_fetch: String,

    /// Incidents released per run.
    #[serde(default = "default_max_fetch")]
    pub max_fetch: usize,

    /// Pages followed per window.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Where the watermark and backlog are kept between runs.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

fn default_first_fetch() -> String {
    "3 days".to_string()
}

fn default_max_fetch() -> usize {
    50
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from(".incident-relay/checkpoint.json")
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            query_filter: String::new(),
            first_fetch: default_first_fetch(),
            max_fetch: default_max_fetch(),
            max_pages: default_max_pages(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl FetchSettings {
    /// Resolves `first_fetch` against `now`.
    pub fn first_fetch_time(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        timestamp::parse_relative(&self.first_fetch, now)
            .with_context(|| format!("Invalid first fetch time '{}'", self.first_fetch))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ir_connectors::AuthConfig;

    const SAMPLE: &str = r#"
okta:
  url: https://example.okta.com
  api_token: test-token
  max_retries: 2
iam:
  create_if_not_exists: true
  mapper_out:
    email: email
    username: login
fetch:
  query_filter: 'eventType eq "user.lifecycle.create"'
  first_fetch: "2 hours"
  max_fetch: 25
logging:
  level: debug
"#;

    fn sample() -> AppConfig {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.fetch.max_fetch, 50);
        assert_eq!(config.fetch.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(config.logging.level, "info");
        assert!(config.iam.update_user_enabled);
    }

    #[test]
    fn test_parse_yaml() {
        let config = sample();
        assert_eq!(config.okta.url, "https://example.okta.com");
        assert_eq!(config.okta.max_retries, 2);
        assert!(config.okta.verify_tls);
        assert!(config.iam.create_if_not_exists);
        assert!(!config.iam.mapper_out.is_empty());
        assert_eq!(config.fetch.max_fetch, 25);
        assert_eq!(config.fetch.max_pages, DEFAULT_MAX_PAGES);
        assert!(!config.validate().has_errors());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.fetch.first_fetch, "2 hours");

        assert!(AppConfig::load(&dir.path().join("missing.yaml")).is_err());

        std::fs::write(&path, "okta: [not, a, map]").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_env_token_override() {
        let mut config = sample();
        config.apply_env_overrides(Some("from-env".to_string()));
        assert_eq!(config.okta.api_token, "from-env");

        config.apply_env_overrides(Some("  ".to_string()));
        assert_eq!(config.okta.api_token, "from-env");

        config.apply_env_overrides(None);
        assert_eq!(config.okta.api_token, "from-env");
    }

    #[test]
    fn test_redact_secrets() {
        let redacted = sample().redact_secrets();
        assert_eq!(redacted.okta.api_token, REDACTED);

        let yaml = serde_yaml::to_string(&redacted).unwrap();
        assert!(!yaml.contains("test-token"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = sample();
        config.okta.url = String::new();
        config.okta.api_token = String::new();
        config.fetch.max_fetch = 0;
        config.fetch.max_pages = 0;
        config.fetch.first_fetch = "sometime soon".to_string();

        let result = config.validate();
        assert_eq!(result.errors.len(), 5);
    }

    #[test]
    fn test_validate_reports_out_of_range_first_fetch() {
        let mut config = sample();
        config.fetch.first_fetch = "300000 years".to_string();

        let result = config.validate();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("fetch.first_fetch"));
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = sample();
        config.okta.url = "http://localhost:8080".to_string();
        config.okta.verify_tls = false;

        let result = config.validate();
        assert!(!result.has_errors());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_connector_config() {
        let config = sample().okta.connector_config();
        assert_eq!(config.connector.base_url, "https://example.okta.com/api/v1");
        assert_eq!(config.connector.max_retries, 2);
        assert!(matches!(config.connector.auth, AuthConfig::Ssws { .. }));
    }

    #[test]
    fn test_first_fetch_time() {
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap();
        let fetch = sample().fetch;
        let first = fetch.first_fetch_time(now).unwrap();
        assert_eq!(now - first, chrono::Duration::hours(2));
    }
}
