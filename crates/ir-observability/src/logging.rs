//! Logging infrastructure for Incident Relay.
//!
//! This module provides structured logging using the tracing ecosystem.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Crates whose events are shown at the configured level.
const CRATES: &[&str] = &["ir_connectors", "ir_observability", "ir_cli", "incident_relay"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to include span events.
    pub include_spans: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose plain-text output, including span open/close events.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_location: true,
            include_target: true,
        }
    }

    /// JSON output for log shippers.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            include_target: true,
        }
    }

    /// Builds a configuration from a level name (`trace` .. `error`) and format flag.
    ///
    /// Unknown level names fall back to `info`.
    pub fn from_settings(level: &str, json_format: bool) -> Self {
        Self {
            level: Level::from_str(level.trim()).unwrap_or(Level::INFO),
            json_format,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub fn filter_directives(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initializes the logging system with the given configuration.
///
/// `RUST_LOG` overrides the configured level. Fails if a global subscriber
/// is already installed.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    // Logs go to stderr so command output on stdout stays parseable.
    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    }
}

/// Creates a span for one fetch tick.
#[macro_export]
macro_rules! fetch_span {
    ($source:expr) => {
        tracing::info_span!("fetch", source = %$source)
    };
    ($source:expr, $($field:tt)*) => {
        tracing::info_span!("fetch", source = %$source, $($field)*)
    };
}

/// Creates a span for an IAM command.
#[macro_export]
macro_rules! iam_span {
    ($action:expr) => {
        tracing::info_span!("iam", action = %$action)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json_format);
    }

    #[test]
    fn test_production_config() {
        let config = LoggingConfig::production();
        assert_eq!(config.level, Level::INFO);
        assert!(config.json_format);
    }

    #[test]
    fn test_development_config() {
        let config = LoggingConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_spans);
    }

    #[test]
    fn test_from_settings() {
        let config = LoggingConfig::from_settings("warn", true);
        assert_eq!(config.level, Level::WARN);
        assert!(config.json_format);

        assert_eq!(LoggingConfig::from_settings("DEBUG", false).level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_settings("loud", false).level, Level::INFO);
    }

    #[test]
    fn test_filter_directives() {
        let directives = LoggingConfig::default()
            .with_level(Level::TRACE)
            .filter_directives();
        assert!(directives.contains("ir_connectors=trace"));
        assert!(directives.contains("ir_cli=trace"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_span_macros() {
        let _fetch = crate::fetch_span!("okta", limit = 5);
        let _iam = crate::iam_span!("disable");
    }
}
