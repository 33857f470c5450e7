//! Testing harness for connectors and the fetcher.

use crate::fetcher::Clock;
use crate::traits::{AuthConfig, ConnectorConfig, LogEntry};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Creates a test connector config with sensible defaults.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 30,
        max_retries: 0,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// `count` distinct log entries tagged with `prefix`, e.g. `{"uuid": "a-0", "seq": 0}`.
pub fn sample_entries(prefix: &str, count: usize) -> Vec<LogEntry> {
    (0..count)
        .map(|i| {
            serde_json::json!({
                "uuid": format!("{}-{}", prefix, i),
                "seq": i,
                "eventType": "user.session.start",
            })
        })
        .collect()
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_test_connector_config() {
        let config = test_connector_config("test", "https://org.okta.com");
        assert_eq!(config.name, "test");
        assert_eq!(config.max_retries, 0);
        assert!(matches!(config.auth, AuthConfig::None));
    }

    #[test]
    fn test_sample_entries_are_distinct() {
        let entries = sample_entries("x", 3);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2]["uuid"], "x-2");
        assert_ne!(entries[0], entries[1]);
    }

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(10));
        assert_eq!(clock.now(), start + Duration::minutes(10));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
